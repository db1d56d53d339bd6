//! Error types for the thread group

/// Result type for thread group operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur in the thread group
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// Thread group has not spawned its workers yet
    #[error("Thread group '{group_name}' has not been created")]
    NotCreated {
        /// Name of the thread group
        group_name: String,
    },

    /// Thread group workers were already spawned
    #[error("Thread group '{group_name}' is already created with {worker_count} workers")]
    AlreadyCreated {
        /// Name of the thread group
        group_name: String,
        /// Number of worker threads
        worker_count: usize,
    },

    /// A run is still in flight
    #[error("Thread group '{group_name}' is already running ({used_workers} workers in use)")]
    AlreadyRunning {
        /// Name of the thread group
        group_name: String,
        /// Number of workers taking part in the current run
        used_workers: usize,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Bounded gathering ran out of time
    #[error("Gathering timed out after {timeout_ms}ms")]
    GatherTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Gathering failed: the group was not created or an undefined fault was recorded
    #[error("Gathering failed: {source_text}")]
    GatherFailed {
        /// Last recorded fault source, if any
        source_text: String,
    },

    /// A recognized fault was recorded during the run
    #[error("Job raised exception {mask:#x}: {source_text}")]
    JobException {
        /// Accumulated exception bits
        mask: u32,
        /// Last recorded fault source
        source_text: String,
    },

    /// A job source cannot serve every worker of the run
    #[error("Job source keeps {records} worker records but the run uses {used_workers} workers")]
    SourceMismatch {
        /// Per-worker records kept by the source
        records: usize,
        /// Number of workers the run would use
        used_workers: usize,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl ThreadError {
    /// Create a not created error
    pub fn not_created(group_name: impl Into<String>) -> Self {
        ThreadError::NotCreated {
            group_name: group_name.into(),
        }
    }

    /// Create an already created error
    pub fn already_created(group_name: impl Into<String>, worker_count: usize) -> Self {
        ThreadError::AlreadyCreated {
            group_name: group_name.into(),
            worker_count,
        }
    }

    /// Create an already running error
    pub fn already_running(group_name: impl Into<String>, used_workers: usize) -> Self {
        ThreadError::AlreadyRunning {
            group_name: group_name.into(),
            used_workers,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create a gather timeout error
    pub fn gather_timeout(timeout_ms: u64) -> Self {
        ThreadError::GatherTimeout { timeout_ms }
    }

    /// Create a gather failed error
    pub fn gather_failed(source_text: impl Into<String>) -> Self {
        ThreadError::GatherFailed {
            source_text: source_text.into(),
        }
    }

    /// Create a job exception error
    pub fn job_exception(mask: u32, source_text: impl Into<String>) -> Self {
        ThreadError::JobException {
            mask,
            source_text: source_text.into(),
        }
    }

    /// Create a source mismatch error
    pub fn source_mismatch(records: usize, used_workers: usize) -> Self {
        ThreadError::SourceMismatch {
            records,
            used_workers,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ThreadError::Other(msg.into())
    }
}
