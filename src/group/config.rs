//! Thread group configuration

use crate::core::{Result, ThreadError};
use serde::{Deserialize, Serialize};

/// Configuration for a thread group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadGroupConfig {
    /// Number of worker threads, fixed for the group's lifetime
    pub worker_count: usize,
    /// Group name, used as the worker thread name prefix
    pub name: String,
    /// First core to pin workers to; worker `i` goes to core `affinity + i`
    /// modulo the core count. `None` leaves scheduling to the OS.
    pub affinity: Option<usize>,
}

impl Default for ThreadGroupConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            name: "thread-group".to_string(),
            affinity: None,
        }
    }
}

impl ThreadGroupConfig {
    /// Create a new configuration with the given worker count (0 = number of CPUs)
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: if worker_count == 0 {
                num_cpus::get()
            } else {
                worker_count
            },
            ..Default::default()
        }
    }

    /// Set the group name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Pin workers to cores starting at `first_core`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_affinity(mut self, first_core: usize) -> Self {
        self.affinity = Some(first_core);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(ThreadError::invalid_config(
                "worker_count",
                "Number of workers must be greater than 0",
            ));
        }
        if self.name.is_empty() {
            return Err(ThreadError::invalid_config(
                "name",
                "Group name must not be empty",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ThreadError::invalid_config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ThreadError::other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_workers_means_cpu_count() {
        assert_eq!(ThreadGroupConfig::new(0).worker_count, num_cpus::get());
        assert_eq!(ThreadGroupConfig::new(3).worker_count, 3);
    }

    #[test]
    fn test_builder() {
        let config = ThreadGroupConfig::new(2)
            .with_name("shading")
            .with_affinity(1);
        assert_eq!(config.name, "shading");
        assert_eq!(config.affinity, Some(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ThreadGroupConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ThreadError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ThreadGroupConfig::new(6).with_name("bake");
        let json = config.to_json().expect("serialize");
        let parsed = ThreadGroupConfig::from_json(&json).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_defaults_and_errors() {
        let parsed = ThreadGroupConfig::from_json(r#"{"worker_count": 2}"#).expect("parse");
        assert_eq!(parsed.worker_count, 2);
        assert_eq!(parsed.name, "thread-group");
        assert_eq!(parsed.affinity, None);

        assert!(ThreadGroupConfig::from_json(r#"{"worker_count": 0}"#).is_err());
        assert!(ThreadGroupConfig::from_json("not json").is_err());
    }
}
