//! Thread group and worker implementations

pub mod config;
pub mod status;
pub mod thread_group;
pub mod worker;

pub use config::ThreadGroupConfig;
pub use status::GatherStatus;
pub use thread_group::ThreadGroup;
pub use worker::Worker;
