//! Postkeeper - lifecycle tracking for content-publishing jobs
//!
//! A job is a folder of media plus per-destination captions that moves from
//! `draft` through `ready` to `posted` (or `failed`). The library keeps the
//! SQLite store, the folder naming and the background scheduler in step.

pub mod config;
pub mod content;
pub mod db;
pub mod destinations;
pub mod error;
pub mod folder;
pub mod logging;
pub mod manager;
pub mod scheduler;
pub mod scheduling;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Store;
pub use error::{PostkeeperError, Result};
pub use manager::JobManager;
pub use scheduler::Scheduler;
pub use types::{Job, JobStatus, PostIds, SourceType, StatusCounts};
