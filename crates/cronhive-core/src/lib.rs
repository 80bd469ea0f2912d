//! `cronhive-core`: configuration and process-level error types shared by
//! the scheduler and the gateway binary.

pub mod config;
pub mod error;

pub use config::CronhiveConfig;
pub use error::{CronhiveError, Result};
