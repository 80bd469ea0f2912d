use thiserror::Error;

use crate::cron::CronError;

/// Errors that can occur within the scheduler subsystem.
///
/// Failed command runs are not errors: they are recorded as failed
/// [`crate::types::LogEntry`] values on the task.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The creation request failed validation (blank name, bad interval, …).
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The cron expression does not have exactly five fields.
    #[error("Invalid cron expression: {0}")]
    InvalidCron(#[from] CronError),

    /// No task with the given ID exists.
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },
}

impl SchedulerError {
    pub(crate) fn not_found(id: &crate::types::TaskId) -> Self {
        SchedulerError::TaskNotFound { id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
