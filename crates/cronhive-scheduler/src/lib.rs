//! `cronhive-scheduler`: in-process engine that runs shell commands on a
//! fixed interval or a cron schedule.
//!
//! # Overview
//!
//! A [`engine::TaskScheduler`] owns every task and one tokio task per armed
//! schedule. When a schedule fires the command is handed to a
//! [`executor::CommandRunner`] (normally [`executor::ShellExecutor`]) and the
//! resulting [`types::LogEntry`] is recorded on the task, newest first.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                                  |
//! |------------|------------------------------------------------------------|
//! | `Interval` | Recurring ticker, every N whole minutes                    |
//! | `Cron`     | 5-field cron expression, re-armed after every occurrence   |
//!
//! Nothing is persisted: tasks live as long as the process does.

pub mod clock;
pub mod cron;
pub mod engine;
pub mod error;
pub mod executor;
pub mod schedule;
pub mod truncate;
pub mod types;

pub use cron::{CronError, CronExpr};
pub use engine::TaskScheduler;
pub use error::{Result, SchedulerError};
pub use executor::{CommandRunner, ShellExecutor};
pub use types::{CreateTask, LogEntry, RunResult, Schedule, TaskId, TaskStatus, TaskView};
