use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cron::CronExpr;
use crate::error::{Result, SchedulerError};

/// Longest accepted interval: ten 365-day years, in minutes.
pub const MAX_INTERVAL_MINUTES: i64 = 10 * 365 * 24 * 60;

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Opaque task identifier (UUIDv7, time-sortable, so listing by ID lists by
/// creation order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Armed: the schedule fires and runs the command.
    Running,
    /// Not armed. Run-now still works.
    Paused,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Defines when a task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every `every`, first fire one period after arming.
    Interval { every: Duration },

    /// At every minute matching the expression (UTC).
    Cron(CronExpr),
}

impl Schedule {
    /// Wire name of the schedule kind (`"interval"` or `"cron"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Interval { .. } => "interval",
            Schedule::Cron(_) => "cron",
        }
    }
}

// ---------------------------------------------------------------------------
// Run results and history
// ---------------------------------------------------------------------------

/// Outcome of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
}

/// One line of a task's run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the run finished (Unix milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// Trimmed, possibly truncated command output or error description.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Creation request
// ---------------------------------------------------------------------------

/// Raw creation request as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTask {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    /// `"interval"` or `"cron"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Whole minutes, used when `kind == "interval"`.
    #[serde(default)]
    pub interval_min: i64,
    /// Used when `kind == "cron"`.
    #[serde(default)]
    pub cron_expr: String,
}

/// A validated task definition.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub command: String,
    pub schedule: Schedule,
}

impl CreateTask {
    /// Check the request and build the definition the scheduler runs.
    ///
    /// For cron tasks only the field count is checked; see [`crate::cron`].
    pub fn validate(self) -> Result<TaskSpec> {
        if self.name.trim().is_empty() || self.command.trim().is_empty() {
            return Err(SchedulerError::InvalidTask(
                "name and command are required".to_string(),
            ));
        }

        let schedule = match self.kind.as_str() {
            "interval" => {
                if !(1..=MAX_INTERVAL_MINUTES).contains(&self.interval_min) {
                    return Err(SchedulerError::InvalidTask(format!(
                        "interval_min must be between 1 and {MAX_INTERVAL_MINUTES}"
                    )));
                }
                Schedule::Interval {
                    every: Duration::from_secs(self.interval_min as u64 * 60),
                }
            }
            "cron" => Schedule::Cron(CronExpr::parse(&self.cron_expr)?),
            other => {
                return Err(SchedulerError::InvalidTask(format!(
                    "invalid type '{other}', expected 'interval' or 'cron'"
                )))
            }
        };

        Ok(TaskSpec {
            name: self.name,
            command: self.command,
            schedule,
        })
    }
}

// ---------------------------------------------------------------------------
// Task (internal) and TaskView (projection)
// ---------------------------------------------------------------------------

/// Live task record. Owned by the scheduler registry, never handed out.
#[derive(Debug)]
pub(crate) struct Task {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub status: TaskStatus,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<RunResult>,
    /// Newest first.
    pub logs: VecDeque<LogEntry>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: TaskId::new(),
            spec,
            status: TaskStatus::Running,
            next_run_at: None,
            last_run_at: None,
            last_result: None,
            logs: VecDeque::new(),
        }
    }

    /// Apply a finished run: last-run fields plus a new head log entry.
    pub fn record(&mut self, entry: LogEntry, max_log_entries: Option<usize>) {
        self.last_run_at = Some(entry.time);
        self.last_result = Some(RunResult {
            success: entry.success,
            message: entry.message.clone(),
        });
        self.logs.push_front(entry);
        if let Some(max) = max_log_entries {
            self.logs.truncate(max);
        }
    }

    pub fn view(&self) -> TaskView {
        let (interval_ms, cron_expr) = match &self.spec.schedule {
            Schedule::Interval { every } => (every.as_millis() as u64, String::new()),
            Schedule::Cron(expr) => (0, expr.as_str().to_string()),
        };
        TaskView {
            id: self.id.clone(),
            name: self.spec.name.clone(),
            command: self.spec.command.clone(),
            kind: self.spec.schedule.kind().to_string(),
            interval_ms,
            cron_expr,
            status: self.status,
            next_run_at: unix_millis(self.next_run_at),
            last_run_at: unix_millis(self.last_run_at),
            last_result: self.last_result.clone(),
        }
    }
}

/// Read-only snapshot of a task, safe to serialise to clients.
///
/// Timestamps are Unix milliseconds, `0` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub command: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub interval_ms: u64,
    pub cron_expr: String,
    pub status: TaskStatus,
    pub next_run_at: i64,
    pub last_run_at: i64,
    pub last_result: Option<RunResult>,
}

fn unix_millis(t: Option<DateTime<Utc>>) -> i64 {
    t.map(|t| t.timestamp_millis()).unwrap_or(0)
}
