use chrono::{DateTime, Utc};

use crate::types::Schedule;

/// Compute the next UTC fire time for `schedule` starting *after* `from`.
///
/// Returns `None` when a cron expression has no match within the search
/// horizon. Interval schedules always have a next fire time.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Interval { every } => {
            let every = chrono::Duration::from_std(*every).ok()?;
            from.checked_add_signed(every)
        }
        Schedule::Cron(expr) => expr.next_after(from),
    }
}
