use chrono::{DateTime, Utc};

/// Source of "now" for schedule arithmetic.
///
/// The scheduler sleeps on tokio time but computes fire instants in UTC; a
/// clock that follows tokio's paused time lets tests cover minute-scale
/// schedules without waiting.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
