//! 5-field cron expressions: `minute hour day-of-month month day-of-week`.
//!
//! Every field accepts `*`, `*/N`, `a-b`, `a-b/N`, plain integers and comma
//! separated lists of those. The day-of-week field also accepts `sun`..`sat`
//! (case-insensitive) and `7` as another spelling of Sunday.
//!
//! Only the number of fields is validated. A token that cannot be understood
//! or lies outside its field's range is dropped, so a malformed field ends up
//! matching fewer values (possibly none) and the expression simply never
//! fires. Callers that want stricter input checks must do them up front.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use thiserror::Error;

/// How far [`CronExpr::next_after`] scans before giving up (≈ 69 days).
pub const SEARCH_HORIZON_MINUTES: u32 = 100_000;

const WEEKDAY_ALIASES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 whitespace-separated fields, got {0}")]
    FieldCount(usize),
}

// ---------------------------------------------------------------------------
// FieldSet
// ---------------------------------------------------------------------------

/// The values one cron field accepts, as a bitmask (every field fits in 0..64).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet {
    bits: u64,
    wildcard: bool,
}

impl FieldSet {
    pub fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    /// `true` when the field was written as `*` or `*/N`.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Accepted values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..64).filter(move |v| self.contains(*v))
    }

    fn insert(&mut self, value: u32) {
        self.bits |= 1 << value;
    }

    fn insert_range(&mut self, lo: u32, hi: u32, step: u32) {
        let mut v = lo;
        while v <= hi {
            self.insert(v);
            match v.checked_add(step) {
                Some(next) => v = next,
                None => break,
            }
        }
    }
}

/// Static description of one position in the expression.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    min: u32,
    max: u32,
    /// Highest value a literal or range endpoint may use. Differs from `max`
    /// only for day-of-week, where 7 is folded onto Sunday after parsing.
    literal_max: u32,
    weekday_names: bool,
}

const MINUTE: FieldSpec = FieldSpec { min: 0, max: 59, literal_max: 59, weekday_names: false };
const HOUR: FieldSpec = FieldSpec { min: 0, max: 23, literal_max: 23, weekday_names: false };
const DAY_OF_MONTH: FieldSpec = FieldSpec { min: 1, max: 31, literal_max: 31, weekday_names: false };
const MONTH: FieldSpec = FieldSpec { min: 1, max: 12, literal_max: 12, weekday_names: false };
const DAY_OF_WEEK: FieldSpec = FieldSpec { min: 0, max: 6, literal_max: 7, weekday_names: true };

impl FieldSpec {
    fn value(&self, token: &str) -> Option<u32> {
        if self.weekday_names {
            if let Some(idx) = WEEKDAY_ALIASES.iter().position(|a| *a == token) {
                return Some(idx as u32);
            }
        }
        token.parse::<u32>().ok()
    }

    fn parse(&self, field: &str) -> FieldSet {
        let mut set = FieldSet::default();
        for token in field.split(',') {
            let token = token.trim().to_ascii_lowercase();
            self.parse_token(&token, &mut set);
        }
        if self.weekday_names && set.contains(7) {
            set.bits &= !(1 << 7);
            set.insert(0);
        }
        set
    }

    /// Adds the values of one list element to `set`. Unusable tokens add nothing.
    ///
    /// A step of zero or one that is not a number counts as 1.
    fn parse_token(&self, token: &str, set: &mut FieldSet) {
        let (base, step) = match token.split_once('/') {
            Some((base, step)) => (base, step.parse::<u32>().ok().filter(|s| *s > 0).unwrap_or(1)),
            None => (token, 1),
        };

        if base == "*" {
            set.wildcard = true;
            set.insert_range(self.min, self.max, step);
            return;
        }

        if let Some((lo, hi)) = base.split_once('-') {
            let (Some(lo), Some(hi)) = (self.value(lo), self.value(hi)) else {
                return;
            };
            let lo = lo.max(self.min);
            let hi = hi.min(self.literal_max);
            if lo <= hi {
                set.insert_range(lo, hi, step);
            }
            return;
        }

        // A step only makes sense after `*` or a range.
        if token.contains('/') {
            return;
        }
        if let Some(v) = self.value(base) {
            if (self.min..=self.literal_max).contains(&v) {
                set.insert(v);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CronExpr
// ---------------------------------------------------------------------------

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl CronExpr {
    /// Parse `expr`. Fails only when it does not have exactly five fields.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let &[minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(CronError::FieldCount(fields.len()));
        };

        Ok(Self {
            source: expr.trim().to_string(),
            minute: MINUTE.parse(minute),
            hour: HOUR.parse(hour),
            day_of_month: DAY_OF_MONTH.parse(dom),
            month: MONTH.parse(month),
            day_of_week: DAY_OF_WEEK.parse(dow),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn minute(&self) -> &FieldSet {
        &self.minute
    }

    pub fn hour(&self) -> &FieldSet {
        &self.hour
    }

    pub fn day_of_month(&self) -> &FieldSet {
        &self.day_of_month
    }

    pub fn month(&self) -> &FieldSet {
        &self.month
    }

    /// Day-of-week values, 0 = Sunday (a `7` in the source is stored as 0).
    pub fn day_of_week(&self) -> &FieldSet {
        &self.day_of_week
    }

    /// Whether the minute containing `dt` satisfies every field.
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.contains(dt.minute())
            && self.hour.contains(dt.hour())
            && self.month.contains(dt.month())
            && self.day_matches(dt.day(), dt.weekday().num_days_from_sunday())
    }

    /// A wildcard day field (`*` or `*/N`) defers to the other one; two
    /// wildcards match any day. Two restricted fields are OR-ed.
    fn day_matches(&self, dom: u32, dow: u32) -> bool {
        let dom_ok = self.day_of_month.contains(dom);
        let dow_ok = self.day_of_week.contains(dow);
        match (self.day_of_month.is_wildcard(), self.day_of_week.is_wildcard()) {
            (true, true) => true,
            (true, false) => dow_ok,
            (false, true) => dom_ok,
            (false, false) => dom_ok || dow_ok,
        }
    }

    /// First whole minute strictly after `from` that matches, or `None` when
    /// nothing matches within [`SEARCH_HORIZON_MINUTES`].
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.minute.is_empty() || self.hour.is_empty() || self.month.is_empty() {
            return None;
        }

        let mut candidate = from.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
