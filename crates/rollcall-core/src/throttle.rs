//! Automatic attempt throttling

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::Period;

/// Minimum spacing between automatic attempts on one period
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Spaces automatic attempts on a period by a fixed interval, measured from
/// the period's `last_attempt_at`.
#[derive(Debug, Clone, Copy)]
pub struct AttemptThrottle {
    interval: Duration,
}

impl AttemptThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether an automatic attempt may run now.
    ///
    /// A wall clock that stepped back past the last attempt makes the period
    /// eligible again.
    pub fn eligible(&self, period: &Period, now: &DateTime<Local>) -> bool {
        match period.last_attempt_at {
            None => true,
            Some(last) => match (*now - last).to_std() {
                Ok(elapsed) => elapsed >= self.interval,
                Err(_) => true,
            },
        }
    }

    pub fn record_attempt(&self, period: &mut Period, now: DateTime<Local>) {
        period.last_attempt_at = Some(now);
    }

    /// Earliest time the next automatic attempt may run, if one was made
    pub fn next_attempt_at(&self, period: &Period) -> Option<DateTime<Local>> {
        let interval = chrono::Duration::from_std(self.interval).ok()?;
        period.last_attempt_at.map(|last| last + interval)
    }
}

impl Default for AttemptThrottle {
    fn default() -> Self {
        Self::new(RETRY_INTERVAL)
    }
}
