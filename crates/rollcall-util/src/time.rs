//! Time utilities for rollcall
//!
//! Provides wall-clock time (for capture windows and the attempt throttle)
//! and monotonic time (for measuring how long an attempt pipeline ran).
//!
//! # Mock Time for Development
//!
//! In debug builds, the `ROLLCALL_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising capture windows without waiting for the real timetable.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-11-04 09:29:50`)
//!
//! Example:
//! ```bash
//! ROLLCALL_MOCK_TIME="2025-11-04 09:29:50" rollcalld
//! ```

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::RollcallError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "ROLLCALL_MOCK_TIME";

/// Format accepted by `ROLLCALL_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT) {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = MOCK_TIME_FORMAT,
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a DateTime as `HH:MM:SS` for status displays.
pub fn format_clock_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M:%S").to_string()
}

/// Format a DateTime as the `YYMMDD` stamp used for evidence folders.
pub fn format_date_stamp(dt: &DateTime<Local>) -> String {
    dt.format("%y%m%d").to_string()
}

/// Represents a point in monotonic time, immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// Time of day at minute granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Truncates seconds: 09:44:59 becomes 09:44.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }

    pub fn as_seconds_from_midnight(&self) -> u32 {
        self.minutes_from_midnight() * 60
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Deserialize)]
struct WindowBounds {
    start: WallClock,
    end: WallClock,
}

/// Half-open time-of-day interval `[start, end)` during which automatic
/// capture attempts for a period are allowed. Windows never cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct CaptureWindow {
    start: WallClock,
    end: WallClock,
}

impl CaptureWindow {
    pub fn new(start: WallClock, end: WallClock) -> Result<Self, RollcallError> {
        if start >= end {
            return Err(RollcallError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> WallClock {
        self.start
    }

    pub fn end(&self) -> WallClock {
        self.end
    }

    /// Check if the given local datetime falls within this window.
    /// Seconds are ignored, so the window opens at exactly `start` and
    /// closes at exactly `end`.
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        let time = WallClock::from_naive_time(dt.time());
        time >= self.start && time < self.end
    }

    /// True once the time of day has reached the end of the window.
    pub fn has_elapsed(&self, dt: &DateTime<Local>) -> bool {
        WallClock::from_naive_time(dt.time()) >= self.end
    }

    /// Duration remaining in this window, or None outside of it
    pub fn remaining_duration(&self, dt: &DateTime<Local>) -> Option<Duration> {
        if !self.contains(dt) {
            return None;
        }

        let now_secs = dt.time().num_seconds_from_midnight();
        let end_secs = self.end.as_seconds_from_midnight();
        Some(Duration::from_secs(end_secs.saturating_sub(now_secs) as u64))
    }
}

impl TryFrom<WindowBounds> for CaptureWindow {
    type Error = RollcallError;

    fn try_from(bounds: WindowBounds) -> Result<Self, Self::Error> {
        CaptureWindow::new(bounds.start, bounds.end)
    }
}

impl fmt::Display for CaptureWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Countdown text for the time left in a window: `4:30`, or `1:04:30`
/// past the hour.
pub fn format_countdown(d: Duration) -> String {
    let secs = d.as_secs();
    match secs / 3600 {
        0 => format!("{}:{:02}", secs / 60, secs % 60),
        h => format!("{}:{:02}:{:02}", h, (secs % 3600) / 60, secs % 60),
    }
}
