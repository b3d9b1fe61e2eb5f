//! Configuration validation

use crate::policy::PeriodSpec;
use crate::schema::{RawConfig, RawPeriod};
use rollcall_api::{MAX_STUDENT_COUNT, MIN_STUDENT_COUNT};
use rollcall_util::{CaptureWindow, PeriodId, WallClock};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Period {period}: invalid time '{value}': {message}")]
    InvalidTimeFormat {
        period: u8,
        value: String,
        message: String,
    },

    #[error("Invalid period id {0}: expected 0-8")]
    InvalidPeriodId(u8),

    #[error("Duplicate period id: {0}")]
    DuplicatePeriod(u8),

    #[error("Missing period id: {0}")]
    MissingPeriod(u8),

    #[error("Period {period}: start {start} must be before end {end}")]
    InvalidWindow { period: u8, start: String, end: String },

    #[error("Unknown verification mode '{0}' (expected \"exact\" or \"flexible\")")]
    InvalidMode(String),

    #[error("student_count {0} out of range ({MIN_STUDENT_COUNT}-{MAX_STUDENT_COUNT})")]
    StudentCountOutOfRange(u32),

    #[error("monitor_id must be at least 1")]
    InvalidMonitor,

    #[error("min_score {0} out of range (0.0-1.0)")]
    MinScoreOutOfRange(f32),

    #[error("[{0}] command is required and must not be empty")]
    MissingCommand(&'static str),
}

/// Validate a raw configuration, returning every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    crate::Config::from_raw(config.clone())
        .err()
        .unwrap_or_default()
}

/// Check a timetable and convert it into period specs in evaluation order.
///
/// The timetable must name every period id 0-8 exactly once.
pub fn validate_periods(periods: &[RawPeriod]) -> Result<Vec<PeriodSpec>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for raw in periods {
        let Some(id) = PeriodId::new(raw.id) else {
            errors.push(ValidationError::InvalidPeriodId(raw.id));
            continue;
        };

        if !seen.insert(id) {
            errors.push(ValidationError::DuplicatePeriod(raw.id));
            continue;
        }

        let start = parse_time(&raw.start).map_err(|message| ValidationError::InvalidTimeFormat {
            period: raw.id,
            value: raw.start.clone(),
            message,
        });
        let end = parse_time(&raw.end).map_err(|message| ValidationError::InvalidTimeFormat {
            period: raw.id,
            value: raw.end.clone(),
            message,
        });

        match (start, end) {
            (Ok(start), Ok(end)) => match CaptureWindow::new(start, end) {
                Ok(window) => specs.push(PeriodSpec { id, window }),
                Err(_) => errors.push(ValidationError::InvalidWindow {
                    period: raw.id,
                    start: raw.start.clone(),
                    end: raw.end.clone(),
                }),
            },
            (start, end) => {
                errors.extend(start.err());
                errors.extend(end.err());
            }
        }
    }

    for id in PeriodId::all() {
        if !seen.contains(&id) {
            errors.push(ValidationError::MissingPeriod(id.as_u8()));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    specs.sort_by_key(|spec| spec.id.sort_key());
    Ok(specs)
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0]
        .parse()
        .map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1]
        .parse()
        .map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    WallClock::new(hour, minute).ok_or_else(|| "Invalid time".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_timetable;

    fn raw(id: u8, start: &str, end: &str) -> RawPeriod {
        RawPeriod {
            id,
            start: start.into(),
            end: end.into(),
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:30").unwrap(), WallClock::new(14, 30).unwrap());
        assert_eq!(parse_time("00:00").unwrap(), WallClock::new(0, 0).unwrap());
        assert_eq!(parse_time("23:59").unwrap(), WallClock::new(23, 59).unwrap());

        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("invalid").is_err());
        assert!(parse_time("09:30:00").is_err());
    }

    #[test]
    fn default_timetable_is_valid_and_ordered() {
        let specs = validate_periods(&default_timetable()).unwrap();
        let order: Vec<u8> = specs.iter().map(|s| s.id.as_u8()).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6, 7, 8, 0]);
        assert_eq!(specs[8].window.to_string(), "18:30-18:32");
    }

    #[test]
    fn duplicate_and_missing_periods_are_reported() {
        let mut periods = default_timetable();
        periods.retain(|p| p.id != 4);
        periods.push(raw(2, "10:30", "10:45"));

        let errors = validate_periods(&periods).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePeriod(2)));
        assert!(errors.contains(&ValidationError::MissingPeriod(4)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut periods = default_timetable();
        periods[0] = raw(1, "09:45", "09:30");

        let errors = validate_periods(&periods).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::InvalidWindow { period: 1, .. }]
        ));
    }

    #[test]
    fn every_problem_is_listed() {
        let mut periods = default_timetable();
        periods[0] = raw(1, "9h30", "25:00");
        periods.push(raw(12, "10:00", "11:00"));

        let errors = validate_periods(&periods).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidPeriodId(12)));
    }
}
