//! Validated configuration

use crate::schema::{RawCommandConfig, RawConfig, RawPeriod, RawServiceConfig, RawSettings};
use crate::validation::{validate_periods, ValidationError};
use rollcall_api::{VerificationMode, VerificationSettings, MAX_STUDENT_COUNT, MIN_STUDENT_COUNT};
use rollcall_util::{
    default_data_dir, default_save_path, default_socket_path, CaptureWindow, PeriodId,
};
use std::path::PathBuf;

/// Built-in timetable used when the config file has no `[[periods]]`
pub const DEFAULT_TIMETABLE: [(u8, &str, &str); 9] = [
    (1, "09:30", "09:45"),
    (2, "10:30", "10:45"),
    (3, "11:30", "11:45"),
    (4, "12:30", "12:45"),
    (5, "14:30", "14:45"),
    (6, "15:30", "15:45"),
    (7, "16:30", "16:45"),
    (8, "17:30", "17:45"),
    (0, "18:30", "18:32"),
];

pub const DEFAULT_MONITOR_ID: u32 = 1;
pub const DEFAULT_STUDENT_COUNT: u32 = 1;
pub const DEFAULT_MIN_SCORE: f32 = 0.7;

/// The built-in timetable in raw form
pub fn default_timetable() -> Vec<RawPeriod> {
    DEFAULT_TIMETABLE
        .iter()
        .map(|(id, start, end)| RawPeriod {
            id: *id,
            start: start.to_string(),
            end: end.to_string(),
        })
        .collect()
}

/// One scheduled verification slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSpec {
    pub id: PeriodId,
    pub window: CaptureWindow,
}

/// Validated configuration ready for use by the service
#[derive(Debug, Clone)]
pub struct Config {
    pub verification: VerificationSettings,
    pub monitor_id: u32,
    pub save_path: PathBuf,
    pub service: ServiceConfig,
    pub capture_command: Vec<String>,
    pub detector_command: Vec<String>,
    /// Nine periods in evaluation order
    pub periods: Vec<PeriodSpec>,
}

impl Config {
    /// Validate and convert raw config, collecting every error
    pub fn from_raw(raw: RawConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let (verification, monitor_id, save_path) = convert_settings(raw.settings, &mut errors);
        let capture_command = convert_command(raw.capture, "capture", &mut errors);
        let detector_command = convert_command(raw.detector, "detector", &mut errors);

        let raw_periods = raw.periods.unwrap_or_else(default_timetable);
        let periods = match validate_periods(&raw_periods) {
            Ok(periods) => periods,
            Err(period_errors) => {
                errors.extend(period_errors);
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            verification,
            monitor_id,
            save_path,
            service: ServiceConfig::from_raw(raw.service),
            capture_command,
            detector_command,
            periods,
        })
    }

    /// Get a period by id
    pub fn period(&self, id: PeriodId) -> Option<&PeriodSpec> {
        self.periods.iter().find(|p| p.id == id)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

fn convert_settings(
    raw: RawSettings,
    errors: &mut Vec<ValidationError>,
) -> (VerificationSettings, u32, PathBuf) {
    let mode = match raw.mode {
        Some(mode) => mode.parse::<VerificationMode>().unwrap_or_else(|_| {
            errors.push(ValidationError::InvalidMode(mode.clone()));
            VerificationMode::Flexible
        }),
        None => VerificationMode::Flexible,
    };

    let student_count = raw.student_count.unwrap_or(DEFAULT_STUDENT_COUNT);
    if !(MIN_STUDENT_COUNT..=MAX_STUDENT_COUNT).contains(&student_count) {
        errors.push(ValidationError::StudentCountOutOfRange(student_count));
    }

    let min_score = raw.min_score.unwrap_or(DEFAULT_MIN_SCORE);
    if !(0.0..=1.0).contains(&min_score) {
        errors.push(ValidationError::MinScoreOutOfRange(min_score));
    }

    let monitor_id = raw.monitor_id.unwrap_or(DEFAULT_MONITOR_ID);
    if monitor_id == 0 {
        errors.push(ValidationError::InvalidMonitor);
    }

    let settings = VerificationSettings {
        mode,
        student_count,
        min_score,
    };
    let save_path = raw.save_path.unwrap_or_else(default_save_path);

    (settings, monitor_id, save_path)
}

fn convert_command(
    raw: RawCommandConfig,
    section: &'static str,
    errors: &mut Vec<ValidationError>,
) -> Vec<String> {
    match raw.command {
        Some(argv) if argv.first().is_some_and(|program| !program.is_empty()) => argv,
        _ => {
            errors.push(ValidationError::MissingCommand(section));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_config() -> RawConfig {
        RawConfig {
            config_version: 1,
            settings: RawSettings::default(),
            service: RawServiceConfig::default(),
            capture: RawCommandConfig {
                command: Some(vec!["grim".into(), "{output}".into()]),
            },
            detector: RawCommandConfig {
                command: Some(vec!["count-faces".into(), "{image}".into()]),
            },
            periods: None,
        }
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_raw(raw_config()).unwrap();

        assert_eq!(config.verification.mode, VerificationMode::Flexible);
        assert_eq!(config.verification.student_count, 1);
        assert_eq!(config.verification.min_score, 0.7);
        assert_eq!(config.monitor_id, 1);
        assert_eq!(config.periods.len(), 9);

        let checkout = config.period(PeriodId::CHECKOUT).unwrap();
        assert_eq!(checkout.window.to_string(), "18:30-18:32");
    }

    #[test]
    fn settings_errors_are_collected() {
        let mut raw = raw_config();
        raw.settings.mode = Some("lenient".into());
        raw.settings.student_count = Some(0);
        raw.settings.monitor_id = Some(0);
        raw.settings.min_score = Some(1.5);
        raw.detector.command = Some(vec![]);

        let errors = Config::from_raw(raw).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::InvalidMode("lenient".into())));
        assert!(errors.contains(&ValidationError::StudentCountOutOfRange(0)));
        assert!(errors.contains(&ValidationError::InvalidMonitor));
        assert!(errors.contains(&ValidationError::MissingCommand("detector")));
    }

    #[test]
    fn student_count_upper_bound() {
        let mut raw = raw_config();
        raw.settings.student_count = Some(100);
        assert!(Config::from_raw(raw.clone()).is_ok());

        raw.settings.student_count = Some(101);
        assert!(Config::from_raw(raw).is_err());
    }
}
