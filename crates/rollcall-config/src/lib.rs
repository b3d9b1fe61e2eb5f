//! Configuration parsing and validation for rollcalld
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Verification settings (mode, student count, detector score floor)
//! - Capture and detector commands
//! - An optional timetable override, defaulting to the built-in nine periods
//! - Validation that reports every error at once

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading configuration");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    Config::from_raw(raw).map_err(|errors| ConfigError::ValidationFailed { errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_api::VerificationMode;
    use rollcall_util::PeriodId;
    use std::io::Write;

    const MINIMAL: &str = r#"
        config_version = 1

        [capture]
        command = ["grim", "{output}"]

        [detector]
        command = ["count-faces", "{image}"]
    "#;

    #[test]
    fn parse_minimal_config() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.periods.len(), 9);
        assert_eq!(config.capture_command[0], "grim");
    }

    #[test]
    fn parse_full_config() {
        let content = r#"
            config_version = 1

            [settings]
            monitor_id = 2
            save_path = "/srv/attendance"
            mode = "exact"
            student_count = 21
            min_score = 0.5

            [capture]
            command = ["grim", "-o", "{monitor}", "{output}"]

            [detector]
            command = ["count-faces", "--min-score", "{min_score}", "{image}"]

            [[periods]]
            id = 1
            start = "08:00"
            end = "08:20"
            [[periods]]
            id = 2
            start = "09:00"
            end = "09:20"
            [[periods]]
            id = 3
            start = "10:00"
            end = "10:20"
            [[periods]]
            id = 4
            start = "11:00"
            end = "11:20"
            [[periods]]
            id = 5
            start = "13:00"
            end = "13:20"
            [[periods]]
            id = 6
            start = "14:00"
            end = "14:20"
            [[periods]]
            id = 7
            start = "15:00"
            end = "15:20"
            [[periods]]
            id = 8
            start = "16:00"
            end = "16:20"
            [[periods]]
            id = 0
            start = "17:00"
            end = "17:05"
        "#;

        let config = parse_config(content).unwrap();
        assert_eq!(config.verification.mode, VerificationMode::Exact);
        assert_eq!(config.verification.threshold(), 22);
        assert_eq!(config.monitor_id, 2);

        let first = config.period(PeriodId::new(1).unwrap()).unwrap();
        assert_eq!(first.window.to_string(), "08:00-08:20");
        assert_eq!(config.periods.last().unwrap().id, PeriodId::CHECKOUT);
    }

    #[test]
    fn reject_wrong_version() {
        let content = MINIMAL.replace("config_version = 1", "config_version = 99");
        let result = parse_config(&content);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_incomplete_timetable() {
        let content = format!(
            "{}\n[[periods]]\nid = 1\nstart = \"09:30\"\nend = \"09:45\"\n",
            MINIMAL
        );
        match parse_config(&content) {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert_eq!(errors.len(), 8);
                assert!(errors.contains(&ValidationError::MissingPeriod(0)));
            }
            other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn shipped_example_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config.example.toml");
        let config = load_config(path).unwrap();
        assert_eq!(config.verification.mode, VerificationMode::Flexible);
        assert_eq!(config.verification.student_count, 21);
        assert_eq!(config.periods.len(), 9);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.detector_command[0], "count-faces");
    }
}
