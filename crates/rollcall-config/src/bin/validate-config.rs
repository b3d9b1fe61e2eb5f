//! Config validation CLI tool
//!
//! Validates a rollcalld configuration file and reports any errors.

use rollcall_config::{load_config, Config, ConfigError, CURRENT_CONFIG_VERSION};
use rollcall_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let Some(config_path) = std::env::args().nth(1).map(PathBuf::from) else {
        let default_path = default_config_path();
        eprintln!("Usage: validate-config [config-file]");
        eprintln!();
        eprintln!("Checks settings, commands and the period timetable.");
        eprintln!("The daemon reads {} by default.", default_path.display());
        return ExitCode::from(2);
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match load_config(&config_path) {
        Ok(config) => {
            println!("✓ {} is valid", config_path.display());
            println!();
            for line in format_summary(&config) {
                println!("{}", line);
            }
            println!();
            println!("Timetable:");
            for line in format_timetable(&config) {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {} is invalid", config_path.display());
            for line in format_problems(&e) {
                eprintln!("  {}", line);
            }
            ExitCode::from(1)
        }
    }
}

fn format_summary(config: &Config) -> Vec<String> {
    let settings = &config.verification;
    vec![
        format!(
            "Policy:   {} mode, {} students, {} faces required",
            settings.mode,
            settings.student_count,
            settings.threshold()
        ),
        format!("Monitor:  {}", config.monitor_id),
        format!("Evidence: {}", config.save_path.display()),
        format!("Capture:  {}", config.capture_command.join(" ")),
        format!("Detector: {} (min score {})", config.detector_command.join(" "), settings.min_score),
    ]
}

/// One line per period, in evaluation order
fn format_timetable(config: &Config) -> Vec<String> {
    config
        .periods
        .iter()
        .map(|spec| {
            let window = spec.window;
            let minutes = window.end().minutes_from_midnight() - window.start().minutes_from_midnight();
            format!("  {:<10} {} ({} min)", spec.id.label(), window, minutes)
        })
        .collect()
}

fn format_problems(error: &ConfigError) -> Vec<String> {
    match error {
        ConfigError::ValidationFailed { errors } => errors.iter().map(|e| format!("- {}", e)).collect(),
        ConfigError::UnsupportedVersion(ver) => vec![format!(
            "config_version {} is not supported (expected {})",
            ver, CURRENT_CONFIG_VERSION
        )],
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_config::parse_config;

    const CONFIG: &str = r#"
        config_version = 1

        [capture]
        command = ["grim", "{output}"]

        [detector]
        command = ["count-faces", "{image}"]
    "#;

    #[test]
    fn timetable_lists_checkout_last_with_length() {
        let config = parse_config(CONFIG).unwrap();
        let lines = format_timetable(&config);

        assert_eq!(lines.len(), 9);
        assert!(lines[0].contains("09:30-09:45 (15 min)"));
        assert!(lines[8].trim_start().starts_with(&config.periods[8].id.label()));
    }

    #[test]
    fn problems_list_every_validation_error() {
        let content = CONFIG.replace("[capture]", "[settings]\nstudent_count = 0\n\n[capture]");
        let err = parse_config(&content).unwrap_err();

        let lines = format_problems(&err);
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.starts_with("- ")));
    }
}
