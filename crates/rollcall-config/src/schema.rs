//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Verification and evidence settings
    #[serde(default)]
    pub settings: RawSettings,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Screenshot command
    #[serde(default)]
    pub capture: RawCommandConfig,

    /// Face-count command
    #[serde(default)]
    pub detector: RawCommandConfig,

    /// Timetable override. When absent the built-in timetable applies.
    #[serde(default)]
    pub periods: Option<Vec<RawPeriod>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSettings {
    /// Monitor to capture, 1-based
    pub monitor_id: Option<u32>,

    /// Root folder for evidence images and the daily CSV log (default: ~/Desktop)
    pub save_path: Option<PathBuf>,

    /// "exact" or "flexible" (default: flexible)
    pub mode: Option<String>,

    /// Number of students, 1-100 (default: 1)
    pub student_count: Option<u32>,

    /// Detector confidence floor, 0.0-1.0 (default: 0.7)
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/rollcall/rollcalld.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the attendance database
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCommandConfig {
    /// argv with `{placeholder}` substitution
    pub command: Option<Vec<String>>,
}

/// One `[[periods]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPeriod {
    pub id: u8,
    /// HH:MM, inclusive
    pub start: String,
    /// HH:MM, exclusive
    pub end: String,
}
