//! Shared types for the rollcalld API

use chrono::{DateTime, Local};
use rollcall_util::{CaptureWindow, PeriodId, RollcallError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Smallest accepted class size
pub const MIN_STUDENT_COUNT: u32 = 1;

/// Largest accepted class size
pub const MAX_STUDENT_COUNT: u32 = 100;

/// Lifecycle status of a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Eligible for automatic attempts while its window is open
    Waiting,
    /// An attempt pipeline is in flight
    Detecting,
    Completed,
    Skipped,
    /// Window elapsed without a successful attempt
    TimedOut,
}

impl PeriodStatus {
    /// Terminal states never receive automatic attempts
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::TimedOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Detecting => "detecting",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headcount policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Detected count must equal the threshold
    Exact,
    /// Detected count must reach 90% of the threshold, truncated
    Flexible,
}

impl VerificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Flexible => "flexible",
        }
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMode {
    type Err = RollcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "flexible" => Ok(Self::Flexible),
            other => Err(RollcallError::config(format!(
                "unknown verification mode '{}' (expected \"exact\" or \"flexible\")",
                other
            ))),
        }
    }
}

/// Settings the orchestrator reads when evaluating an attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationSettings {
    pub mode: VerificationMode,
    pub student_count: u32,
    /// Minimum detector confidence for a face to count
    pub min_score: f32,
}

impl VerificationSettings {
    pub fn validate(&self) -> Result<(), RollcallError> {
        if !(MIN_STUDENT_COUNT..=MAX_STUDENT_COUNT).contains(&self.student_count) {
            return Err(RollcallError::InvalidStudentCount(self.student_count));
        }
        Ok(())
    }

    /// Required headcount: every student plus one instructor
    pub fn threshold(&self) -> u32 {
        self.student_count + 1
    }
}

/// Kind of storage failure, distinguished so operators can be alerted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorKind {
    PermissionDenied,
    OutOfSpace,
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::OutOfSpace => f.write_str("out of space"),
            Self::Other => f.write_str("storage failure"),
        }
    }
}

/// What started an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptTrigger {
    Automatic,
    Manual,
}

/// Result of one attempt pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    Completed { file: PathBuf },
    ConditionNotMet,
    CaptureFailed { error: String },
    DetectionFailed { error: String },
    StorageFailed { kind: StorageErrorKind, error: String },
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Record of the most recent attempt on a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub period: PeriodId,
    pub at: DateTime<Local>,
    pub trigger: AttemptTrigger,
    /// None when capture or detection failed before a count was produced
    pub detected: Option<u32>,
    pub threshold: u32,
    pub effective_minimum: u32,
    pub mode: VerificationMode,
    pub result: AttemptResult,
    pub note: String,
    /// When the next automatic attempt may run. Always None for manual retries.
    pub next_attempt_at: Option<DateTime<Local>>,
}

/// Operator-facing flag for a period stalled on a resource failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attention {
    pub kind: StorageErrorKind,
    pub message: String,
    pub since: DateTime<Local>,
}

/// How a period should be presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    /// Waiting and never attempted
    Idle,
    Detecting,
    /// Waiting after a failed attempt; automatic retries continue
    Retrying {
        last_detected: Option<u32>,
        next_attempt_at: Option<DateTime<Local>>,
    },
    /// Stalled on a storage failure; needs a manual retry
    NeedsAttention { reason: String },
    Completed { file: Option<PathBuf> },
    Skipped,
    TimedOut,
}

/// View of a period for UI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodView {
    pub period: PeriodId,
    pub label: String,
    pub window: CaptureWindow,
    pub status: PeriodStatus,
    pub display: DisplayState,
    pub last_attempt_at: Option<DateTime<Local>>,
    pub last_attempt: Option<AttemptSummary>,
    pub attention: Option<Attention>,
}

/// Full scheduler state for presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub api_version: u32,
    pub at: DateTime<Local>,
    pub settings: VerificationSettings,
    pub threshold: u32,
    pub effective_minimum: u32,
    pub periods: Vec<PeriodView>,
}

/// Status column of an attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Success,
    ConditionNotMet,
    CaptureFailed,
    DetectionFailed,
    StorageFailed,
    Skipped,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ConditionNotMet => "condition_not_met",
            Self::CaptureFailed => "capture_failed",
            Self::DetectionFailed => "detection_failed",
            Self::StorageFailed => "storage_failed",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "condition_not_met" => Ok(Self::ConditionNotMet),
            "capture_failed" => Ok(Self::CaptureFailed),
            "detection_failed" => Ok(Self::DetectionFailed),
            "storage_failed" => Ok(Self::StorageFailed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the attendance log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub timestamp: DateTime<Local>,
    pub period: PeriodId,
    pub period_label: String,
    pub status: AttendanceStatus,
    pub detected_count: u32,
    pub threshold: u32,
    /// Evidence file name, empty when nothing was saved
    pub file_name: String,
    pub note: String,
}
