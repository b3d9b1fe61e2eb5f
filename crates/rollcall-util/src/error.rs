//! Error types for rollcall

use thiserror::Error;

use crate::{PeriodId, WallClock};

/// Core error type for rollcall operations
#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("Period not found: {0}")]
    PeriodNotFound(PeriodId),

    #[error("Invalid period id {0}: expected 0-8")]
    InvalidPeriodId(u8),

    #[error("Duplicate period id: {0}")]
    DuplicatePeriod(PeriodId),

    #[error("Missing period id: {0}")]
    MissingPeriod(PeriodId),

    #[error("Invalid capture window {start}-{end}: start must be before end")]
    InvalidWindow { start: WallClock, end: WallClock },

    #[error("Cannot {action} period {period} while it is {status}")]
    InvalidTransition {
        period: PeriodId,
        action: &'static str,
        status: String,
    },

    #[error("Student count {0} out of range (1-100)")]
    InvalidStudentCount(u32),

    #[error("Scheduler is not running")]
    SchedulerUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Host error: {0}")]
    HostError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RollcallError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::HostError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
