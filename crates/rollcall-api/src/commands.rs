//! Command types for the rollcalld protocol

use rollcall_util::{ClientId, PeriodId};
use serde::{Deserialize, Serialize};

use crate::{
    AttemptSummary, AttendanceRecord, SchedulerSnapshot, VerificationMode, VerificationSettings,
    API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    PeriodNotFound,
    InvalidTransition,
    InvalidSettings,
    PermissionDenied,
    SchedulerUnavailable,
    StoreError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get the current scheduler snapshot
    GetState,

    /// Mark a period as skipped (operator only)
    Skip { period: PeriodId },

    /// Run one attempt immediately, ignoring window and throttle (operator only)
    Retry { period: PeriodId },

    /// Change verification settings; unset fields are left alone (operator only)
    UpdateSettings {
        mode: Option<VerificationMode>,
        student_count: Option<u32>,
    },

    /// Most recent attendance records, newest first
    RecentLog { limit: usize },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command changes scheduler state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Skip { .. } | Command::Retry { .. } | Command::UpdateSettings { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(SchedulerSnapshot),
    Skipped {
        period: PeriodId,
        /// True when the period was already skipped and nothing changed
        already: bool,
    },
    RetryFinished(AttemptSummary),
    SettingsUpdated(VerificationSettings),
    Log(Vec<AttendanceRecord>),
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Pong,
}

/// Client role, derived from the connecting peer's uid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same user as the service, or root: may skip, retry and change settings
    Operator,
    /// Read-only
    Observer,
}

impl ClientRole {
    pub fn can_mutate(&self) -> bool {
        matches!(self, ClientRole::Operator)
    }
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}
