//! Event types for rollcalld -> client streaming

use chrono::{DateTime, Local};
use rollcall_util::PeriodId;
use serde::{Deserialize, Serialize};

use crate::{
    AttemptSummary, PeriodStatus, SchedulerSnapshot, StorageErrorKind, VerificationSettings,
    API_VERSION,
};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: rollcall_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full state snapshot (sent on subscribe)
    StateChanged(SchedulerSnapshot),

    /// A period moved between statuses
    StatusChanged {
        period: PeriodId,
        from: PeriodStatus,
        to: PeriodStatus,
    },

    /// An attempt pipeline finished, successfully or not
    AttemptFinished(AttemptSummary),

    /// Evidence could not be written; automatic attempts for the period are suspended
    StorageFault {
        period: PeriodId,
        kind: StorageErrorKind,
        message: String,
    },

    PeriodTimedOut {
        period: PeriodId,
    },

    SettingsChanged(VerificationSettings),

    /// Service is shutting down
    Shutdown,
}
