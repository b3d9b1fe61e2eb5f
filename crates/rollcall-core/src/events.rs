//! Core events emitted by the orchestrator

use rollcall_api::{
    AttemptSummary, EventPayload, PeriodStatus, StorageErrorKind, VerificationSettings,
};
use rollcall_util::PeriodId;

/// Events emitted by the orchestrator
#[derive(Debug, Clone)]
pub enum CoreEvent {
    StatusChanged {
        period: PeriodId,
        from: PeriodStatus,
        to: PeriodStatus,
    },

    AttemptFinished(AttemptSummary),

    /// Evidence could not be saved; the period waits for a manual retry
    StorageFault {
        period: PeriodId,
        kind: StorageErrorKind,
        message: String,
    },

    PeriodTimedOut {
        period: PeriodId,
    },

    SettingsChanged(VerificationSettings),
}

impl From<CoreEvent> for EventPayload {
    fn from(event: CoreEvent) -> Self {
        match event {
            CoreEvent::StatusChanged { period, from, to } => {
                EventPayload::StatusChanged { period, from, to }
            }
            CoreEvent::AttemptFinished(summary) => EventPayload::AttemptFinished(summary),
            CoreEvent::StorageFault {
                period,
                kind,
                message,
            } => EventPayload::StorageFault {
                period,
                kind,
                message,
            },
            CoreEvent::PeriodTimedOut { period } => EventPayload::PeriodTimedOut { period },
            CoreEvent::SettingsChanged(settings) => EventPayload::SettingsChanged(settings),
        }
    }
}
