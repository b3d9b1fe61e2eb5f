//! Period state and the registry of all periods

use chrono::{DateTime, Local};
use rollcall_api::{
    AttemptResult, AttemptSummary, Attention, DisplayState, PeriodStatus, PeriodView,
};
use rollcall_config::PeriodSpec;
use rollcall_util::{CaptureWindow, PeriodId, RollcallError, Result};
use std::collections::HashSet;

use crate::AttemptThrottle;

/// One scheduled verification slot
#[derive(Debug, Clone)]
pub struct Period {
    pub id: PeriodId,
    pub label: String,
    pub window: CaptureWindow,
    pub status: PeriodStatus,
    /// Start of the most recent attempt, automatic or manual
    pub last_attempt_at: Option<DateTime<Local>>,
    /// Set by a storage failure; suspends automatic attempts
    pub attention: Option<Attention>,
    pub last_attempt: Option<AttemptSummary>,
}

impl Period {
    pub fn new(spec: PeriodSpec) -> Self {
        Self {
            id: spec.id,
            label: spec.id.label(),
            window: spec.window,
            status: PeriodStatus::Waiting,
            last_attempt_at: None,
            attention: None,
            last_attempt: None,
        }
    }

    /// How the period should be presented
    pub fn display_state(&self, throttle: &AttemptThrottle) -> DisplayState {
        match self.status {
            PeriodStatus::Detecting => DisplayState::Detecting,
            PeriodStatus::Skipped => DisplayState::Skipped,
            PeriodStatus::TimedOut => DisplayState::TimedOut,
            PeriodStatus::Completed => {
                let file = self.last_attempt.as_ref().and_then(|a| match &a.result {
                    AttemptResult::Completed { file } => Some(file.clone()),
                    _ => None,
                });
                DisplayState::Completed { file }
            }
            PeriodStatus::Waiting => {
                if let Some(attention) = &self.attention {
                    DisplayState::NeedsAttention {
                        reason: attention.message.clone(),
                    }
                } else if self.last_attempt_at.is_some() {
                    DisplayState::Retrying {
                        last_detected: self.last_attempt.as_ref().and_then(|a| a.detected),
                        next_attempt_at: throttle.next_attempt_at(self),
                    }
                } else {
                    DisplayState::Idle
                }
            }
        }
    }

    pub fn view(&self, throttle: &AttemptThrottle) -> PeriodView {
        PeriodView {
            period: self.id,
            label: self.label.clone(),
            window: self.window,
            status: self.status,
            display: self.display_state(throttle),
            last_attempt_at: self.last_attempt_at,
            last_attempt: self.last_attempt.clone(),
            attention: self.attention.clone(),
        }
    }
}

/// All periods, held in evaluation order (1..=8, then checkout)
#[derive(Debug, Clone)]
pub struct PeriodRegistry {
    periods: Vec<Period>,
}

impl PeriodRegistry {
    /// Build a registry holding exactly one period per id 0-8
    pub fn new(specs: &[PeriodSpec]) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in specs {
            if !seen.insert(spec.id) {
                return Err(RollcallError::DuplicatePeriod(spec.id));
            }
        }
        if let Some(missing) = PeriodId::all().find(|id| !seen.contains(id)) {
            return Err(RollcallError::MissingPeriod(missing));
        }

        let mut periods: Vec<Period> = specs.iter().copied().map(Period::new).collect();
        periods.sort_by_key(|p| p.id.sort_key());

        Ok(Self { periods })
    }

    pub fn get(&self, id: PeriodId) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PeriodId) -> Option<&mut Period> {
        self.periods.iter_mut().find(|p| p.id == id)
    }

    /// Look up a period, failing with `PeriodNotFound`
    pub fn require_mut(&mut self, id: PeriodId) -> Result<&mut Period> {
        self.get_mut(id).ok_or(RollcallError::PeriodNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Period> {
        self.periods.iter_mut()
    }

    /// Ids in evaluation order
    pub fn ids(&self) -> Vec<PeriodId> {
        self.periods.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Put every period back to a fresh `Waiting` state for a new day.
    /// Returns the periods whose status changed, with the status they left.
    pub fn start_new_day(&mut self) -> Vec<(PeriodId, PeriodStatus)> {
        let mut changed = Vec::new();
        for period in &mut self.periods {
            if period.status != PeriodStatus::Waiting {
                changed.push((period.id, period.status));
            }
            period.status = PeriodStatus::Waiting;
            period.last_attempt_at = None;
            period.attention = None;
            period.last_attempt = None;
        }
        changed
    }
}
