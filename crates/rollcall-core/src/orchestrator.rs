//! Attempt orchestration: capture, detect, evaluate, save, log

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::{
    AttemptResult, AttemptSummary, AttemptTrigger, Attention, AttendanceRecord,
    AttendanceStatus, PeriodStatus, SchedulerSnapshot, VerificationMode, VerificationSettings,
    API_VERSION,
};
use rollcall_host_api::{Capture, Detector};
use rollcall_store::{AttendanceLog, EvidenceStore};
use rollcall_util::{MonotonicInstant, PeriodId, RollcallError, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    effective_minimum, AttemptThrottle, ConditionEvaluator, CoreEvent, PeriodRegistry,
    TimeoutMonitor,
};

/// Report of a single attempt
pub type AttemptReport = AttemptSummary;

/// External services the pipeline depends on
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn Capture>,
    pub detector: Arc<dyn Detector>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub log: Arc<dyn AttendanceLog>,
}

/// Result of a skip request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipOutcome {
    pub period: PeriodId,
    /// The period was already skipped; nothing changed
    pub already: bool,
}

/// Drives every period through its lifecycle.
///
/// All mutation goes through `&mut self`, so passes and manual commands
/// never interleave. Events produced by any operation are buffered until
/// [`CaptureOrchestrator::take_events`].
pub struct CaptureOrchestrator {
    registry: PeriodRegistry,
    settings: VerificationSettings,
    throttle: AttemptThrottle,
    collaborators: Collaborators,
    events: Vec<CoreEvent>,
    /// Local date the registry currently describes
    day: Option<NaiveDate>,
}

impl CaptureOrchestrator {
    pub fn new(
        registry: PeriodRegistry,
        settings: VerificationSettings,
        collaborators: Collaborators,
    ) -> Result<Self> {
        settings.validate()?;

        info!(
            periods = registry.len(),
            mode = %settings.mode,
            student_count = settings.student_count,
            threshold = settings.threshold(),
            "Orchestrator initialized"
        );

        Ok(Self {
            registry,
            settings,
            throttle: AttemptThrottle::default(),
            collaborators,
            events: Vec::new(),
            day: None,
        })
    }

    pub fn registry(&self) -> &PeriodRegistry {
        &self.registry
    }

    pub fn settings(&self) -> VerificationSettings {
        self.settings
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// One evaluation pass: expire elapsed windows, then attempt every
    /// eligible period in registry order.
    pub async fn tick(&mut self, now: DateTime<Local>) {
        self.roll_over(&now);

        for period in TimeoutMonitor::expire_elapsed(&mut self.registry, &now) {
            self.events.push(CoreEvent::StatusChanged {
                period,
                from: PeriodStatus::Waiting,
                to: PeriodStatus::TimedOut,
            });
            self.events.push(CoreEvent::PeriodTimedOut { period });
        }

        for id in self.registry.ids() {
            if !self.should_attempt(id, &now) {
                continue;
            }
            if let Err(e) = self.run_attempt(id, AttemptTrigger::Automatic, now).await {
                warn!(period = %id, error = %e, "Attempt could not start");
            }
        }
    }

    /// The timetable repeats daily; a new local date starts every period over
    fn roll_over(&mut self, now: &DateTime<Local>) {
        let today = now.date_naive();
        let Some(previous) = self.day.replace(today) else {
            return;
        };
        if previous == today {
            return;
        }

        info!(%previous, %today, "Date changed, resetting periods");
        for (period, from) in self.registry.start_new_day() {
            self.events.push(CoreEvent::StatusChanged {
                period,
                from,
                to: PeriodStatus::Waiting,
            });
        }
    }

    fn should_attempt(&self, id: PeriodId, now: &DateTime<Local>) -> bool {
        let Some(period) = self.registry.get(id) else {
            return false;
        };

        period.status == PeriodStatus::Waiting
            && period.attention.is_none()
            && period.window.contains(now)
            && self.throttle.eligible(period, now)
    }

    /// Mark a period as skipped.
    ///
    /// Allowed from `Waiting` or `Detecting`. Skipping an already skipped
    /// period changes nothing and writes no record.
    pub fn skip(&mut self, id: PeriodId, now: DateTime<Local>) -> Result<SkipOutcome> {
        let threshold = self.settings.threshold();
        let period = self.registry.require_mut(id)?;

        let from = period.status;
        match from {
            PeriodStatus::Skipped => {
                debug!(period = %id, "Period already skipped");
                return Ok(SkipOutcome {
                    period: id,
                    already: true,
                });
            }
            PeriodStatus::Completed | PeriodStatus::TimedOut => {
                return Err(RollcallError::InvalidTransition {
                    period: id,
                    action: "skip",
                    status: from.to_string(),
                });
            }
            PeriodStatus::Waiting | PeriodStatus::Detecting => {}
        }

        period.status = PeriodStatus::Skipped;
        period.attention = None;
        let label = period.label.clone();

        info!(period = %id, "Period skipped");
        self.events.push(CoreEvent::StatusChanged {
            period: id,
            from,
            to: PeriodStatus::Skipped,
        });

        self.append_record(AttendanceRecord {
            timestamp: now,
            period: id,
            period_label: label,
            status: AttendanceStatus::Skipped,
            detected_count: 0,
            threshold,
            file_name: String::new(),
            note: "skipped by operator".into(),
        });

        Ok(SkipOutcome {
            period: id,
            already: false,
        })
    }

    /// Reset a period and run one attempt immediately, ignoring its window
    /// and the throttle. The returned report describes that single attempt.
    pub async fn retry(&mut self, id: PeriodId, now: DateTime<Local>) -> Result<AttemptReport> {
        let period = self.registry.require_mut(id)?;

        let from = period.status;
        period.last_attempt_at = None;
        period.attention = None;
        period.status = PeriodStatus::Waiting;

        info!(period = %id, previous = %from, "Manual retry requested");
        if from != PeriodStatus::Waiting {
            self.events.push(CoreEvent::StatusChanged {
                period: id,
                from,
                to: PeriodStatus::Waiting,
            });
        }

        self.run_attempt(id, AttemptTrigger::Manual, now).await
    }

    /// Replace the verification policy for subsequent attempts
    pub fn update_settings(
        &mut self,
        mode: Option<VerificationMode>,
        student_count: Option<u32>,
    ) -> Result<VerificationSettings> {
        let updated = VerificationSettings {
            mode: mode.unwrap_or(self.settings.mode),
            student_count: student_count.unwrap_or(self.settings.student_count),
            min_score: self.settings.min_score,
        };
        updated.validate()?;

        if updated != self.settings {
            self.settings = updated;
            info!(
                mode = %updated.mode,
                student_count = updated.student_count,
                threshold = updated.threshold(),
                "Verification settings updated"
            );
            self.events.push(CoreEvent::SettingsChanged(updated));
        }

        Ok(updated)
    }

    pub fn snapshot(&self, now: DateTime<Local>) -> SchedulerSnapshot {
        let threshold = self.settings.threshold();
        SchedulerSnapshot {
            api_version: API_VERSION,
            at: now,
            settings: self.settings,
            threshold,
            effective_minimum: effective_minimum(threshold, self.settings.mode),
            periods: self
                .registry
                .iter()
                .map(|p| p.view(&self.throttle))
                .collect(),
        }
    }

    /// Run the capture pipeline once.
    ///
    /// For automatic attempts `within_window` is decided when the pipeline
    /// finishes, so a slow detector can push a save past the window end.
    async fn run_attempt(
        &mut self,
        id: PeriodId,
        trigger: AttemptTrigger,
        started_at: DateTime<Local>,
    ) -> Result<AttemptReport> {
        let settings = self.settings;
        let threshold = settings.threshold();
        let minimum = effective_minimum(threshold, settings.mode);
        let mono_start = MonotonicInstant::now();

        let period = self.registry.require_mut(id)?;
        let window = period.window;
        let label = period.label.clone();
        period.status = PeriodStatus::Detecting;
        self.throttle.record_attempt(period, started_at);
        self.events.push(CoreEvent::StatusChanged {
            period: id,
            from: PeriodStatus::Waiting,
            to: PeriodStatus::Detecting,
        });

        debug!(period = %id, ?trigger, threshold, "Attempt started");

        let (result, detected, note) = match self.collaborators.capture.grab().await {
            Err(e) => {
                warn!(period = %id, error = %e, "Capture failed");
                let error = e.to_string();
                let note = format!("capture failed: {}", error);
                (AttemptResult::CaptureFailed { error }, None, note)
            }
            Ok(frame) => {
                match self
                    .collaborators
                    .detector
                    .count(&frame.image, settings.min_score)
                    .await
                {
                    Err(e) => {
                        warn!(period = %id, error = %e, "Detection failed");
                        let error = e.to_string();
                        let note = format!("detection failed: {}", error);
                        (AttemptResult::DetectionFailed { error }, None, note)
                    }
                    Ok(count) => {
                        let eval = ConditionEvaluator::evaluate(count, threshold, settings.mode);
                        if !eval.passed {
                            info!(
                                period = %id,
                                detected = count,
                                threshold,
                                minimum = eval.effective_minimum,
                                "Headcount condition not met"
                            );
                            (AttemptResult::ConditionNotMet, Some(count), eval.note)
                        } else {
                            let finished_at = advance(started_at, mono_start);
                            let within_window = match trigger {
                                AttemptTrigger::Automatic => window.contains(&finished_at),
                                AttemptTrigger::Manual => window.contains(&started_at),
                            };

                            match self.collaborators.evidence.save(
                                &frame.image,
                                id,
                                within_window,
                                finished_at,
                            ) {
                                Ok(file) => {
                                    (AttemptResult::Completed { file }, Some(count), eval.note)
                                }
                                Err(e) => {
                                    let kind = e.kind();
                                    error!(
                                        period = %id,
                                        kind = %kind,
                                        error = %e,
                                        "Evidence could not be saved"
                                    );
                                    let error = e.to_string();
                                    let note = format!("save failed: {}", error);
                                    (AttemptResult::StorageFailed { kind, error }, Some(count), note)
                                }
                            }
                        }
                    }
                }
            }
        };

        let finished_at = advance(started_at, mono_start);
        let period = self.registry.require_mut(id)?;

        let to = match &result {
            AttemptResult::Completed { file } => {
                info!(period = %id, file = %file.display(), ?trigger, "Attendance verified");
                period.attention = None;
                PeriodStatus::Completed
            }
            AttemptResult::StorageFailed { kind, error } => {
                period.attention = Some(Attention {
                    kind: *kind,
                    message: error.clone(),
                    since: finished_at,
                });
                self.events.push(CoreEvent::StorageFault {
                    period: id,
                    kind: *kind,
                    message: error.clone(),
                });
                PeriodStatus::Waiting
            }
            _ => PeriodStatus::Waiting,
        };
        period.status = to;

        let next_attempt_at = match (trigger, to) {
            (AttemptTrigger::Automatic, PeriodStatus::Waiting) if period.attention.is_none() => {
                self.throttle.next_attempt_at(period)
            }
            _ => None,
        };

        let summary = AttemptSummary {
            period: id,
            at: started_at,
            trigger,
            detected,
            threshold,
            effective_minimum: minimum,
            mode: settings.mode,
            result,
            note,
            next_attempt_at,
        };
        period.last_attempt = Some(summary.clone());

        self.events.push(CoreEvent::StatusChanged {
            period: id,
            from: PeriodStatus::Detecting,
            to,
        });
        self.events.push(CoreEvent::AttemptFinished(summary.clone()));

        self.append_record(record_for(&summary, label, finished_at));
        Ok(summary)
    }

    /// Log failures are reported but never abort an attempt
    fn append_record(&self, record: AttendanceRecord) {
        if let Err(e) = self.collaborators.log.append(&record) {
            warn!(
                period = %record.period,
                status = %record.status,
                error = %e,
                "Failed to write attendance record"
            );
        }
    }
}

fn advance(base: DateTime<Local>, since: MonotonicInstant) -> DateTime<Local> {
    chrono::Duration::from_std(since.elapsed())
        .map(|elapsed| base + elapsed)
        .unwrap_or(base)
}

fn record_for(summary: &AttemptSummary, label: String, at: DateTime<Local>) -> AttendanceRecord {
    let (status, file_name) = match &summary.result {
        AttemptResult::Completed { file } => (
            AttendanceStatus::Success,
            file.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
        AttemptResult::ConditionNotMet => (AttendanceStatus::ConditionNotMet, String::new()),
        AttemptResult::CaptureFailed { .. } => (AttendanceStatus::CaptureFailed, String::new()),
        AttemptResult::DetectionFailed { .. } => {
            (AttendanceStatus::DetectionFailed, String::new())
        }
        AttemptResult::StorageFailed { .. } => (AttendanceStatus::StorageFailed, String::new()),
    };

    AttendanceRecord {
        timestamp: at,
        period: summary.period,
        period_label: label,
        status,
        detected_count: summary.detected.unwrap_or(0),
        threshold: summary.threshold,
        file_name,
        note: summary.note.clone(),
    }
}
