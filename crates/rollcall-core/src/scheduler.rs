//! Scheduler task: the orchestrator behind a ticker and a command channel

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rollcall_api::{SchedulerSnapshot, VerificationMode, VerificationSettings};
use rollcall_util::{PeriodId, Result, RollcallError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use crate::{AttemptReport, CaptureOrchestrator, CoreEvent, SkipOutcome, TickHandler};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Manual commands, answered on a oneshot reply
pub enum SchedulerCommand {
    Snapshot {
        reply: oneshot::Sender<SchedulerSnapshot>,
    },
    Skip {
        period: PeriodId,
        reply: oneshot::Sender<Result<SkipOutcome>>,
    },
    Retry {
        period: PeriodId,
        reply: oneshot::Sender<Result<AttemptReport>>,
    },
    UpdateSettings {
        mode: Option<VerificationMode>,
        student_count: Option<u32>,
        reply: oneshot::Sender<Result<VerificationSettings>>,
    },
}

/// Tick handler owning the orchestrator; publishes its events on a broadcast channel
pub struct Scheduler {
    orchestrator: CaptureOrchestrator,
    events: broadcast::Sender<CoreEvent>,
    clock: fn() -> DateTime<Local>,
}

impl Scheduler {
    pub fn new(orchestrator: CaptureOrchestrator) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            orchestrator,
            events,
            clock: rollcall_util::now,
        }
    }

    /// Override the wall clock used for manual commands
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    fn publish(&mut self) {
        for event in self.orchestrator.take_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl TickHandler for Scheduler {
    type Command = SchedulerCommand;

    async fn tick(&mut self, now: DateTime<Local>) {
        self.orchestrator.tick(now).await;
        self.publish();
    }

    async fn handle(&mut self, command: SchedulerCommand) {
        let now = (self.clock)();

        match command {
            SchedulerCommand::Snapshot { reply } => {
                let _ = reply.send(self.orchestrator.snapshot(now));
            }
            SchedulerCommand::Skip { period, reply } => {
                let result = self.orchestrator.skip(period, now);
                let _ = reply.send(result);
            }
            SchedulerCommand::Retry { period, reply } => {
                let result = self.orchestrator.retry(period, now).await;
                let _ = reply.send(result);
            }
            SchedulerCommand::UpdateSettings {
                mode,
                student_count,
                reply,
            } => {
                let result = self.orchestrator.update_settings(mode, student_count);
                let _ = reply.send(result);
            }
        }

        self.publish();
    }
}

/// Cloneable client for a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn new(commands: mpsc::Sender<SchedulerCommand>) -> Self {
        Self { commands }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| RollcallError::SchedulerUnavailable)?;
        rx.await.map_err(|_| {
            debug!("Scheduler dropped a reply");
            RollcallError::SchedulerUnavailable
        })
    }

    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        self.request(|reply| SchedulerCommand::Snapshot { reply }).await
    }

    pub async fn skip(&self, period: PeriodId) -> Result<SkipOutcome> {
        self.request(|reply| SchedulerCommand::Skip { period, reply })
            .await?
    }

    pub async fn retry(&self, period: PeriodId) -> Result<AttemptReport> {
        self.request(|reply| SchedulerCommand::Retry { period, reply })
            .await?
    }

    pub async fn update_settings(
        &self,
        mode: Option<VerificationMode>,
        student_count: Option<u32>,
    ) -> Result<VerificationSettings> {
        self.request(|reply| SchedulerCommand::UpdateSettings {
            mode,
            student_count,
            reply,
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::tests::default_specs;
    use crate::{Collaborators, PeriodRegistry, Ticker};
    use chrono::TimeZone;
    use rollcall_api::PeriodStatus;
    use rollcall_host_api::{MockCapture, MockDetector};
    use rollcall_store::{MemoryEvidenceStore, MemoryLog};
    use std::sync::Arc;

    fn half_past_nine() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap()
    }

    fn scheduler(detected: u32) -> Scheduler {
        let orchestrator = CaptureOrchestrator::new(
            PeriodRegistry::new(&default_specs()).unwrap(),
            VerificationSettings {
                mode: VerificationMode::Flexible,
                student_count: 21,
                min_score: 0.7,
            },
            Collaborators {
                capture: Arc::new(MockCapture::new()),
                detector: Arc::new(MockDetector::new(detected)),
                evidence: Arc::new(MemoryEvidenceStore::new()),
                log: Arc::new(MemoryLog::new()),
            },
        )
        .unwrap();
        Scheduler::new(orchestrator).with_clock(half_past_nine)
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_scheduler_and_publishes_events() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();

        let mut ticker = Ticker::new(scheduler).with_clock(half_past_nine);
        let handle = SchedulerHandle::new(ticker.start().unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.periods[0].status, PeriodStatus::Completed);

        let mut saw_attempt = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::AttemptFinished(_)) {
                saw_attempt = true;
            }
        }
        assert!(saw_attempt);

        ticker.stop().await.unwrap();
        assert!(matches!(
            handle.snapshot().await,
            Err(RollcallError::SchedulerUnavailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_transition_errors() {
        let mut ticker = Ticker::new(scheduler(20)).with_clock(half_past_nine);
        let handle = SchedulerHandle::new(ticker.start().unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        // Period 1 completed on the first tick.
        let result = handle.skip(PeriodId::new(1).unwrap()).await;
        assert!(matches!(result, Err(RollcallError::InvalidTransition { .. })));

        let outcome = handle.skip(PeriodId::new(2).unwrap()).await.unwrap();
        assert!(!outcome.already);

        let settings = handle.update_settings(None, Some(30)).await.unwrap();
        assert_eq!(settings.threshold(), 31);

        ticker.stop().await.unwrap();
    }
}
