//! Periodic driver for the scheduler

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Time between evaluation passes
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum TickerError {
    #[error("Ticker is already running")]
    AlreadyRunning,

    #[error("Ticker is not running")]
    NotRunning,

    #[error("Ticker task failed: {0}")]
    TaskFailed(String),
}

/// Work driven by a [`Ticker`].
///
/// Ticks and commands are delivered to the same task, one at a time.
#[async_trait]
pub trait TickHandler: Send + 'static {
    type Command: Send + 'static;

    async fn tick(&mut self, now: DateTime<Local>);

    async fn handle(&mut self, command: Self::Command);
}

struct Running<H: TickHandler> {
    shutdown: watch::Sender<bool>,
    commands: mpsc::Sender<H::Command>,
    task: JoinHandle<H>,
}

/// Runs a handler's tick once per interval on a dedicated task.
///
/// A pass that overruns the interval delays the next tick rather than
/// skipping it. Stopping lets the in-flight pass finish and hands the
/// handler back, so the ticker can be started again.
pub struct Ticker<H: TickHandler> {
    handler: Option<H>,
    running: Option<Running<H>>,
    interval: Duration,
    clock: fn() -> DateTime<Local>,
}

impl<H: TickHandler> Ticker<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Some(handler),
            running: None,
            interval: TICK_INTERVAL,
            clock: rollcall_util::now,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the wall clock passed to each tick
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The handler, while the ticker is stopped
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Sender for commands, while the ticker is running
    pub fn commands(&self) -> Option<mpsc::Sender<H::Command>> {
        self.running.as_ref().map(|r| r.commands.clone())
    }

    /// Start ticking. Returns the command sender for the running task.
    pub fn start(&mut self) -> Result<mpsc::Sender<H::Command>, TickerError> {
        if self.running.is_some() {
            return Err(TickerError::AlreadyRunning);
        }
        let handler = self
            .handler
            .take()
            .ok_or_else(|| TickerError::TaskFailed("handler lost by a previous run".into()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let task = tokio::spawn(run(handler, self.interval, self.clock, shutdown_rx, command_rx));

        info!(interval = ?self.interval, "Ticker started");
        self.running = Some(Running {
            shutdown: shutdown_tx,
            commands: command_tx.clone(),
            task,
        });

        Ok(command_tx)
    }

    /// Stop ticking and wait for the in-flight pass, if any, to finish
    pub async fn stop(&mut self) -> Result<(), TickerError> {
        let running = self.running.take().ok_or(TickerError::NotRunning)?;

        let _ = running.shutdown.send(true);
        drop(running.commands);

        let handler = running
            .task
            .await
            .map_err(|e| TickerError::TaskFailed(e.to_string()))?;
        self.handler = Some(handler);

        info!("Ticker stopped");
        Ok(())
    }
}

async fn run<H: TickHandler>(
    mut handler: H,
    interval: Duration,
    clock: fn() -> DateTime<Local>,
    mut shutdown: watch::Receiver<bool>,
    mut commands: mpsc::Receiver<H::Command>,
) -> H {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                debug!("Ticker received shutdown");
                break;
            }
            Some(command) = commands.recv() => {
                handler.handle(command).await;
            }
            _ = ticks.tick() => {
                handler.tick(clock()).await;
            }
        }
    }

    handler
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct Counter {
        ticks: u32,
        commands: Vec<&'static str>,
    }

    enum CounterCommand {
        Note(&'static str, oneshot::Sender<u32>),
    }

    #[async_trait]
    impl TickHandler for Counter {
        type Command = CounterCommand;

        async fn tick(&mut self, _now: DateTime<Local>) {
            self.ticks += 1;
        }

        async fn handle(&mut self, command: CounterCommand) {
            match command {
                CounterCommand::Note(name, reply) => {
                    self.commands.push(name);
                    let _ = reply.send(self.ticks);
                }
            }
        }
    }

    fn fixed_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let mut ticker = Ticker::new(Counter::default()).with_clock(fixed_clock);
        ticker.start().unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        ticker.stop().await.unwrap();

        // Immediate first tick, then at 1s, 2s and 3s.
        assert_eq!(ticker.handler().unwrap().ticks, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_reach_the_handler() {
        let mut ticker = Ticker::new(Counter::default());
        let commands = ticker.start().unwrap();

        let (tx, rx) = oneshot::channel();
        commands.send(CounterCommand::Note("skip", tx)).await.unwrap();
        rx.await.unwrap();

        ticker.stop().await.unwrap();
        assert_eq!(ticker.handler().unwrap().commands, vec!["skip"]);
    }

    #[tokio::test(start_paused = true)]
    async fn misuse_is_reported() {
        let mut ticker = Ticker::new(Counter::default());
        assert!(matches!(ticker.stop().await, Err(TickerError::NotRunning)));

        ticker.start().unwrap();
        assert!(matches!(ticker.start(), Err(TickerError::AlreadyRunning)));
        assert!(ticker.is_running());

        ticker.stop().await.unwrap();
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_handler_state() {
        let mut ticker = Ticker::new(Counter::default());

        ticker.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        ticker.stop().await.unwrap();
        let first_run = ticker.handler().unwrap().ticks;
        assert!(first_run >= 1);

        ticker.start().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        ticker.stop().await.unwrap();
        assert!(ticker.handler().unwrap().ticks > first_run);
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_after_stop() {
        let mut ticker = Ticker::new(Counter::default());
        ticker.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        ticker.stop().await.unwrap();
        let ticks = ticker.handler().unwrap().ticks;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticker.handler().unwrap().ticks, ticks);
    }
}
