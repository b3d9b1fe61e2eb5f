//! rollcalld - The rollcall background service
//!
//! Wires together:
//! - Configuration loading
//! - Evidence store and attendance logs
//! - Command-backed capture and detection
//! - The period scheduler
//! - IPC server

mod handlers;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_api::{ClientRole, Command, Event, EventPayload, Request};
use rollcall_config::{load_config, Config};
use rollcall_core::{
    CaptureOrchestrator, Collaborators, CoreEvent, PeriodRegistry, Scheduler, SchedulerHandle,
    Ticker,
};
use rollcall_host_linux::{CommandCapture, CommandDetector};
use rollcall_ipc::{IpcServer, ServerMessage};
use rollcall_store::{
    AttendanceLog, CsvAttendanceLog, FanoutLog, FileEvidenceStore, SqliteAttendanceLog,
};
use rollcall_util::{default_config_path, ClientId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::handlers::{handle_command, CommandContext};

/// rollcalld - Scheduled attendance capture and verification
#[derive(Parser, Debug)]
#[command(name = "rollcalld")]
#[command(about = "Scheduled attendance capture and headcount verification", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/rollcall/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set ROLLCALL_SOCKET env var)
    #[arg(short, long, env = "ROLLCALL_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set ROLLCALL_DATA_DIR env var)
    #[arg(short, long, env = "ROLLCALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Main service state
struct Service {
    ticker: Ticker<Scheduler>,
    core_events: broadcast::Receiver<CoreEvent>,
    ipc: Arc<IpcServer>,
    history: Arc<dyn AttendanceLog>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            mode = %config.verification.mode,
            student_count = config.verification.student_count,
            periods = config.periods.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("attendance.db");
        let history = Arc::new(
            SqliteAttendanceLog::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Attendance history opened");

        let collaborators = collaborators(&config, history.clone());
        let registry = PeriodRegistry::new(&config.periods).context("Invalid timetable")?;
        let orchestrator =
            CaptureOrchestrator::new(registry, config.verification, collaborators)
                .context("Failed to initialize orchestrator")?;

        let scheduler = Scheduler::new(orchestrator);
        let core_events = scheduler.subscribe();
        let ticker = Ticker::new(scheduler);

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", socket_path))?;

        Ok(Self {
            ticker,
            core_events,
            ipc: Arc::new(ipc),
            history,
        })
    }

    async fn run(mut self) -> Result<()> {
        let commands = self.ticker.start().context("Failed to start scheduler")?;
        let ctx = CommandContext {
            scheduler: SchedulerHandle::new(commands),
            history: self.history.clone(),
        };

        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                event = self.core_events.recv() => match event {
                    Ok(event) => forward_core_event(&self.ipc, event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event forwarding fell behind");
                    }
                    Err(RecvError::Closed) => {
                        error!("Scheduler stopped unexpectedly");
                        break;
                    }
                },

                Some(msg) = ipc_messages.recv() => {
                    handle_ipc_message(&ctx, &self.ipc, msg);
                }
            }
        }

        info!("Shutting down rollcalld");

        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        if let Err(e) = self.ticker.stop().await {
            warn!(error = %e, "Scheduler did not stop cleanly");
        }
        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }
}

fn collaborators(config: &Config, history: Arc<SqliteAttendanceLog>) -> Collaborators {
    let csv = Arc::new(CsvAttendanceLog::new(&config.save_path));
    let logs: Vec<Arc<dyn AttendanceLog>> = vec![history, csv];

    Collaborators {
        capture: Arc::new(CommandCapture::new(
            config.capture_command.clone(),
            config.monitor_id,
        )),
        detector: Arc::new(CommandDetector::new(config.detector_command.clone())),
        evidence: Arc::new(FileEvidenceStore::new(&config.save_path)),
        log: Arc::new(FanoutLog::new(logs)),
    }
}

fn forward_core_event(ipc: &IpcServer, event: CoreEvent) {
    match &event {
        CoreEvent::AttemptFinished(summary) => {
            debug!(period = %summary.period, success = summary.result.is_success(), "Forwarding attempt result");
        }
        CoreEvent::StorageFault { period, kind, .. } => {
            warn!(period = %period, kind = %kind, "Storage fault needs operator attention");
        }
        _ => {}
    }

    ipc.broadcast_event(Event::new(event.into()));
}

fn handle_ipc_message(ctx: &CommandContext, ipc: &Arc<IpcServer>, msg: ServerMessage) {
    match msg {
        ServerMessage::Request {
            client_id,
            role,
            request,
        } => {
            // Retries can take as long as a capture and detection; keep the loop free
            tokio::spawn(respond(ctx.clone(), ipc.clone(), client_id, role, request));
        }

        ServerMessage::ClientConnected { client_id, info } => {
            debug!(client_id = %client_id, role = ?info.role, uid = ?info.uid, "Client registered");
        }

        ServerMessage::ClientDisconnected { client_id } => {
            debug!(client_id = %client_id, "Client disconnected");
        }
    }
}

async fn respond(
    ctx: CommandContext,
    ipc: Arc<IpcServer>,
    client_id: ClientId,
    role: ClientRole,
    request: Request,
) {
    let subscribing = matches!(request.command, Command::SubscribeEvents);
    let response = handle_command(&ctx, &client_id, role, request.request_id, request.command).await;

    if let Err(e) = ipc.send_response(&client_id, response).await {
        debug!(client_id = %client_id, error = %e, "Could not deliver response");
        return;
    }

    // New subscribers start from a full snapshot
    if subscribing {
        match ctx.scheduler.snapshot().await {
            Ok(snapshot) => {
                let event = Event::new(EventPayload::StateChanged(snapshot));
                let _ = ipc.send_event(&client_id, &event).await;
            }
            Err(e) => warn!(error = %e, "Could not send initial snapshot"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "rollcalld starting");

    if rollcall_util::is_mock_time_active() {
        warn!(now = %rollcall_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
