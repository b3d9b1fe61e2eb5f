//! rollcallctl - control client for rollcalld
//!
//! Shows period state, skips or retries periods, changes the headcount
//! policy and follows the event stream.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rollcall_api::{
    AttemptSummary, Command, DisplayState, EventPayload, PeriodView, ResponsePayload,
    ResponseResult, SchedulerSnapshot, VerificationMode,
};
use rollcall_ipc::IpcClient;
use rollcall_util::{default_socket_path, format_clock_time, format_countdown, PeriodId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rollcallctl")]
#[command(about = "Control the rollcalld attendance service", long_about = None)]
struct Args {
    /// Socket path (or set ROLLCALL_SOCKET env var)
    #[arg(short, long, env = "ROLLCALL_SOCKET", default_value_os_t = default_socket_path())]
    socket: PathBuf,

    /// Print raw JSON responses
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show every period and the current policy
    Status,
    /// Mark a period as skipped (0 = checkout, 1-8 = class periods)
    Skip { period: u8 },
    /// Reset a period and run one attempt now
    Retry { period: u8 },
    /// Set the verification mode
    SetMode { mode: VerificationMode },
    /// Set the number of students (the instructor is added automatically)
    SetStudents { count: u32 },
    /// Show recent attendance records
    Log {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Follow service events until interrupted
    Watch,
    /// Check that the service is answering
    Ping,
}

fn period_arg(raw: u8) -> Result<PeriodId> {
    PeriodId::new(raw).with_context(|| format!("invalid period {}: expected 0-8", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut client = IpcClient::connect(&args.socket)
        .await
        .with_context(|| format!("Failed to connect to rollcalld at {:?}", args.socket))?;

    let command = match args.command {
        Action::Status => Command::GetState,
        Action::Skip { period } => Command::Skip {
            period: period_arg(period)?,
        },
        Action::Retry { period } => Command::Retry {
            period: period_arg(period)?,
        },
        Action::SetMode { mode } => Command::UpdateSettings {
            mode: Some(mode),
            student_count: None,
        },
        Action::SetStudents { count } => Command::UpdateSettings {
            mode: None,
            student_count: Some(count),
        },
        Action::Log { limit } => Command::RecentLog { limit },
        Action::Ping => Command::Ping,
        Action::Watch => return watch(client, args.json).await,
    };

    let response = client.send(command).await?;
    let payload = match response.result {
        ResponseResult::Ok(payload) => payload,
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::State(snapshot) => print_snapshot(&snapshot),
        ResponsePayload::Skipped { period, already } => {
            if already {
                println!("{} was already skipped", period.label());
            } else {
                println!("{} skipped", period.label());
            }
        }
        ResponsePayload::RetryFinished(report) => print_attempt(&report),
        ResponsePayload::SettingsUpdated(settings) => {
            println!(
                "Mode {}, {} students (required headcount {})",
                settings.mode,
                settings.student_count,
                settings.threshold()
            );
        }
        ResponsePayload::Log(records) => {
            if records.is_empty() {
                println!("No attendance records");
            }
            for r in records {
                println!(
                    "{}  {:<10} {:<18} {:>3}/{:<3} {} {}",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.period_label,
                    r.status.as_str(),
                    r.detected_count,
                    r.threshold,
                    r.file_name,
                    r.note
                );
            }
        }
        ResponsePayload::Pong => println!("rollcalld is running"),
        other => println!("{:?}", other),
    }

    Ok(())
}

async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut events = client.subscribe().await?;

    loop {
        let event = events.next().await?;

        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }

        let at = format_clock_time(&event.timestamp);
        match event.payload {
            EventPayload::StateChanged(snapshot) => print_snapshot(&snapshot),
            EventPayload::StatusChanged { period, from, to } => {
                println!("[{}] {}: {} -> {}", at, period.label(), from, to);
            }
            EventPayload::AttemptFinished(report) => {
                print!("[{}] ", at);
                print_attempt(&report);
            }
            EventPayload::StorageFault {
                period,
                kind,
                message,
            } => {
                println!(
                    "[{}] {}: {} ({}), retry manually once fixed",
                    at,
                    period.label(),
                    kind,
                    message
                );
            }
            EventPayload::PeriodTimedOut { period } => {
                println!("[{}] {}: window closed without success", at, period.label());
            }
            EventPayload::SettingsChanged(settings) => {
                println!(
                    "[{}] settings: mode {}, {} students",
                    at, settings.mode, settings.student_count
                );
            }
            EventPayload::Shutdown => {
                println!("[{}] rollcalld is shutting down", at);
                return Ok(());
            }
        }
    }
}

fn print_snapshot(snapshot: &SchedulerSnapshot) {
    println!(
        "Mode {}, {} students, required {} (minimum {})",
        snapshot.settings.mode,
        snapshot.settings.student_count,
        snapshot.threshold,
        snapshot.effective_minimum
    );
    println!();
    for view in &snapshot.periods {
        let mut line = format!("  {:<10} {}  {}", view.label, view.window, describe(view));
        if let Some(left) = open_for(view, snapshot) {
            line.push_str(&format!(", closes in {}", left));
        }
        println!("{}", line);
    }
}

/// Time left for automatic attempts, for periods still collecting
fn open_for(view: &PeriodView, snapshot: &SchedulerSnapshot) -> Option<String> {
    if view.status.is_terminal() {
        return None;
    }
    view.window
        .remaining_duration(&snapshot.at)
        .map(format_countdown)
}

fn describe(view: &PeriodView) -> String {
    match &view.display {
        DisplayState::Idle => "waiting".into(),
        DisplayState::Detecting => "detecting...".into(),
        DisplayState::Retrying {
            last_detected,
            next_attempt_at,
        } => {
            let detected = last_detected
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into());
            match next_attempt_at {
                Some(next) => format!("retrying (last {}, next {})", detected, format_clock_time(next)),
                None => format!("retrying (last {})", detected),
            }
        }
        DisplayState::NeedsAttention { reason } => format!("NEEDS ATTENTION: {}", reason),
        DisplayState::Completed { file: Some(file) } => format!("done ({})", file.display()),
        DisplayState::Completed { file: None } => "done".into(),
        DisplayState::Skipped => "skipped".into(),
        DisplayState::TimedOut => "timed out".into(),
    }
}

fn print_attempt(report: &AttemptSummary) {
    let detected = report
        .detected
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "{}: {} (detected {}, need {}) {}",
        report.period.label(),
        if report.result.is_success() { "success" } else { "not yet" },
        detected,
        report.effective_minimum,
        report.note
    );
}
