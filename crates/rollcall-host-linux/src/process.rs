//! External command execution

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::borrow::Cow;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on how long a collaborator command may run
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Captured output of a successful command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Replace `{name}` placeholders in every argument
pub fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

/// Render argv as a shell-quoted string for logs
pub fn render_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command in its own process group, killing the group on timeout
pub async fn run_command(argv: &[String], timeout: Duration) -> Result<CommandOutput, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;

    debug!(command = %render_command(argv), "Running collaborator command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CommandError::NotFound(program.clone()),
        _ => CommandError::Spawn(e),
    })?;
    let pid = child.id();

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            if let Some(pid) = pid {
                let pgid = Pid::from_raw(pid as i32);
                if let Err(e) = signal::killpg(pgid, Signal::SIGKILL) {
                    warn!(pid, error = %e, "Failed to kill timed-out command group");
                }
            }
            return Err(CommandError::TimedOut(timeout));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(CommandError::Failed {
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
