//! Screenshot command capture

use async_trait::async_trait;
use rollcall_host_api::{Capture, CaptureError, CapturedFrame, HostResult};
use std::time::Duration;
use tracing::debug;

use crate::{run_command, substitute, CommandError, DEFAULT_COMMAND_TIMEOUT};

/// Captures a monitor by running a screenshot tool.
///
/// The argv may use `{monitor}` (1-based monitor id) and `{output}` (path of
/// the PNG the tool must write).
pub struct CommandCapture {
    argv: Vec<String>,
    monitor_id: u32,
    timeout: Duration,
}

impl CommandCapture {
    pub fn new(argv: Vec<String>, monitor_id: u32) -> Self {
        Self {
            argv,
            monitor_id,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Capture for CommandCapture {
    async fn grab(&self) -> HostResult<CapturedFrame> {
        if self.monitor_id == 0 {
            return Err(CaptureError::InvalidMonitor(self.monitor_id).into());
        }

        let output = tempfile::Builder::new()
            .prefix("rollcall-capture-")
            .suffix(".png")
            .tempfile()?;
        let output_path = output.path().to_string_lossy().into_owned();
        let monitor = self.monitor_id.to_string();

        let argv = substitute(
            &self.argv,
            &[("monitor", monitor.as_str()), ("output", output_path.as_str())],
        );

        run_command(&argv, self.timeout).await.map_err(|e| match e {
            CommandError::NotFound(program) => {
                CaptureError::DeviceUnavailable(format!("{} not found", program))
            }
            other => CaptureError::CommandFailed(other.to_string()),
        })?;

        let captured_at = rollcall_util::now();
        let image = image::open(output.path()).map_err(|e| CaptureError::Decode(e.to_string()))?;

        debug!(
            monitor = self.monitor_id,
            width = image.width(),
            height = image.height(),
            "Screen captured"
        );

        Ok(CapturedFrame {
            image,
            monitor_id: self.monitor_id,
            captured_at,
        })
    }
}
