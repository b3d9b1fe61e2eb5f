//! Face-count command detector

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use rollcall_host_api::{DetectionError, Detector, HostResult};
use std::time::Duration;
use tracing::debug;

use crate::{run_command, substitute, CommandError, DEFAULT_COMMAND_TIMEOUT};

/// Counts faces by running an external detector.
///
/// The frame is written to a temporary PNG. The argv may use `{image}` and
/// `{min_score}`; the first line of stdout must be the face count.
pub struct CommandDetector {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandDetector {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse the first stdout line as a face count
pub fn parse_count(stdout: &str) -> Result<u32, DetectionError> {
    let line = stdout.lines().next().unwrap_or("").trim();
    line.parse::<u32>()
        .map_err(|_| DetectionError::Parse(format!("expected a face count, got '{}'", line)))
}

#[async_trait]
impl Detector for CommandDetector {
    async fn count(&self, image: &DynamicImage, min_score: f32) -> HostResult<u32> {
        let input = tempfile::Builder::new()
            .prefix("rollcall-frame-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;

        let image_path = input.path().to_string_lossy().into_owned();
        let score = min_score.to_string();
        let argv = substitute(
            &self.argv,
            &[("image", image_path.as_str()), ("min_score", score.as_str())],
        );

        let output = run_command(&argv, self.timeout).await.map_err(|e| match e {
            CommandError::NotFound(program) => {
                DetectionError::ModelNotReady(format!("{} not found", program))
            }
            other => DetectionError::CommandFailed(other.to_string()),
        })?;

        let count = parse_count(&output.stdout)?;
        debug!(count, min_score, "Faces counted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_host_api::HostError;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_first_line_only() {
        assert_eq!(parse_count("20\nconfidence 0.93\n").unwrap(), 20);
        assert_eq!(parse_count("  7  ").unwrap(), 7);
        assert!(parse_count("").is_err());
        assert!(parse_count("-1").is_err());
        assert!(parse_count("many").is_err());
    }

    #[tokio::test]
    async fn passes_image_and_score_to_command() {
        // Prints the count only when the image exists and the score came through.
        let detector = CommandDetector::new(argv(&[
            "sh",
            "-c",
            "test -s \"$0\" && test \"$1\" = 0.7 && echo 17",
            "{image}",
            "{min_score}",
        ]));

        let count = detector
            .count(&DynamicImage::new_rgb8(4, 4), 0.7)
            .await
            .unwrap();
        assert_eq!(count, 17);
    }

    #[tokio::test]
    async fn unparseable_output_is_parse_error() {
        let detector = CommandDetector::new(argv(&["echo", "no faces here"]));
        assert!(matches!(
            detector.count(&DynamicImage::new_rgb8(2, 2), 0.7).await,
            Err(HostError::Detection(DetectionError::Parse(_)))
        ));
    }

    #[tokio::test]
    async fn failing_detector_is_command_failure() {
        let detector = CommandDetector::new(argv(&["false"]));
        assert!(matches!(
            detector.count(&DynamicImage::new_rgb8(2, 2), 0.7).await,
            Err(HostError::Detection(DetectionError::CommandFailed(_)))
        ));
    }
}
