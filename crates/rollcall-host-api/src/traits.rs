//! Collaborator trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Local};
use image::DynamicImage;
use thiserror::Error;

/// Screenshot failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Monitor {0} does not exist")]
    InvalidMonitor(u32),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture command failed: {0}")]
    CommandFailed(String),

    #[error("Could not decode captured image: {0}")]
    Decode(String),
}

/// Face-count failures
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detection model not ready: {0}")]
    ModelNotReady(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Detector command failed: {0}")]
    CommandFailed(String),

    #[error("Could not parse detector output: {0}")]
    Parse(String),
}

/// Host errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// One captured screen image
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: DynamicImage,
    pub monitor_id: u32,
    pub captured_at: DateTime<Local>,
}

/// Screen capture backend
#[async_trait]
pub trait Capture: Send + Sync {
    /// Grab the configured monitor
    async fn grab(&self) -> HostResult<CapturedFrame>;
}

/// Face-count backend
#[async_trait]
pub trait Detector: Send + Sync {
    /// Count faces whose confidence is at least `min_score`
    async fn count(&self, image: &DynamicImage, min_score: f32) -> HostResult<u32>;
}
