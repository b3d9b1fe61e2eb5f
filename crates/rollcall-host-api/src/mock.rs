//! Mock collaborators for testing

use async_trait::async_trait;
use image::DynamicImage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{Capture, CaptureError, CapturedFrame, Detector, DetectionError, HostResult};

/// Capture backend that returns a blank frame
pub struct MockCapture {
    monitor_id: u32,
    grabs: AtomicU64,

    /// Configure grab to fail
    pub fail_capture: Arc<Mutex<bool>>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            monitor_id: 1,
            grabs: AtomicU64::new(0),
            fail_capture: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail_capture.lock().unwrap() = fail;
    }

    /// Number of grab calls so far, including failed ones
    pub fn grab_count(&self) -> u64 {
        self.grabs.load(Ordering::SeqCst)
    }
}

impl Default for MockCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capture for MockCapture {
    async fn grab(&self) -> HostResult<CapturedFrame> {
        self.grabs.fetch_add(1, Ordering::SeqCst);

        if *self.fail_capture.lock().unwrap() {
            return Err(CaptureError::DeviceUnavailable("Mock capture failure".into()).into());
        }

        Ok(CapturedFrame {
            image: DynamicImage::new_rgb8(4, 4),
            monitor_id: self.monitor_id,
            captured_at: rollcall_util::now(),
        })
    }
}

/// Detector that replays scripted counts, then falls back to a default
pub struct MockDetector {
    script: Mutex<VecDeque<HostResult<u32>>>,
    calls: AtomicU64,
    last_min_score: Mutex<Option<f32>>,

    /// Count returned once the script is exhausted
    pub default_count: Arc<Mutex<u32>>,

    /// Simulated inference time
    pub delay: Arc<Mutex<Option<Duration>>>,
}

impl MockDetector {
    pub fn new(default_count: u32) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
            last_min_score: Mutex::new(None),
            default_count: Arc::new(Mutex::new(default_count)),
            delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a count for the next call
    pub fn push_count(&self, count: u32) {
        self.script.lock().unwrap().push_back(Ok(count));
    }

    /// Queue a failure for the next call
    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(DetectionError::ModelNotReady(message.into()).into()));
    }

    pub fn set_default(&self, count: u32) {
        *self.default_count.lock().unwrap() = count;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_min_score(&self) -> Option<f32> {
        *self.last_min_score.lock().unwrap()
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn count(&self, _image: &DynamicImage, min_score: f32) -> HostResult<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_min_score.lock().unwrap() = Some(min_score);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(*self.default_count.lock().unwrap()),
        }
    }
}
