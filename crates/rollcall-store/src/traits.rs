//! Store trait definitions

use chrono::{DateTime, Local};
use image::DynamicImage;
use rollcall_api::AttendanceRecord;
use rollcall_util::PeriodId;
use std::path::PathBuf;

use crate::StoreResult;

/// Persists evidence images
pub trait EvidenceStore: Send + Sync {
    /// Save the captured frame for a period and return where it was written.
    ///
    /// `within_window` selects the canonical file; saves made after the
    /// window closed go to a separate corrected copy.
    fn save(
        &self,
        image: &DynamicImage,
        period: PeriodId,
        within_window: bool,
        captured_at: DateTime<Local>,
    ) -> StoreResult<PathBuf>;
}

/// Append-only attendance log
pub trait AttendanceLog: Send + Sync {
    fn append(&self, record: &AttendanceRecord) -> StoreResult<()>;

    /// Most recent records, newest first. Write-only logs return nothing.
    fn recent(&self, _limit: usize) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(Vec::new())
    }
}
