//! In-memory store doubles for tests

use chrono::{DateTime, Local};
use image::DynamicImage;
use rollcall_api::{AttendanceRecord, StorageErrorKind};
use rollcall_util::PeriodId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::{evidence_path, AttendanceLog, EvidenceStore, StoreError, StoreResult};

/// One save recorded by [`MemoryEvidenceStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct SavedEvidence {
    pub period: PeriodId,
    pub within_window: bool,
    pub captured_at: DateTime<Local>,
    pub path: PathBuf,
}

/// Evidence store that remembers saves instead of writing files
#[derive(Default)]
pub struct MemoryEvidenceStore {
    saved: Mutex<Vec<SavedEvidence>>,
    fail_with: Arc<Mutex<Option<StorageErrorKind>>>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail with the given kind, or succeed again with None
    pub fn set_failure(&self, kind: Option<StorageErrorKind>) {
        *self.fail_with.lock().unwrap() = kind;
    }

    pub fn saved(&self) -> Vec<SavedEvidence> {
        self.saved.lock().unwrap().clone()
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn save(
        &self,
        _image: &DynamicImage,
        period: PeriodId,
        within_window: bool,
        captured_at: DateTime<Local>,
    ) -> StoreResult<PathBuf> {
        if let Some(kind) = *self.fail_with.lock().unwrap() {
            return Err(StoreError::Storage {
                kind,
                message: "simulated storage failure".into(),
            });
        }

        let path = evidence_path(Path::new("/memory"), period, within_window, &captured_at);
        self.saved.lock().unwrap().push(SavedEvidence {
            period,
            within_window,
            captured_at,
            path: path.clone(),
        });
        Ok(path)
    }
}

/// Attendance log kept in memory
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<AttendanceRecord>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AttendanceLog for MemoryLog {
    fn append(&self, record: &AttendanceRecord) -> StoreResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::Database("simulated log failure".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<AttendanceRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}
