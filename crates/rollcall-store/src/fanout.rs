//! Fan-out over several attendance logs

use rollcall_api::AttendanceRecord;
use std::sync::Arc;
use tracing::warn;

use crate::{AttendanceLog, StoreResult};

/// Appends each record to every inner log.
///
/// Every log is attempted even when an earlier one fails; the first failure
/// is returned. History queries go to the first log.
pub struct FanoutLog {
    logs: Vec<Arc<dyn AttendanceLog>>,
}

impl FanoutLog {
    pub fn new(logs: Vec<Arc<dyn AttendanceLog>>) -> Self {
        Self { logs }
    }
}

impl AttendanceLog for FanoutLog {
    fn append(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let mut first_error = None;

        for log in &self.logs {
            if let Err(e) = log.append(record) {
                warn!(error = %e, "Attendance log append failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<AttendanceRecord>> {
        match self.logs.first() {
            Some(log) => log.recent(limit),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLog;
    use chrono::Local;
    use rollcall_api::AttendanceStatus;
    use rollcall_util::PeriodId;

    fn record() -> AttendanceRecord {
        AttendanceRecord {
            timestamp: Local::now(),
            period: PeriodId::CHECKOUT,
            period_label: "Checkout".into(),
            status: AttendanceStatus::Skipped,
            detected_count: 0,
            threshold: 2,
            file_name: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn failure_in_one_log_does_not_starve_others() {
        let broken = Arc::new(MemoryLog::new());
        broken.set_fail(true);
        let healthy = Arc::new(MemoryLog::new());

        let logs: Vec<Arc<dyn AttendanceLog>> = vec![broken.clone(), healthy.clone()];
        let fanout = FanoutLog::new(logs);
        assert!(fanout.append(&record()).is_err());
        assert_eq!(healthy.records().len(), 1);
        assert!(broken.records().is_empty());
    }
}
