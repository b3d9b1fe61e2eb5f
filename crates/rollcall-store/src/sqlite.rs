//! SQLite-backed attendance log

use chrono::{DateTime, Local};
use rollcall_api::{AttendanceRecord, AttendanceStatus};
use rollcall_util::PeriodId;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::{AttendanceLog, StoreError, StoreResult};

/// Attendance history kept in the service data directory
pub struct SqliteAttendanceLog {
    conn: Mutex<Connection>,
}

impl SqliteAttendanceLog {
    /// Open or create a log at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.init_schema()?;
        Ok(log)
    }

    /// Create an in-memory log (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.init_schema()?;
        Ok(log)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS attendance_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                period INTEGER NOT NULL,
                period_label TEXT NOT NULL,
                status TEXT NOT NULL,
                detected INTEGER NOT NULL,
                required INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                note TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_timestamp ON attendance_log(timestamp);
            "#,
        )?;

        debug!("Attendance log schema initialized");
        Ok(())
    }
}

impl AttendanceLog for SqliteAttendanceLog {
    fn append(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO attendance_log \
             (timestamp, period, period_label, status, detected, required, file_name, note) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.period.as_u8(),
                record.period_label,
                record.status.as_str(),
                record.detected_count,
                record.threshold,
                record.file_name,
                record.note,
            ],
        )?;

        debug!(row_id = conn.last_insert_rowid(), "Attendance record stored");
        Ok(())
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<AttendanceRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT timestamp, period, period_label, status, detected, required, file_name, note \
             FROM attendance_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, period, period_label, status, detected, required, file_name, note) =
                row?;

            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Local))
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let period = PeriodId::new(period).ok_or_else(|| {
                StoreError::Serialization(format!("invalid period id {} in log", period))
            })?;
            let status: AttendanceStatus =
                status.parse().map_err(StoreError::Serialization)?;

            records.push(AttendanceRecord {
                timestamp,
                period,
                period_label,
                status,
                detected_count: detected,
                threshold: required,
                file_name,
                note,
            });
        }

        Ok(records)
    }
}
