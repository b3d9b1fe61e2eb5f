//! Daily CSV attendance log

use rollcall_api::AttendanceRecord;
use rollcall_util::format_date_stamp;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::{day_dir, AttendanceLog, StoreResult};

pub const CSV_HEADER: &str = "date,time,item,status,detected,required,file,note";

const UTF8_BOM: &str = "\u{feff}";

/// Appends one row per record to `<root>/<YYMMDD>/<YYMMDD>_log.csv`.
///
/// New files start with a UTF-8 BOM and a header row so spreadsheet tools
/// pick the right encoding.
pub struct CsvAttendanceLog {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvAttendanceLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log file for the day containing `record`
    pub fn path_for(&self, record: &AttendanceRecord) -> PathBuf {
        log_path(&self.root, record)
    }
}

fn log_path(root: &Path, record: &AttendanceRecord) -> PathBuf {
    let stamp = format_date_stamp(&record.timestamp);
    day_dir(root, &record.timestamp).join(format!("{}_log.csv", stamp))
}

impl AttendanceLog for CsvAttendanceLog {
    fn append(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap();

        let path = log_path(&self.root, record);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}{}", UTF8_BOM, CSV_HEADER)?;
        }

        writeln!(file, "{}", format_row(record))?;
        debug!(path = %path.display(), status = %record.status, "Attendance row written");
        Ok(())
    }
}

/// Render a record as one CSV line (without the trailing newline)
pub fn format_row(record: &AttendanceRecord) -> String {
    let fields = [
        record.timestamp.format("%Y-%m-%d").to_string(),
        record.timestamp.format("%H:%M:%S").to_string(),
        record.period_label.clone(),
        record.status.as_str().to_string(),
        record.detected_count.to_string(),
        record.threshold.to_string(),
        record.file_name.clone(),
        record.note.clone(),
    ];

    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
