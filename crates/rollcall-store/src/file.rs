//! Filesystem evidence store

use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use rollcall_util::{format_date_stamp, PeriodId};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{EvidenceStore, StoreResult};

/// Suffix for evidence saved after the period's window closed
pub const CORRECTED_SUFFIX: &str = "_corrected";

/// Per-day folder: `<root>/<YYMMDD>`
pub fn day_dir(root: &Path, at: &DateTime<Local>) -> PathBuf {
    root.join(format_date_stamp(at))
}

/// Evidence file path: `<root>/<YYMMDD>/<YYMMDD>_<slug>[_corrected].png`
pub fn evidence_path(
    root: &Path,
    period: PeriodId,
    within_window: bool,
    captured_at: &DateTime<Local>,
) -> PathBuf {
    let stamp = format_date_stamp(captured_at);
    let suffix = if within_window { "" } else { CORRECTED_SUFFIX };
    day_dir(root, captured_at).join(format!("{}_{}{}.png", stamp, period.slug(), suffix))
}

/// Writes PNG evidence under a root folder, one subfolder per day
#[derive(Debug, Clone)]
pub struct FileEvidenceStore {
    root: PathBuf,
}

impl FileEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EvidenceStore for FileEvidenceStore {
    fn save(
        &self,
        image: &DynamicImage,
        period: PeriodId,
        within_window: bool,
        captured_at: DateTime<Local>,
    ) -> StoreResult<PathBuf> {
        let dir = day_dir(&self.root, &captured_at);
        std::fs::create_dir_all(&dir)?;

        let path = evidence_path(&self.root, period, within_window, &captured_at);
        if path.exists() {
            debug!(path = %path.display(), "Overwriting existing evidence");
        }

        image.save_with_format(&path, ImageFormat::Png)?;

        info!(
            period = %period,
            within_window,
            path = %path.display(),
            "Evidence saved"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 4, h, m, s).unwrap()
    }

    #[test]
    fn paths_follow_day_layout() {
        let root = Path::new("/data");
        let period = PeriodId::new(3).unwrap();

        assert_eq!(
            evidence_path(root, period, true, &at(11, 31, 0)),
            PathBuf::from("/data/251104/251104_period3.png")
        );
        assert_eq!(
            evidence_path(root, PeriodId::CHECKOUT, false, &at(18, 40, 0)),
            PathBuf::from("/data/251104/251104_checkout_corrected.png")
        );
    }

    #[test]
    fn save_writes_png() {
        let dir = tempdir().unwrap();
        let store = FileEvidenceStore::new(dir.path());
        let image = DynamicImage::new_rgb8(8, 8);

        let path = store
            .save(&image, PeriodId::new(1).unwrap(), true, at(9, 30, 16))
            .unwrap();

        assert!(path.ends_with("251104/251104_period1.png"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 8);
    }

    #[test]
    fn corrected_save_keeps_original() {
        let dir = tempdir().unwrap();
        let store = FileEvidenceStore::new(dir.path());
        let image = DynamicImage::new_rgb8(4, 4);
        let period = PeriodId::new(1).unwrap();

        let original = store.save(&image, period, true, at(9, 31, 0)).unwrap();
        let corrected = store.save(&image, period, false, at(9, 50, 0)).unwrap();

        assert_ne!(original, corrected);
        assert!(original.exists());
        assert!(corrected.exists());
    }

    #[test]
    fn unwritable_root_reports_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = FileEvidenceStore::new(&blocker);
        let result = store.save(
            &DynamicImage::new_rgb8(2, 2),
            PeriodId::CHECKOUT,
            true,
            at(18, 30, 0),
        );
        assert!(result.is_err());
    }
}
