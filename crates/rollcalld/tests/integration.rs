//! Integration tests for rollcalld
//!
//! These drive the orchestrator through full days of periods with scripted
//! collaborators, the way the daemon wires it.

use chrono::{DateTime, Local, TimeZone};
use rollcall_api::{
    AttemptResult, AttemptTrigger, AttendanceStatus, DisplayState, PeriodStatus,
    StorageErrorKind, VerificationMode,
};
use rollcall_config::{parse_config, Config};
use rollcall_core::{
    CaptureOrchestrator, Collaborators, CoreEvent, PeriodRegistry, TimeoutMonitor,
};
use rollcall_host_api::{MockCapture, MockDetector};
use rollcall_store::{
    AttendanceLog, CsvAttendanceLog, FanoutLog, FileEvidenceStore, MemoryEvidenceStore,
    MemoryLog, SqliteAttendanceLog, CSV_HEADER,
};
use rollcall_util::PeriodId;
use std::sync::Arc;

const CONFIG: &str = r#"
config_version = 1

[settings]
mode = "flexible"
student_count = 21

[capture]
command = ["grim", "-o", "{monitor}", "{output}"]

[detector]
command = ["count-faces", "{image}"]
"#;

fn config(mode: VerificationMode) -> Config {
    let mut config = parse_config(CONFIG).unwrap();
    config.verification.mode = mode;
    config
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 11, 4, h, m, s).unwrap()
}

fn p(id: u8) -> PeriodId {
    PeriodId::new(id).unwrap()
}

struct Day {
    orchestrator: CaptureOrchestrator,
    capture: Arc<MockCapture>,
    detector: Arc<MockDetector>,
    evidence: Arc<MemoryEvidenceStore>,
    log: Arc<MemoryLog>,
}

impl Day {
    fn new(mode: VerificationMode) -> Self {
        let config = config(mode);
        let capture = Arc::new(MockCapture::new());
        let detector = Arc::new(MockDetector::new(0));
        let evidence = Arc::new(MemoryEvidenceStore::new());
        let log = Arc::new(MemoryLog::new());

        let orchestrator = CaptureOrchestrator::new(
            PeriodRegistry::new(&config.periods).unwrap(),
            config.verification,
            Collaborators {
                capture: capture.clone(),
                detector: detector.clone(),
                evidence: evidence.clone(),
                log: log.clone(),
            },
        )
        .unwrap();

        Self {
            orchestrator,
            capture,
            detector,
            evidence,
            log,
        }
    }

    fn status(&self, id: u8) -> PeriodStatus {
        self.orchestrator.registry().get(p(id)).unwrap().status
    }
}

#[test]
fn default_timetable_is_loaded() {
    let config = config(VerificationMode::Flexible);
    assert_eq!(config.periods.len(), 9);
    assert_eq!(config.verification.threshold(), 22);

    let order: Vec<u8> = config.periods.iter().map(|s| s.id.as_u8()).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5, 6, 7, 8, 0]);
}

#[tokio::test]
async fn flexible_period_completes_on_second_attempt() {
    let mut day = Day::new(VerificationMode::Flexible);

    // 21 students plus the instructor: 22 required, 19 accepted
    day.detector.push_count(17);
    day.orchestrator.tick(at(9, 30, 5)).await;

    assert_eq!(day.status(1), PeriodStatus::Waiting);
    let view = day.orchestrator.snapshot(at(9, 30, 6)).periods.remove(0);
    assert_eq!(
        view.display,
        DisplayState::Retrying {
            last_detected: Some(17),
            next_attempt_at: Some(at(9, 30, 15)),
        }
    );

    // Throttled
    day.orchestrator.tick(at(9, 30, 10)).await;
    assert_eq!(day.capture.grab_count(), 1);

    day.detector.push_count(20);
    day.orchestrator.tick(at(9, 30, 16)).await;

    assert_eq!(day.status(1), PeriodStatus::Completed);
    let saved = day.evidence.saved();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].within_window);
    assert!(saved[0].path.ends_with("251104/251104_period1.png"));

    let statuses: Vec<AttendanceStatus> = day.log.records().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![AttendanceStatus::ConditionNotMet, AttendanceStatus::Success]
    );

    // Terminal: later passes inside the window do nothing
    day.orchestrator.tick(at(9, 40, 0)).await;
    assert_eq!(day.capture.grab_count(), 2);
}

#[tokio::test]
async fn timeout_then_manual_retry_writes_corrected_copy() {
    let mut day = Day::new(VerificationMode::Flexible);
    day.detector.set_default(10);

    day.orchestrator.tick(at(9, 44, 55)).await;
    assert_eq!(day.status(1), PeriodStatus::Waiting);
    day.orchestrator.take_events();

    day.orchestrator.tick(at(9, 45, 1)).await;
    assert_eq!(day.status(1), PeriodStatus::TimedOut);
    assert!(day
        .orchestrator
        .take_events()
        .iter()
        .any(|e| matches!(e, CoreEvent::PeriodTimedOut { period } if *period == p(1))));

    day.detector.set_default(20);
    let report = day.orchestrator.retry(p(1), at(9, 50, 0)).await.unwrap();

    assert_eq!(report.trigger, AttemptTrigger::Manual);
    assert_eq!(report.next_attempt_at, None);
    match &report.result {
        AttemptResult::Completed { file } => {
            assert!(file.to_string_lossy().ends_with("_period1_corrected.png"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(day.status(1), PeriodStatus::Completed);
    assert!(!day.evidence.saved()[0].within_window);

    // Completed is terminal; skip is refused
    assert!(day.orchestrator.skip(p(1), at(9, 51, 0)).is_err());
}

#[tokio::test]
async fn exact_mode_requires_exact_headcount() {
    let mut day = Day::new(VerificationMode::Exact);

    day.detector.push_count(23);
    day.orchestrator.tick(at(10, 30, 0)).await;
    assert_eq!(day.status(2), PeriodStatus::Waiting);

    day.detector.push_count(21);
    day.orchestrator.tick(at(10, 30, 10)).await;
    assert_eq!(day.status(2), PeriodStatus::Waiting);

    day.detector.push_count(22);
    day.orchestrator.tick(at(10, 30, 20)).await;
    assert_eq!(day.status(2), PeriodStatus::Completed);

    // Period 1 timed out at the first pass; nothing was attempted for it
    assert_eq!(day.status(1), PeriodStatus::TimedOut);
    assert_eq!(day.capture.grab_count(), 3);
}

#[tokio::test]
async fn skip_is_idempotent_and_stops_attempts() {
    let mut day = Day::new(VerificationMode::Flexible);

    let first = day.orchestrator.skip(p(2), at(10, 0, 0)).unwrap();
    assert!(!first.already);
    let second = day.orchestrator.skip(p(2), at(10, 1, 0)).unwrap();
    assert!(second.already);

    let skipped: Vec<_> = day
        .log
        .records()
        .into_iter()
        .filter(|r| r.status == AttendanceStatus::Skipped)
        .collect();
    assert_eq!(skipped.len(), 1);

    day.orchestrator.tick(at(10, 30, 0)).await;
    day.orchestrator.tick(at(10, 44, 59)).await;
    assert_eq!(day.capture.grab_count(), 0);

    // A skipped period never times out
    day.orchestrator.tick(at(10, 46, 0)).await;
    assert_eq!(day.status(2), PeriodStatus::Skipped);
}

#[tokio::test]
async fn storage_failure_waits_for_manual_retry() {
    let mut day = Day::new(VerificationMode::Flexible);
    day.detector.set_default(22);
    day.evidence.set_failure(Some(StorageErrorKind::OutOfSpace));

    day.orchestrator.tick(at(9, 30, 0)).await;

    assert_eq!(day.status(1), PeriodStatus::Waiting);
    let events = day.orchestrator.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::StorageFault { kind: StorageErrorKind::OutOfSpace, .. }
    )));
    let view = day.orchestrator.snapshot(at(9, 30, 1)).periods.remove(0);
    assert!(matches!(view.display, DisplayState::NeedsAttention { .. }));

    // Automatic attempts are suspended
    day.orchestrator.tick(at(9, 30, 20)).await;
    assert_eq!(day.capture.grab_count(), 1);

    day.evidence.set_failure(None);
    let report = day.orchestrator.retry(p(1), at(9, 31, 0)).await.unwrap();
    assert!(report.result.is_success());
    assert!(day.evidence.saved()[0].within_window);

    let view = day.orchestrator.snapshot(at(9, 31, 1)).periods.remove(0);
    assert!(view.attention.is_none());
}

#[tokio::test]
async fn settings_change_applies_to_next_attempt() {
    let mut day = Day::new(VerificationMode::Flexible);

    day.detector.push_count(19);
    let updated = day
        .orchestrator
        .update_settings(Some(VerificationMode::Exact), None)
        .unwrap();
    assert_eq!(updated.mode, VerificationMode::Exact);

    day.orchestrator.tick(at(9, 30, 0)).await;
    assert_eq!(day.status(1), PeriodStatus::Waiting);

    assert!(day.orchestrator.update_settings(None, Some(101)).is_err());
    assert_eq!(day.orchestrator.settings().student_count, 21);
}

#[test]
fn detecting_period_survives_window_end() {
    let config = config(VerificationMode::Flexible);
    let mut registry = PeriodRegistry::new(&config.periods).unwrap();
    registry.get_mut(p(1)).unwrap().status = PeriodStatus::Detecting;

    let expired = TimeoutMonitor::expire_elapsed(&mut registry, &at(9, 46, 0));

    assert!(!expired.contains(&p(1)));
    assert_eq!(registry.get(p(1)).unwrap().status, PeriodStatus::Detecting);
}

#[tokio::test]
async fn file_backed_day_writes_png_csv_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(VerificationMode::Flexible);

    let history = Arc::new(SqliteAttendanceLog::in_memory().unwrap());
    let csv = Arc::new(CsvAttendanceLog::new(dir.path()));
    let logs: Vec<Arc<dyn AttendanceLog>> = vec![history.clone(), csv];

    let detector = Arc::new(MockDetector::new(22));
    detector.push_count(5);

    let mut orchestrator = CaptureOrchestrator::new(
        PeriodRegistry::new(&config.periods).unwrap(),
        config.verification,
        Collaborators {
            capture: Arc::new(MockCapture::new()),
            detector,
            evidence: Arc::new(FileEvidenceStore::new(dir.path())),
            log: Arc::new(FanoutLog::new(logs)),
        },
    )
    .unwrap();

    orchestrator.tick(at(9, 30, 0)).await;
    orchestrator.tick(at(9, 30, 10)).await;

    let png = dir.path().join("251104").join("251104_period1.png");
    assert!(png.exists());

    let csv_path = dir.path().join("251104").join("251104_log.csv");
    let contents = std::fs::read_to_string(csv_path).unwrap();
    assert!(contents.starts_with('\u{feff}'));
    assert!(contents.contains(CSV_HEADER));
    assert!(contents.contains("success"));
    assert!(contents.contains("251104_period1.png"));

    let recent = history.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].status, AttendanceStatus::Success);
    assert_eq!(recent[1].status, AttendanceStatus::ConditionNotMet);
}
