//! Integration tests for `stitchtoon-gui`
//!
//! Tests settings persistence through the JSON file backend, legacy settings
//! files, and the full session lifecycle with a stand-in stitcher.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stitchtoon_gui::{
    config::{JsonFileBackend, OutputFormat, Profile, SettingsStore, Theme},
    controller::SessionController,
    error::{Result, StitchtoonError, StringError, get_user_friendly_error},
    worker::{MessageKind, ProcessParams, StitchJob, Stitcher, WorkerContext},
};
use tempfile::TempDir;

const POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct FakeStitcher {
    fail_with: Option<&'static str>,
    calls: Mutex<Vec<ProcessParams>>,
}

impl Stitcher for FakeStitcher {
    fn process(&self, params: &ProcessParams, ctx: &WorkerContext) -> Result<()> {
        self.calls.lock().push(params.clone());
        ctx.progress().update(10, Some("detecting"));
        ctx.progress().update(70, Some("writing"));
        match self.fail_with {
            Some(msg) => Err(StitchtoonError::ProcessFailed(StringError::new(msg))),
            None => Ok(()),
        }
    }
}

fn open_settings(dir: &TempDir) -> SettingsStore {
    let backend = JsonFileBackend::open(dir.path().join("settings.json")).unwrap();
    SettingsStore::open(backend).unwrap()
}

fn read_file(dir: &TempDir) -> Value {
    let json = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

/// First run writes the default settings file
#[test]
fn test_first_run_creates_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = open_settings(&dir);

    assert!(settings.used_before());
    let file = read_file(&dir);
    assert_eq!(file["used-before"], true);
    assert_eq!(file["current-profile"], "To Edit");
    assert_eq!(file["theme"], "dark_teal");

    let names: Vec<&String> = file["profiles"].as_object().unwrap().keys().collect();
    assert_eq!(names, ["To Edit", "Ready", "Manga To Edit", "Manga Ready"]);
}

/// Profile changes made through a session survive a restart
#[test]
fn test_profile_changes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut session = SessionController::new(
            open_settings(&dir),
            Arc::new(FakeStitcher::default()),
        );
        let mut form = session.current_profile().renamed("Webtoon WebP");
        form.output_format = OutputFormat::Webp;
        form.lossy_quality = 75;
        session.save_form_as_profile(form).unwrap();
        session.delete_profile("Manga To Edit").unwrap();
        session.change_theme("Light Teal").unwrap();
    }

    let settings = open_settings(&dir);
    let store = settings.profile_store();
    assert_eq!(
        store.list(),
        ["To Edit", "Ready", "Manga Ready", "Webtoon WebP"]
    );
    assert_eq!(store.current_name(), "Webtoon WebP");
    assert_eq!(store.current().output_format, OutputFormat::Webp);
    assert_eq!(settings.theme(), Theme::LightTeal);
}

/// The last profile can never be deleted
#[test]
fn test_last_profile_cannot_be_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let mut session =
        SessionController::new(open_settings(&dir), Arc::new(FakeStitcher::default()));

    for name in ["To Edit", "Ready", "Manga To Edit"] {
        session.delete_profile(name).unwrap();
    }
    let err = session.delete_profile("Manga Ready").unwrap_err();
    assert!(matches!(err, StitchtoonError::LastProfile(_)));
    assert!(get_user_friendly_error(&err).contains("only remaining profile"));

    let file = read_file(&dir);
    assert_eq!(file["profiles"].as_object().unwrap().len(), 1);
    assert_eq!(file["current-profile"], "Manga Ready");
}

/// A corrupt settings file is replaced by defaults
#[test]
fn test_corrupt_settings_file_recovers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{\"profiles\": [oops").unwrap();

    let settings = open_settings(&dir);
    assert_eq!(settings.profile_store().len(), 4);
    assert_eq!(read_file(&dir)["used-before"], true);
}

/// Settings written by older releases still load
#[test]
fn test_legacy_settings_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = json!({
        "used-before": true,
        "theme": "dark_pink",
        "current-profile": {
            "name": "Ready",
            "outputFormat": "JPEG",
            "splitValue": 4608
        },
        "profiles": {
            "To Edit": {"name": "To Edit", "outputFormat": "PSD", "splitValue": 50000},
            "Ready": {
                "name": "Ready",
                "outputFormat": "jpg",
                "widthEnforcement": "fixed",
                "widthEnforcementFixedValue": 760,
                "splitValue": 4608,
                "splitMethod": "split height"
            }
        }
    });
    std::fs::write(
        dir.path().join("settings.json"),
        serde_json::to_string(&legacy).unwrap(),
    )
    .unwrap();

    let settings = open_settings(&dir);
    let store = settings.profile_store();
    assert_eq!(store.list(), ["To Edit", "Ready"]);
    assert_eq!(store.current_name(), "Ready");
    assert_eq!(store.current().output_format, OutputFormat::Jpeg);
    assert_eq!(settings.theme(), Theme::DarkPink);
    assert_eq!(read_file(&dir)["current-profile"], "Ready");
}

/// Reset is honored on settings that were used before
#[test]
fn test_reset_overwrites_customizations() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut session =
            SessionController::new(open_settings(&dir), Arc::new(FakeStitcher::default()));
        session.save_form_as_profile(Profile::new("Mine")).unwrap();
        session.change_theme("light_amber").unwrap();
    }

    open_settings(&dir).reset().unwrap();

    let settings = open_settings(&dir);
    assert!(!settings.profile_store().contains("Mine"));
    assert_eq!(settings.theme(), Theme::DarkTeal);
}

/// A full stitch run reports progress and success
#[test]
fn test_session_run_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let stitcher = Arc::new(FakeStitcher::default());
    let shared: Arc<dyn Stitcher> = stitcher.clone();
    let mut session = SessionController::new(open_settings(&dir), shared);

    let profile = session.select_profile(Some("Ready"));
    let input = Path::new("/comics/chapter 12");
    let output = session.suggest_output(input);
    assert_eq!(output, Path::new("/comics/chapter 12_Ready"));

    session
        .start(StitchJob::new(input, output.clone(), profile))
        .unwrap();
    session.run_until_idle(POLL);

    assert!(session.start_enabled());
    assert_eq!(session.status().kind, MessageKind::Success);
    assert_eq!(session.progress().value, session.progress().total);

    let calls = stitcher.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].output, output);
    assert_eq!(calls[0].output_format, OutputFormat::Jpeg);
}

/// A stitcher failure ends up in the status bar
#[test]
fn test_session_run_failure() {
    let dir = tempfile::tempdir().unwrap();
    let stitcher = Arc::new(FakeStitcher {
        fail_with: Some("input directory contains no images"),
        ..FakeStitcher::default()
    });
    let mut session = SessionController::new(open_settings(&dir), stitcher);

    let profile = session.select_profile(None);
    session
        .start(StitchJob::new("/in", "/in_To_Edit", profile))
        .unwrap();
    session.run_until_idle(POLL);

    assert_eq!(session.status().kind, MessageKind::Error);
    assert_eq!(
        session.status().message,
        "input directory contains no images"
    );
    assert!(session.start_enabled());
}

/// The form snapshot written at shutdown is restored
#[test]
fn test_last_form_restored_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let session =
        SessionController::new(open_settings(&dir), Arc::new(FakeStitcher::default()));
    let mut form = session.current_profile().clone();
    form.sensitivity = 55;
    session.shutdown(Some(&form)).unwrap();

    let session =
        SessionController::new(open_settings(&dir), Arc::new(FakeStitcher::default()));
    assert_eq!(session.last_form().map(|f| f.sensitivity), Some(55));
}

/// Test that user-friendly error messages are generated correctly
#[test]
fn test_user_friendly_error_messages() {
    let error = StitchtoonError::ProfileNotFound("Ready".to_string());
    assert!(get_user_friendly_error(&error).contains("Ready"));

    let error = StitchtoonError::WorkerBusy;
    assert!(get_user_friendly_error(&error).contains("already running"));
}
