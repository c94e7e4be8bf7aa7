//! Session controller implementation
//!
//! Owns the settings, the live profile store and the worker handles for one
//! application session. All methods run on the UI thread.

use crate::config::models::{Profile, default_profiles};
use crate::config::settings::SettingsStore;
use crate::config::theme::Theme;
use crate::error::{Result, StitchtoonError};
use crate::profiles::ProfileStore;
use crate::utils::update_checker::{UpdateChecker, spawn_update_check};
use crate::worker::{
    MessageKind, PostProcessCommand, PostProcessWorker, ProcessWorker, StitchJob, Stitcher,
    WorkerEvent, WorkerHandle,
};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Capacity of the worker event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How often blocking waits re-check worker state
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Status bar content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    /// Text shown
    pub message: String,
    /// Severity, selects the color
    pub kind: MessageKind,
}

/// Progress bar content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Progress {
    /// Current value
    pub value: u32,
    /// Value meaning "done"
    pub total: u32,
    /// Text on the bar
    pub message: String,
}

/// A newer release found by the update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    /// Latest version
    pub version: Version,
    /// Releases page
    pub url: String,
}

/// UI-thread owner of one session
pub struct SessionController {
    settings: SettingsStore,
    profiles: ProfileStore,
    theme: Theme,
    last_form: Option<Profile>,
    stitcher: Arc<dyn Stitcher>,
    events_tx: SyncSender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    process: Option<WorkerHandle>,
    post_process: Option<WorkerHandle>,
    /// Job whose post-process step runs after a successful stitch
    running_job: Option<StitchJob>,
    running: bool,
    status: Status,
    progress: Progress,
    console: Vec<(String, MessageKind)>,
    update_notice: Option<UpdateNotice>,
    update_check: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Create a controller over opened settings
    ///
    /// The profile store is built from the settings and every later profile
    /// change is written back and synced.
    pub fn new(settings: SettingsStore, stitcher: Arc<dyn Stitcher>) -> Self {
        let mut profiles = settings.profile_store();
        profiles.subscribe(settings.persistence_observer());
        let theme = settings.theme();
        let last_form = settings.last_form();
        let (events_tx, events_rx) = mpsc::sync_channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Session started with {} profiles, current {:?}",
            profiles.len(),
            profiles.current_name()
        );

        Self {
            settings,
            profiles,
            theme,
            last_form,
            stitcher,
            events_tx,
            events_rx,
            process: None,
            post_process: None,
            running_job: None,
            running: false,
            status: Status::default(),
            progress: Progress::default(),
            console: Vec::new(),
            update_notice: None,
            update_check: None,
        }
    }

    /// The live profile store
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// Settings this session persists to
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The current profile
    pub fn current_profile(&self) -> &Profile {
        self.profiles.current()
    }

    /// Form values saved at the previous shutdown
    pub fn last_form(&self) -> Option<&Profile> {
        self.last_form.as_ref()
    }

    /// Selected theme
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Status bar content
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Progress bar content
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Post-process console lines
    pub fn console(&self) -> &[(String, MessageKind)] {
        &self.console
    }

    /// Whether a stitch or post-process is in flight
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the start button is enabled
    pub fn start_enabled(&self) -> bool {
        !self.running
    }

    /// Newer release found by the update check, if any
    pub fn update_notice(&self) -> Option<&UpdateNotice> {
        self.update_notice.as_ref()
    }

    /// Look up a profile without changing the current one
    ///
    /// `None`, empty and unknown names resolve to the current profile.
    pub fn profile_or_current(&self, name: Option<&str>) -> &Profile {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self.profiles.get(name).unwrap_or_else(|_| {
                debug!("Profile {:?} not found, using the current one", name);
                self.profiles.current()
            }),
            None => self.profiles.current(),
        }
    }

    /// Load a profile into the form and make it current
    ///
    /// Names resolve as in [`SessionController::profile_or_current`].
    pub fn select_profile(&mut self, name: Option<&str>) -> Profile {
        let profile = self.profile_or_current(name).clone();

        // The name was just resolved from the store
        if let Err(e) = self.profiles.set_current(&profile.name) {
            warn!("Failed to select profile {:?}: {}", profile.name, e);
        }
        profile
    }

    /// Save the form as a profile, replacing one with the same name
    pub fn save_form_as_profile(&mut self, form: Profile) -> Result<()> {
        let name = form.name.clone();
        self.profiles.upsert(form)?;
        self.profiles.set_current(&name)?;
        self.set_status(format!("Profile \"{name}\" saved"), MessageKind::Success);
        Ok(())
    }

    /// Delete a profile
    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        self.profiles.delete(name)?;
        self.set_status(format!("Profile \"{name}\" deleted"), MessageKind::Normal);
        Ok(())
    }

    /// Restore default profiles and theme
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        self.settings.reset()?;
        self.profiles.replace_all(default_profiles(), None)?;
        self.theme = self.settings.theme();
        self.last_form = None;
        self.set_status("Settings reset to defaults", MessageKind::Normal);
        Ok(())
    }

    /// Switch theme by display name or key, persisting the choice
    pub fn change_theme(&mut self, name: &str) -> Result<Theme> {
        let theme = Theme::parse(name)?;
        self.settings.set_theme(theme)?;
        self.theme = theme;
        debug!("Theme changed to {}", theme);
        Ok(theme)
    }

    /// Output directory suggested for `input` with the current profile
    ///
    /// Profile names already present in the input's final component are
    /// removed (with spaces or underscores), then `_<Profile_Name>` is
    /// appended. An empty input yields an empty path.
    pub fn suggest_output(&self, input: &Path) -> PathBuf {
        let Some(file_name) = input.file_name() else {
            return PathBuf::new();
        };

        let mut stem = strip_profile_names(&file_name.to_string_lossy(), &self.profiles);
        if !stem.ends_with('_') {
            stem.push('_');
        }
        stem.push_str(&self.profiles.current_name().replace(' ', "_"));

        input.with_file_name(stem)
    }

    /// Validate and dispatch a stitch job
    pub fn start(&mut self, job: StitchJob) -> Result<()> {
        if let Err(e) = job.validate() {
            if let StitchtoonError::InvalidJob(message) = &e {
                self.set_status(message.clone(), MessageKind::Error);
            }
            return Err(e);
        }
        if self.running {
            return Err(StitchtoonError::WorkerBusy);
        }

        self.status = Status::default();
        self.progress = Progress::default();
        self.console.clear();
        self.running = true;

        let worker = ProcessWorker::new(Arc::clone(&self.stitcher), self.events_tx.clone());
        self.process = Some(worker.start(job.params()));
        self.running_job = Some(job);
        Ok(())
    }

    /// Terminate any running worker
    ///
    /// The workers still report their end, so the session becomes idle once
    /// those events are handled. No post-process step follows a stop.
    pub fn stop(&mut self) {
        self.running_job = None;
        for handle in [&self.process, &self.post_process].into_iter().flatten() {
            handle.stop();
        }
        if self.running {
            self.set_status("Stopped", MessageKind::Warning);
        }
    }

    /// Handle every pending worker event; returns how many were handled
    pub fn poll_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        self.reap_dead_workers();
        handled
    }

    /// Block until no stitch or post-process is running
    pub fn run_until_idle(&mut self, poll_interval: Duration) {
        while self.running {
            match self.events_rx.recv_timeout(poll_interval) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => self.reap_dead_workers(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Apply one worker event to the session state
    pub fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::ProcessStarted => {
                self.set_status("Processing...", MessageKind::Normal);
            }
            WorkerEvent::Progress {
                value,
                total,
                message,
            } => {
                self.progress = Progress {
                    value,
                    total,
                    message,
                };
            }
            WorkerEvent::ProcessError(message) => {
                self.set_status(message, MessageKind::Error);
            }
            WorkerEvent::ProcessFinished { success } => {
                if let Some(handle) = self.process.take() {
                    handle.join();
                }
                let job = self.running_job.take();
                if success {
                    self.set_status("Processing finished", MessageKind::Success);
                    if let Some(job) = job.filter(|j| j.profile.enable_post_process) {
                        self.start_post_process(&job);
                        return;
                    }
                }
                self.running = false;
            }
            WorkerEvent::PostProcessStarted => {
                self.set_status("Post Process Started", MessageKind::Normal);
            }
            WorkerEvent::Console { message, kind } => {
                self.console.push((message, kind));
            }
            WorkerEvent::PostProcessFinished { exit_code } => {
                if let Some(handle) = self.post_process.take() {
                    handle.join();
                }
                if exit_code == Some(0) {
                    self.set_status("Post Process Finished", MessageKind::Success);
                } else {
                    self.set_status("Post Process Failed", MessageKind::Error);
                }
                self.running = false;
            }
            WorkerEvent::UpdateAvailable { version, url } => {
                info!("New version available: {} ({})", version, url);
                self.update_notice = Some(UpdateNotice { version, url });
            }
        }
    }

    fn start_post_process(&mut self, job: &StitchJob) {
        let command = PostProcessCommand::from_template(
            &job.profile.post_process_script,
            &job.profile.post_process_args,
            &job.input,
            &job.output,
        );
        match command {
            Ok(command) => {
                let worker = PostProcessWorker::new(self.events_tx.clone());
                self.post_process = Some(worker.start(command));
            }
            Err(e) => {
                error!("Cannot start post process: {}", e);
                self.set_status(format!("ERROR: {e}"), MessageKind::Error);
                self.running = false;
            }
        }
    }

    /// A worker thread that exited without its final event died mid-way
    fn reap_dead_workers(&mut self) {
        if !self.running {
            return;
        }
        let dead = [&self.process, &self.post_process]
            .into_iter()
            .flatten()
            .any(WorkerHandle::is_finished);
        if !dead {
            return;
        }
        match self.events_rx.try_recv() {
            Ok(event) => self.handle_event(event),
            Err(TryRecvError::Disconnected) => {}
            Err(TryRecvError::Empty) => self.abort_dead_workers(),
        }
    }

    fn abort_dead_workers(&mut self) {
        for handle in [self.process.take(), self.post_process.take()]
            .into_iter()
            .flatten()
        {
            error!("{} worker exited without reporting", handle.name());
            handle.join();
        }
        self.running_job = None;
        self.running = false;
        self.set_status("ERROR: worker stopped unexpectedly", MessageKind::Error);
    }

    /// Start a background update check unless one ran recently
    ///
    /// Returns whether a check was started.
    pub fn check_for_updates(&mut self, checker: UpdateChecker) -> bool {
        if !checker.should_check(self.settings.last_update_check()) {
            debug!("Skipping update check, last check is recent");
            return false;
        }

        self.settings
            .set_last_update_check(UpdateChecker::current_timestamp());
        if let Err(e) = self.settings.sync() {
            warn!("Failed to record update check time: {}", e);
        }
        // The result arrives as an event
        self.update_check = Some(spawn_update_check(checker, self.events_tx.clone()));
        true
    }

    /// Wait up to `timeout` for a started update check, then handle events
    ///
    /// Returns whether no check is left in flight.
    pub fn finish_update_check(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self
            .update_check
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            if Instant::now() >= deadline {
                debug!("Update check still running, not waiting any longer");
                return false;
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
        if let Some(handle) = self.update_check.take()
            && handle.join().is_err()
        {
            error!("Update check thread panicked");
        }
        self.poll_events();
        true
    }

    /// Save session state before exit
    ///
    /// Stops running workers, stores the form snapshot and current profile and
    /// syncs. Events still in flight are discarded so no worker stays blocked
    /// on a full channel.
    pub fn shutdown(mut self, form: Option<&Profile>) -> Result<()> {
        self.stop();
        let handles: Vec<WorkerHandle> = [self.process.take(), self.post_process.take()]
            .into_iter()
            .flatten()
            .collect();
        while handles.iter().any(|handle| !handle.is_finished()) {
            match self.events_rx.recv_timeout(WAIT_POLL_INTERVAL) {
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for handle in handles {
            handle.join();
        }

        if let Some(form) = form {
            self.settings.set_last_form(form);
        }
        self.settings
            .set_current_profile(self.profiles.current_name());
        self.settings.sync()?;
        info!("Session closed");
        Ok(())
    }

    fn set_status(&mut self, message: impl Into<String>, kind: MessageKind) {
        self.status = Status {
            message: message.into(),
            kind,
        };
    }
}

/// Remove every profile name from `text` in one left-to-right pass
///
/// Names match with spaces or underscores; the longest name at a position wins.
fn strip_profile_names(text: &str, profiles: &ProfileStore) -> String {
    let mut names: Vec<String> = profiles
        .iter()
        .flat_map(|profile| [profile.name.clone(), profile.name.replace(' ', "_")])
        .filter(|name| !name.is_empty())
        .collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let mut stripped = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for name in &names {
            if let Some(tail) = rest.strip_prefix(name.as_str()) {
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            stripped.push(c);
        }
        rest = chars.as_str();
    }
    stripped
}
