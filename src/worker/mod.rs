//! Background workers
//!
//! Stitching, post-processing and update checks run off the UI thread. Each
//! worker reports back over a `SyncSender<WorkerEvent>`; the UI thread drains
//! the matching receiver and is the only place that touches settings or
//! profiles.
//!
//! # Event Flow
//!
//! ```text
//! ProcessWorker ──┐
//! PostProcessWorker ──► WorkerEvent ──► SessionController (UI thread)
//! update check ───┘
//! ```
//!
//! Workers can be stopped abruptly through their [`WorkerHandle`]; a running
//! child process is killed and no partial result is reported.

pub mod postprocess;
pub mod process;
pub mod progress;

pub use postprocess::{PostProcessCommand, PostProcessWorker};
pub use process::{
    CommandStitcher, DetectionParams, ProcessParams, ProcessWorker, StitchJob, Stitcher,
    WorkerContext,
};
pub use progress::ProgressReporter;

use crate::error::Result;
use parking_lot::Mutex;
use semver::Version;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Severity of a status or console message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// Plain output
    #[default]
    Normal,
    /// Something finished well
    Success,
    /// Something needs attention
    Warning,
    /// Something failed
    Error,
}

impl MessageKind {
    /// Text color used by the status bar and console
    pub fn color(self) -> &'static str {
        match self {
            Self::Normal => "gray",
            Self::Success => "green",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Events sent from workers to the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Stitching started
    ProcessStarted,
    /// Progress of the running stitch
    Progress {
        /// Current value
        value: u32,
        /// Value meaning "done"
        total: u32,
        /// Progress bar text
        message: String,
    },
    /// Stitching failed; the message is meant for the status bar
    ProcessError(String),
    /// Stitching ended, successfully or not
    ProcessFinished {
        /// Whether the stitcher completed without error
        success: bool,
    },
    /// The post-process command started
    PostProcessStarted,
    /// One line of post-process output
    Console {
        /// Output line
        message: String,
        /// Normal for stdout, error for stderr and failures
        kind: MessageKind,
    },
    /// The post-process command ended
    PostProcessFinished {
        /// Exit code, `None` when it never ran or was killed by a signal
        exit_code: Option<i32>,
    },
    /// A newer release was found
    UpdateAvailable {
        /// Latest version
        version: Version,
        /// Where to download it
        url: String,
    },
}

/// How often a child that closed its output is checked for exit
const CHILD_WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Child process shared between a worker thread and its handle
///
/// The worker thread spawns and waits; the handle may kill at any time.
#[derive(Debug, Clone, Default)]
pub struct ChildSlot {
    child: Arc<Mutex<Option<Child>>>,
    stop_requested: Arc<AtomicBool>,
}

impl ChildSlot {
    /// Request termination, killing the child if one is running
    pub fn kill(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(child) = self.child.lock().as_mut() {
            debug!("Killing child process {}", child.id());
            if let Err(e) = child.kill() {
                warn!("Failed to kill child process: {}", e);
            }
        }
    }

    /// Whether [`ChildSlot::kill`] was called
    pub fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Spawn `command`, stream its output line by line and wait for it
    ///
    /// `on_stdout` runs on the calling thread, `on_stderr` on a helper thread.
    /// The child stays killable until it has exited, even after closing its
    /// output.
    pub fn run(
        &self,
        command: &mut Command,
        mut on_stdout: impl FnMut(&str),
        mut on_stderr: impl FnMut(&str) + Send + 'static,
    ) -> Result<ExitStatus> {
        if self.is_stopped() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "stopped before the command started",
            )
            .into());
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        *self.child.lock() = Some(child);

        // kill() may have run between the check above and the store
        if self.is_stopped() {
            self.kill();
        }

        let stderr_reader = stderr.map(|stderr| {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(std::io::Result::ok) {
                    on_stderr(&line);
                }
            })
        });

        if let Some(stdout) = stdout {
            for line in BufReader::new(stdout).lines().map_while(std::io::Result::ok) {
                on_stdout(&line);
            }
        }
        if let Some(reader) = stderr_reader
            && reader.join().is_err()
        {
            error!("stderr reader thread panicked");
        }

        loop {
            let mut slot = self.child.lock();
            let Some(child) = slot.as_mut() else {
                return Err(std::io::Error::other("child process handle went missing").into());
            };
            if let Some(status) = child.try_wait()? {
                *slot = None;
                return Ok(status);
            }
            drop(slot);
            thread::sleep(CHILD_WAIT_INTERVAL);
        }
    }
}

/// Handle to a running worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    thread: Option<JoinHandle<()>>,
    child: ChildSlot,
}

impl WorkerHandle {
    fn new(name: &'static str, thread: JoinHandle<()>, child: ChildSlot) -> Self {
        Self {
            name,
            thread: Some(thread),
            child,
        }
    }

    /// Worker name, for logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Terminate the worker abruptly
    ///
    /// Kills the running child process. The thread still sends its final
    /// event, reporting failure.
    pub fn stop(&self) {
        debug!("Stopping {} worker", self.name);
        self.child.kill();
    }

    /// Wait for the worker thread to exit
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("{} worker panicked", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_colors() {
        assert_eq!(MessageKind::Error.color(), "red");
        assert_eq!(MessageKind::Warning.color(), "yellow");
        assert_eq!(MessageKind::Success.color(), "green");
        assert_eq!(MessageKind::default(), MessageKind::Normal);
    }

    #[test]
    fn test_kill_before_run_refuses_to_spawn() {
        let slot = ChildSlot::default();
        slot.kill();
        assert!(slot.is_stopped());

        let result = slot.run(&mut Command::new("does-not-matter"), |_| {}, |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_run_missing_program_fails() {
        let slot = ChildSlot::default();
        let result = slot.run(
            &mut Command::new("stitchtoon-definitely-not-installed"),
            |_| {},
            |_| {},
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_streams_stdout_and_stderr() {
        let slot = ChildSlot::default();
        let mut stdout_lines = Vec::new();
        let stderr_lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stderr_lines);

        let status = slot
            .run(
                Command::new("sh").args(["-c", "echo one; echo two; echo oops >&2; exit 3"]),
                |line| stdout_lines.push(line.to_string()),
                move |line| sink.lock().push(line.to_string()),
            )
            .unwrap();

        assert_eq!(status.code(), Some(3));
        assert_eq!(stdout_lines, ["one", "two"]);
        assert_eq!(stderr_lines.lock().as_slice(), ["oops"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_reaches_child_with_closed_output() {
        let slot = ChildSlot::default();
        let killer = slot.clone();
        let kill_thread = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            killer.kill();
        });

        let started = std::time::Instant::now();
        let status = slot
            .run(
                Command::new("sh").args(["-c", "exec >&- 2>&-; exec sleep 30"]),
                |_| {},
                |_| {},
            )
            .unwrap();
        kill_thread.join().unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(slot.child.lock().is_none());
    }
}
