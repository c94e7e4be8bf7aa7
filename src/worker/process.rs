//! Stitch worker
//!
//! Turns a profile plus input/output paths into the parameter bundle of the
//! external stitcher and runs it on a background thread.

use super::{ChildSlot, MessageKind, WorkerEvent, WorkerHandle};
use crate::config::models::{
    DetectionType, OutputFormat, Profile, SplitMethod, WidthEnforcement,
};
use crate::error::{Result, StitchtoonError, StringError};
use crate::worker::progress::{DEFAULT_PROGRESS_TOTAL, ProgressReporter};
use parking_lot::Mutex;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::mpsc::SyncSender;
use std::thread;
use tracing::{debug, error, info};

/// Smallest split height accepted with [`SplitMethod::SplitHeight`]
pub const MIN_SPLIT_HEIGHT: u32 = 300;

/// Largest image count accepted with [`SplitMethod::ImagesNumber`]
pub const MAX_IMAGES_NUMBER: u32 = 500;

/// Detection tuning passed to the stitcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionParams {
    /// Slice detection strategy
    pub detection_type: DetectionType,
    /// Detection sensitivity (0-100)
    pub sensitivity: u8,
    /// Width for fixed width enforcement, `-1` when unset
    pub custom_width: i32,
    /// Width enforcement mode
    pub width_enforce: WidthEnforcement,
    /// Rows skipped between scans
    pub line_steps: u32,
    /// Border pixels ignored
    pub ignorable_pixels: u32,
}

/// Parameter bundle of one stitcher call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessParams {
    /// Input directory
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Target height per image, 0 when splitting by count
    pub split_height: u32,
    /// Number of output images, 0 when splitting by height
    pub images_number: u32,
    /// Export format
    pub output_format: OutputFormat,
    /// Quality for lossy formats
    pub lossy_quality: u8,
    /// Process sub-directories
    pub recursive: bool,
    /// Pack the output into an archive
    pub as_archive: bool,
    /// Slice at the source image heights
    pub slice_to_metadata: bool,
    /// Write slicing metadata
    pub write_metadata: bool,
    /// Detection tuning
    pub params: DetectionParams,
}

impl ProcessParams {
    /// Build the bundle for `profile` applied to `input` → `output`
    pub fn from_profile(profile: &Profile, input: &Path, output: &Path) -> Self {
        let (split_height, images_number) = match profile.split_method {
            SplitMethod::SplitHeight => (profile.split_value, 0),
            SplitMethod::ImagesNumber => (0, profile.split_value),
        };

        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            split_height,
            images_number,
            output_format: profile.output_format,
            lossy_quality: profile.lossy_quality,
            recursive: profile.batch_mode,
            as_archive: profile.export_archive,
            slice_to_metadata: profile.match_source,
            write_metadata: profile.write_metadata,
            params: DetectionParams {
                detection_type: profile.detection_type,
                sensitivity: profile.sensitivity,
                custom_width: profile.width_enforcement_fixed_value,
                width_enforce: profile.width_enforcement,
                line_steps: profile.line_steps,
                ignorable_pixels: profile.ignorable_pixels,
            },
        }
    }
}

/// One requested stitch: the form's paths and option values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchJob {
    /// Input directory
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Option values, named after the selected profile
    pub profile: Profile,
}

impl StitchJob {
    /// Create a job
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, profile: Profile) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            profile,
        }
    }

    /// Check the form before dispatching
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StitchtoonError::InvalidJob(msg));

        if self.input.as_os_str().is_empty() {
            return invalid("Input field can't be empty".to_string());
        }
        if self.output.as_os_str().is_empty() {
            return invalid("Output field can't be empty".to_string());
        }

        let value = self.profile.split_value;
        if value == 0 {
            return invalid("Split value can't be 0".to_string());
        }
        match self.profile.split_method {
            SplitMethod::SplitHeight if value < MIN_SPLIT_HEIGHT => invalid(format!(
                "Smallest allowed height with `Split height` method is {MIN_SPLIT_HEIGHT}"
            )),
            SplitMethod::ImagesNumber if value > MAX_IMAGES_NUMBER => invalid(format!(
                "Maximum allowed number with `Images number` method is {MAX_IMAGES_NUMBER}"
            )),
            _ => Ok(()),
        }
    }

    /// Parameter bundle for the stitcher
    pub fn params(&self) -> ProcessParams {
        ProcessParams::from_profile(&self.profile, &self.input, &self.output)
    }
}

/// What a stitcher gets besides the parameters
#[derive(Debug, Clone)]
pub struct WorkerContext {
    events: SyncSender<WorkerEvent>,
    progress: ProgressReporter,
    child: ChildSlot,
}

impl WorkerContext {
    /// Create a context reporting to `events`
    pub fn new(events: SyncSender<WorkerEvent>, child: ChildSlot) -> Self {
        Self {
            progress: ProgressReporter::new(events.clone(), DEFAULT_PROGRESS_TOTAL),
            events,
            child,
        }
    }

    /// Progress sink
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Slot for a child process, so the worker can be stopped
    pub fn child_slot(&self) -> &ChildSlot {
        &self.child
    }

    /// Send a console line to the UI
    pub fn console(&self, message: impl Into<String>, kind: MessageKind) {
        let _ = self.events.send(WorkerEvent::Console {
            message: message.into(),
            kind,
        });
    }
}

/// The external stitching library, seen as a black box
pub trait Stitcher: Send + Sync {
    /// Run one stitch; blocking
    fn process(&self, params: &ProcessParams, ctx: &WorkerContext) -> Result<()>;
}

/// Stitcher running the `stitchtoon` command-line tool
#[derive(Debug, Clone)]
pub struct CommandStitcher {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Default for CommandStitcher {
    fn default() -> Self {
        Self::new("stitchtoon")
    }
}

impl CommandStitcher {
    /// Use `program` as the stitcher executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Parse a shell-quoted command line such as `python -m stitchtoon`
    ///
    /// Tokens after the program are passed before the stitch arguments.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut tokens = shlex::split(line)
            .ok_or_else(|| {
                StitchtoonError::ConfigError(StringError::new(format!(
                    "stitcher command has unbalanced quotes: {line}"
                )))
            })?
            .into_iter();
        let program = tokens.next().ok_or_else(|| {
            StitchtoonError::ConfigError(StringError::new("stitcher command is empty"))
        })?;

        Ok(Self {
            program: program.into(),
            leading_args: tokens.map(OsString::from).collect(),
        })
    }

    /// Executable being run
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for `params`
    pub fn args(params: &ProcessParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--input".into(),
            params.input.clone().into(),
            "--output".into(),
            params.output.clone().into(),
            "--split-height".into(),
            params.split_height.to_string().into(),
            "--images-number".into(),
            params.images_number.to_string().into(),
            "--output-format".into(),
            params.output_format.as_str().into(),
            "--lossy-quality".into(),
            params.lossy_quality.to_string().into(),
            "--detection-type".into(),
            params.params.detection_type.as_str().into(),
            "--sensitivity".into(),
            params.params.sensitivity.to_string().into(),
            "--custom-width".into(),
            params.params.custom_width.to_string().into(),
            "--width-enforce".into(),
            params.params.width_enforce.as_str().to_lowercase().into(),
            "--line-steps".into(),
            params.params.line_steps.to_string().into(),
            "--ignorable-pixels".into(),
            params.params.ignorable_pixels.to_string().into(),
        ];

        for (enabled, flag) in [
            (params.recursive, "--recursive"),
            (params.as_archive, "--as-archive"),
            (params.slice_to_metadata, "--slice-to-metadata"),
            (params.write_metadata, "--write-metadata"),
        ] {
            if enabled {
                args.push(flag.into());
            }
        }
        args
    }
}

impl Stitcher for CommandStitcher {
    fn process(&self, params: &ProcessParams, ctx: &WorkerContext) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args).args(Self::args(params));
        debug!("Running stitcher: {:?}", command);

        let last_error = Arc::new(Mutex::new(None::<String>));
        let last_error_sink = Arc::clone(&last_error);
        let progress = ctx.progress();

        let status = ctx
            .child_slot()
            .run(
                &mut command,
                |line| {
                    debug!("stitcher: {}", line);
                    progress.set_message(line.trim());
                },
                move |line| {
                    debug!("stitcher stderr: {}", line);
                    if !line.trim().is_empty() {
                        *last_error_sink.lock() = Some(line.trim().to_string());
                    }
                },
            )
            .map_err(|e| StitchtoonError::ProcessFailed(Box::new(e)))?;

        if ctx.child_slot().is_stopped() {
            return Err(StitchtoonError::ProcessFailed(StringError::new(
                "stopped by user",
            )));
        }
        if !status.success() {
            let detail = last_error
                .lock()
                .take()
                .unwrap_or_else(|| format!("{} exited with {status}", self.program.display()));
            return Err(StitchtoonError::ProcessFailed(StringError::new(detail)));
        }
        Ok(())
    }
}

/// Runs a [`Stitcher`] on a background thread
pub struct ProcessWorker {
    stitcher: Arc<dyn Stitcher>,
    events: SyncSender<WorkerEvent>,
}

impl ProcessWorker {
    /// Create a worker reporting to `events`
    pub fn new(stitcher: Arc<dyn Stitcher>, events: SyncSender<WorkerEvent>) -> Self {
        Self { stitcher, events }
    }

    /// Start stitching
    ///
    /// Emits `ProcessStarted`, progress, `ProcessError` on failure and always a
    /// final `ProcessFinished`.
    pub fn start(self, params: ProcessParams) -> WorkerHandle {
        let slot = ChildSlot::default();
        let ctx = WorkerContext::new(self.events.clone(), slot.clone());

        let thread = thread::spawn(move || {
            info!(
                "Stitching {} into {}",
                params.input.display(),
                params.output.display()
            );
            let _ = self.events.send(WorkerEvent::ProcessStarted);
            ctx.progress().start();

            let success = match self.stitcher.process(&params, &ctx) {
                Ok(()) => {
                    ctx.progress().finish();
                    info!("Stitching finished");
                    true
                }
                Err(e) => {
                    error!("Stitching failed: {}", e);
                    let message = match &e {
                        StitchtoonError::ProcessFailed(source) => source.to_string(),
                        other => other.to_string(),
                    };
                    let _ = self.events.send(WorkerEvent::ProcessError(message));
                    false
                }
            };

            let _ = self.events.send(WorkerEvent::ProcessFinished { success });
        });

        WorkerHandle::new("process", thread, slot)
    }
}
