//! Post-process worker
//!
//! Runs the user's command after a successful stitch and streams its output to
//! the console pane.

use super::{ChildSlot, MessageKind, WorkerEvent, WorkerHandle};
use crate::error::{Result, StitchtoonError};
use std::path::Path;
use std::process::Command;
use std::sync::mpsc::SyncSender;
use std::thread;
use tracing::{debug, info, warn};

const INPUT_PLACEHOLDER: &str = "$input";
const OUTPUT_PLACEHOLDER: &str = "$output";

/// A fully resolved post-process command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessCommand {
    program: String,
    args: Vec<String>,
}

impl PostProcessCommand {
    /// Build the command from the profile's script and argument strings
    ///
    /// Both strings are split with shell quoting rules. Leading tokens of the
    /// script after the program (e.g. `python -u`) are kept before `args`.
    /// `$input` and `$output` in `args` are replaced by the stitch paths before
    /// splitting, so a path containing spaces must be quoted in the template.
    pub fn from_template(script: &str, args: &str, input: &Path, output: &Path) -> Result<Self> {
        let mut tokens = split(script, "script")?.into_iter();
        let program = tokens
            .next()
            .ok_or_else(|| StitchtoonError::PostProcessError("script is empty".to_string()))?;

        let substituted = substitute(
            args,
            &input.to_string_lossy(),
            &output.to_string_lossy(),
        );
        let mut all_args: Vec<String> = tokens.collect();
        all_args.extend(split(&substituted, "arguments")?);

        Ok(Self {
            program,
            args: all_args,
        })
    }

    /// Executable to run
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// `std::process::Command` for this command line
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

fn split(text: &str, what: &str) -> Result<Vec<String>> {
    shlex::split(text).ok_or_else(|| {
        StitchtoonError::PostProcessError(format!("unbalanced quotes in {what}: {text}"))
    })
}

/// Replace placeholders in one pass; substituted text is never rescanned
fn substitute(template: &str, input: &str, output: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(INPUT_PLACEHOLDER) {
            result.push_str(input);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(OUTPUT_PLACEHOLDER) {
            result.push_str(output);
            rest = after;
        } else {
            result.push('$');
            rest = &tail[1..];
        }
    }
    result.push_str(rest);
    result
}

/// Runs a [`PostProcessCommand`] on a background thread
pub struct PostProcessWorker {
    events: SyncSender<WorkerEvent>,
}

impl PostProcessWorker {
    /// Create a worker reporting to `events`
    pub fn new(events: SyncSender<WorkerEvent>) -> Self {
        Self { events }
    }

    /// Start the command
    ///
    /// Emits `PostProcessStarted`, one `Console` event per output line and a
    /// final `PostProcessFinished`. A command that cannot be spawned yields an
    /// error console line and no exit code.
    pub fn start(self, command: PostProcessCommand) -> WorkerHandle {
        let slot = ChildSlot::default();
        let worker_slot = slot.clone();

        let thread = thread::spawn(move || {
            info!("Post process: {} {:?}", command.program(), command.args());
            let events = self.events;
            let _ = events.send(WorkerEvent::PostProcessStarted);

            let stderr_events = events.clone();
            let result = worker_slot.run(
                &mut command.to_command(),
                |line| {
                    let _ = events.send(WorkerEvent::Console {
                        message: line.to_string(),
                        kind: MessageKind::Normal,
                    });
                },
                move |line| {
                    let _ = stderr_events.send(WorkerEvent::Console {
                        message: line.to_string(),
                        kind: MessageKind::Error,
                    });
                },
            );

            let exit_code = match result {
                Ok(status) => {
                    debug!("Post process exited with {}", status);
                    status.code()
                }
                Err(e) => {
                    warn!("Post process failed: {}", e);
                    let _ = events.send(WorkerEvent::Console {
                        message: format!("ERROR: {e}"),
                        kind: MessageKind::Error,
                    });
                    None
                }
            };
            let _ = events.send(WorkerEvent::PostProcessFinished { exit_code });
        });

        WorkerHandle::new("post-process", thread, slot)
    }
}
