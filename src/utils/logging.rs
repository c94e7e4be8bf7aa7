//! Logging system initialization
//!
//! Sets up tracing-based logging with file output to `<config dir>/logs/app.log`
//! and rotation on application startup keeping the last sessions around.

use crate::config::ConfigManager;
use crate::error::{Result, StitchtoonError, StringError};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt};

/// Maximum number of historical log files to keep (app.log.1 through app.log.9)
const MAX_LOG_FILES: u8 = 9;

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "app.log";

/// Initialize the logging system
///
/// The level is `info`, or `debug` when `debug` is set; `RUST_LOG` overrides
/// both. Existing logs are rotated first.
pub fn init_logging(debug: bool) -> Result<()> {
    let log_dir = ConfigManager::get_log_dir();
    std::fs::create_dir_all(&log_dir)?;

    rotate_logs_on_startup(&log_dir.join(LOG_FILE_NAME))?;

    // Rotation is handled above; the appender only writes
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("app")
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| StitchtoonError::ConfigError(Box::new(e)))?;

    let default_level = if debug { "debug" } else { "info" };
    let subscriber = fmt()
        .with_writer(file_appender)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(debug)
        .with_line_number(debug)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| StitchtoonError::ConfigError(Box::new(e)))?;

    tracing::info!(
        "stitchtoon-gui v{} started, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    Ok(())
}

/// Rotate log files on application startup
///
/// `app.log.9` is dropped, every `app.log.N` moves to `app.log.N+1` and
/// `app.log` becomes `app.log.1`. The logger then starts a fresh `app.log`.
fn rotate_logs_on_startup(log_path: &Path) -> Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let log_dir = log_path
        .parent()
        .ok_or_else(|| StitchtoonError::ConfigError(StringError::new("Invalid log path")))?;
    let log_name = log_path
        .file_name()
        .ok_or_else(|| StitchtoonError::ConfigError(StringError::new("Invalid log filename")))?
        .to_string_lossy();

    let oldest_log = log_dir.join(format!("{log_name}.{MAX_LOG_FILES}"));
    if oldest_log.exists() {
        std::fs::remove_file(&oldest_log)?;
    }

    for i in (1..MAX_LOG_FILES).rev() {
        let current_log = log_dir.join(format!("{log_name}.{i}"));
        if current_log.exists() {
            std::fs::rename(&current_log, log_dir.join(format!("{log_name}.{}", i + 1)))?;
        }
    }

    std::fs::rename(log_path, log_dir.join(format!("{log_name}.1")))?;
    Ok(())
}
