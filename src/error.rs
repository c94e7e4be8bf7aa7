//! Error types for `stitchtoon-gui`
//!
//! This module defines all error types used throughout the application,
//! providing clear error messages and proper error propagation.
//!
//! Variants wrapping foreign failures use `#[source]` so the full error chain
//! survives up to the status bar and the log.

use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// Main error type for `stitchtoon-gui`
#[derive(Debug, Error)]
pub enum StitchtoonError {
    /// No profile with this name exists
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// A profile with this name already exists
    #[error("Profile already exists: {0}")]
    DuplicateProfile(String),

    /// Profile names must contain at least one non-whitespace character
    #[error("Profile name cannot be empty")]
    InvalidProfileName,

    /// The last remaining profile cannot be deleted
    #[error("Cannot delete the last remaining profile: {0}")]
    LastProfile(String),

    /// A stitch job failed form validation
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Theme name is not one of the bundled themes
    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    /// A worker is already running
    #[error("A job is already running")]
    WorkerBusy,

    /// Configuration error
    /// Preserves the underlying error source for full error chain transparency
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The external stitcher reported a failure
    /// Preserves the underlying error source for full error chain transparency
    #[error("Processing failed: {0}")]
    ProcessFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The post-process command could not be built or started
    #[error("Post-process error: {0}")]
    PostProcessError(String),

    /// Update check failed
    /// Preserves the underlying error source for full error chain transparency
    #[error("Update check failed: {0}")]
    UpdateCheckError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for `stitchtoon-gui` operations
pub type Result<T> = std::result::Result<T, StitchtoonError>;

/// Convert an error to a user-friendly message
///
/// The returned text is meant for the status bar or an error dialog, so it
/// names the problem and, where possible, what the user can do about it.
pub fn get_user_friendly_error(error: &StitchtoonError) -> String {
    match error {
        StitchtoonError::ProfileNotFound(name) => {
            format!("Profile \"{name}\" does not exist.\n\nSelect another profile from the list.")
        }
        StitchtoonError::DuplicateProfile(name) => format!(
            "A profile named \"{name}\" already exists.\n\n\
             Choose a different name or save over the existing profile."
        ),
        StitchtoonError::InvalidProfileName => "Profile name can't be empty.".to_string(),
        StitchtoonError::LastProfile(name) => format!(
            "\"{name}\" is the only remaining profile.\n\n\
             At least one profile must exist. Use \"Reset\" to restore the defaults."
        ),
        StitchtoonError::InvalidJob(reason) => reason.clone(),
        StitchtoonError::UnknownTheme(theme) => {
            format!("Theme \"{theme}\" is not available.")
        }
        StitchtoonError::WorkerBusy => {
            "A job is already running.\n\nWait for it to finish or stop it first.".to_string()
        }
        StitchtoonError::ConfigError(_) => "Failed to load or save settings.\n\n\
             Your profiles may not persist.\n\
             Check that the settings directory is writable."
            .to_string(),
        StitchtoonError::ProcessFailed(e) => format!("ERROR: {e}"),
        StitchtoonError::PostProcessError(reason) => {
            format!("Post process failed: {reason}")
        }
        StitchtoonError::UpdateCheckError(_) => {
            "Could not check for updates. Check your internet connection.".to_string()
        }
        StitchtoonError::IoError(e) => {
            format!(
                "A file system error occurred:\n\n{e}\n\n\
                 Please check file permissions and disk space."
            )
        }
        StitchtoonError::JsonError(e) => {
            format!(
                "Settings file is corrupted:\n\n{e}\n\n\
                 The application will use default settings."
            )
        }
    }
}
