//! `stitchtoon-gui` - desktop front-end core for the stitchtoon stitcher
//!
//! Manages named option profiles, persists them with the theme and first-run
//! state, and runs the stitcher and an optional post-process command on
//! background threads that report back over a channel.
//!
//! # Layout
//!
//! - [`config`]: settings backends, persisted settings, profile and theme models
//! - [`profiles`]: the observable, ordered profile collection
//! - [`worker`]: stitch, post-process and progress plumbing
//! - [`controller`]: the UI-thread session owner tying it together
//! - [`utils`]: logging and the update checker

// Module declarations
pub mod config;
pub mod controller;
pub mod error;
pub mod profiles;
pub mod utils;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use error::{Result, StitchtoonError};
