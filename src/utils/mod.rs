//! Utility modules
//!
//! Provides logging setup and the release update checker.

pub mod logging;
pub mod update_checker;

pub use logging::init_logging;
pub use update_checker::{UpdateCheckResult, UpdateChecker, spawn_update_check};
