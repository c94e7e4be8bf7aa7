//! Shared test utilities for `stitchtoon-gui` unit tests.
//!
//! Only compiled during testing (`#[cfg(test)]`).

use crate::config::manager::CONFIG_DIR_ENV;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that modify the configuration directory variable.
static CONFIG_DIR_LOCK: Mutex<()> = Mutex::new(());

/// Create a temporary test directory that is removed when dropped.
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// RAII guard pointing `STITCHTOON_CONFIG_DIR` at a test directory and
/// restoring the previous value when dropped.
///
/// # Safety Considerations
///
/// `std::env::set_var` and `std::env::remove_var` are unsafe because another
/// thread may read the environment concurrently. Tests that read the variable
/// hold this guard, and `CONFIG_DIR_LOCK` keeps them from overlapping. A
/// poisoned lock is recovered so one failing test does not cascade.
pub struct ConfigDirGuard {
    original: Option<OsString>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[expect(
    unsafe_code,
    reason = "Test-only code that modifies environment variables under a global lock"
)]
impl ConfigDirGuard {
    /// Point the configuration directory at `temp_dir`.
    pub fn new(temp_dir: &TempDir) -> Self {
        Self::with_path(temp_dir.path())
    }

    /// Point the configuration directory at `path`.
    pub fn with_path(path: &Path) -> Self {
        let lock = CONFIG_DIR_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let original = std::env::var_os(CONFIG_DIR_ENV);
        // SAFETY: CONFIG_DIR_LOCK is held for the guard's lifetime, so no
        // other guarded test touches the variable meanwhile.
        unsafe {
            std::env::set_var(CONFIG_DIR_ENV, path);
        }
        Self {
            original,
            _lock: lock,
        }
    }
}

#[expect(
    unsafe_code,
    reason = "Test-only code that restores environment variables under a global lock"
)]
impl Drop for ConfigDirGuard {
    fn drop(&mut self) {
        // SAFETY: the lock is still held; it is released after this runs.
        match self.original.take() {
            Some(original) => unsafe { std::env::set_var(CONFIG_DIR_ENV, original) },
            None => unsafe { std::env::remove_var(CONFIG_DIR_ENV) },
        }
    }
}
