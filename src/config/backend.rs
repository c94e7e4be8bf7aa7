//! Key-value settings backends
//!
//! A backend is a flat map from setting key to JSON value. Writes are buffered
//! until `sync`, which is where durability happens.

use crate::error::{Result, StitchtoonError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Durable key-value storage for settings
pub trait SettingsBackend {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value; durable only after [`SettingsBackend::sync`]
    fn set(&mut self, key: &str, value: Value);

    /// Delete a key
    fn remove(&mut self, key: &str);

    /// Flush pending writes
    fn sync(&mut self) -> Result<()>;
}

/// Backend keeping everything in memory
///
/// Clones share the same storage, so a test can keep one handle after moving
/// another into a settings store and still observe values and sync counts.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: Map<String, Value>,
    sync_count: usize,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `values`
    pub fn with_values(values: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                values,
                sync_count: 0,
            })),
        }
    }

    /// Number of times `sync` was called
    pub fn sync_count(&self) -> usize {
        self.inner.lock().sync_count
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.inner.lock().values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.inner.lock().values.remove(key);
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.lock().sync_count += 1;
        Ok(())
    }
}

/// Backend storing all settings in one JSON object file
///
/// The file is replaced atomically on `sync`: the new content goes to a
/// temporary file in the same directory which is then renamed over the old one.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    values: Map<String, Value>,
    dirty: bool,
}

impl JsonFileBackend {
    /// Open the settings file at `path`
    ///
    /// A missing file yields an empty backend. A corrupt file is logged and
    /// also treated as empty so the settings layer can reseed defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            info!("Settings file {} not found, starting empty", path.display());
            return Ok(Self {
                path,
                values: Map::new(),
                dirty: false,
            });
        }

        let json = std::fs::read_to_string(&path)?;
        let values = match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(values)) => {
                info!("Settings loaded from {}", path.display());
                values
            }
            Ok(other) => {
                warn!(
                    "Settings file holds a {} instead of an object, ignoring it",
                    json_kind(&other)
                );
                Map::new()
            }
            Err(e) => {
                warn!("Failed to parse settings, ignoring stored values: {}", e);
                Map::new()
            }
        };

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are writes not yet flushed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_atomically(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(&self.values)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| StitchtoonError::ConfigError(Box::new(e)))?;
        Ok(())
    }
}

impl SettingsBackend for JsonFileBackend {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.write_atomically()?;
        self.dirty = false;
        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
