//! Configuration management module
//!
//! Profiles, theme and first-run state are persisted through a key-value
//! [`SettingsBackend`]; the default backend is a JSON file in the per-user
//! configuration directory, written atomically on every sync.

pub mod backend;
pub mod manager;
pub mod models;
pub mod settings;
pub mod theme;

pub use backend::{JsonFileBackend, MemoryBackend, SettingsBackend};
pub use manager::ConfigManager;
pub use models::{DetectionType, OutputFormat, Profile, SplitMethod, WidthEnforcement};
pub use settings::SettingsStore;
pub use theme::Theme;
