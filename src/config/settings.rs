//! Persisted application settings
//!
//! `SettingsStore` is the typed layer over a [`SettingsBackend`]. It owns the
//! first-run policy, the default seeding and the "current profile" fallback,
//! and hands out an observer that keeps the stored profile mapping in step with
//! a live [`ProfileStore`].
//!
//! Stored keys:
//!
//! | key | value |
//! |---|---|
//! | `profiles` | object, profile name → profile record, in list order |
//! | `current-profile` | name of the current profile |
//! | `theme` | theme key, e.g. `dark_teal` |
//! | `used-before` | `true` once defaults were seeded |
//! | `last-form` | form values at the last shutdown |
//! | `last-update-check` | unix seconds of the last update check |

use crate::config::backend::{JsonFileBackend, SettingsBackend};
use crate::config::manager::ConfigManager;
use crate::config::models::{Profile, default_profiles};
use crate::config::theme::Theme;
use crate::error::Result;
use crate::profiles::{ProfileEvent, ProfileStore};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Key of the profile mapping
pub const KEY_PROFILES: &str = "profiles";
/// Key of the current profile name
pub const KEY_CURRENT_PROFILE: &str = "current-profile";
/// Key of the theme
pub const KEY_THEME: &str = "theme";
/// Key of the first-run flag
pub const KEY_USED_BEFORE: &str = "used-before";
/// Key of the form snapshot saved on shutdown
pub const KEY_LAST_FORM: &str = "last-form";
/// Key of the last update check timestamp
pub const KEY_LAST_UPDATE_CHECK: &str = "last-update-check";

/// Backend shared between the store and the persistence observers it hands out
pub type SharedBackend = Arc<Mutex<Box<dyn SettingsBackend + Send>>>;

/// Typed access to persisted settings
///
/// Constructed once at startup and passed to whoever owns the UI lifecycle.
pub struct SettingsStore {
    backend: SharedBackend,
}

impl SettingsStore {
    /// Open settings on top of `backend`, seeding or repairing as needed
    ///
    /// - Never initialized (`used-before` unset or false): full [`reset`](Self::reset).
    /// - Initialized but the profile mapping is missing, empty or unreadable:
    ///   the default profiles are written back, the theme is kept.
    /// - Current profile not among the stored profiles: repointed at the first one.
    ///
    /// Any repair is synced before returning.
    pub fn open(backend: impl SettingsBackend + Send + 'static) -> Result<Self> {
        let store = Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        };

        if !store.used_before() {
            info!("First run, seeding default settings");
            store.reset()?;
            return Ok(store);
        }

        let mut repaired = false;
        let profiles = if let Some(profiles) = store.stored_profiles() {
            profiles
        } else {
            warn!("Stored profiles are missing or unreadable, restoring defaults");
            let defaults = default_profiles();
            store.set_raw(KEY_PROFILES, profiles_to_value(defaults.iter()));
            repaired = true;
            defaults
        };

        let current_is_valid = matches!(
            store.get_raw(KEY_CURRENT_PROFILE),
            Some(Value::String(name)) if profiles.iter().any(|p| p.name == name)
        );
        if !current_is_valid {
            let resolved = store
                .current_profile_name()
                .filter(|name| profiles.iter().any(|p| p.name == *name))
                .unwrap_or_else(|| profiles[0].name.clone());
            debug!("Current profile repointed at {:?}", resolved);
            store.set_raw(KEY_CURRENT_PROFILE, json!(resolved));
            repaired = true;
        }

        if repaired {
            store.sync()?;
        }
        Ok(store)
    }

    /// Open the settings file in the configuration directory
    pub fn open_default() -> Result<Self> {
        ConfigManager::ensure_config_dir()?;
        Self::open(JsonFileBackend::open(ConfigManager::get_settings_path())?)
    }

    /// Write the full default set and flush it
    ///
    /// Always honored, whether or not the settings were used before.
    pub fn reset(&self) -> Result<()> {
        let defaults = default_profiles();
        let mut backend = self.backend.lock();
        backend.set(KEY_PROFILES, profiles_to_value(defaults.iter()));
        backend.set(KEY_CURRENT_PROFILE, json!(defaults[0].name));
        backend.set(KEY_THEME, json!(Theme::default().key()));
        backend.set(KEY_USED_BEFORE, json!(true));
        backend.remove(KEY_LAST_FORM);
        backend.sync()?;
        info!("Settings reset to defaults");
        Ok(())
    }

    /// Whether defaults were seeded at some point
    pub fn used_before(&self) -> bool {
        self.get_raw(KEY_USED_BEFORE)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Build a [`ProfileStore`] from the persisted profiles and current name
    pub fn profile_store(&self) -> ProfileStore {
        let profiles = self.stored_profiles().unwrap_or_else(default_profiles);
        let current = self.current_profile_name();
        ProfileStore::new(profiles, current.as_deref()).unwrap_or_else(|e| {
            warn!("Stored profiles are invalid, using defaults: {}", e);
            ProfileStore::with_defaults()
        })
    }

    /// Profile by name, falling back to the current profile
    ///
    /// `None`, an empty name and an unknown name all resolve to the current
    /// profile. Stale references never fail.
    pub fn get_profile(&self, name: Option<&str>) -> Profile {
        let store = self.profile_store();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if let Ok(profile) = store.get(name) {
                return profile.clone();
            }
            debug!("Profile {:?} not found, using the current profile", name);
        }
        store.current().clone()
    }

    /// Name stored as the current profile
    ///
    /// Older releases stored the whole profile record here; its `name` is used.
    pub fn current_profile_name(&self) -> Option<String> {
        match self.get_raw(KEY_CURRENT_PROFILE)? {
            Value::String(name) => Some(name),
            Value::Object(record) => record
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Store the current profile name (not synced)
    pub fn set_current_profile(&self, name: &str) {
        self.set_raw(KEY_CURRENT_PROFILE, json!(name));
    }

    /// Write the whole profile mapping and the current name (not synced)
    pub fn persist_profiles(&self, store: &ProfileStore) {
        write_profiles(&mut **self.backend.lock(), store);
    }

    /// Observer that persists and syncs `store` on every change
    ///
    /// Register it with [`ProfileStore::subscribe`]. Write failures are logged;
    /// they cannot be reported back through a notification.
    pub fn persistence_observer(&self) -> impl FnMut(&ProfileEvent, &ProfileStore) + 'static {
        let backend = Arc::clone(&self.backend);
        move |event, store| {
            let mut backend = backend.lock();
            write_profiles(&mut **backend, store);
            if let Err(e) = backend.sync() {
                error!("Failed to save profiles after {:?}: {}", event, e);
            }
        }
    }

    /// Selected theme, the default when unset or unknown
    pub fn theme(&self) -> Theme {
        self.get_raw(KEY_THEME)
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|name| Theme::parse(&name).ok())
            .unwrap_or_default()
    }

    /// Store and flush the theme
    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        let mut backend = self.backend.lock();
        backend.set(KEY_THEME, json!(theme.key()));
        backend.sync()
    }

    /// Form values saved at the last shutdown
    pub fn last_form(&self) -> Option<Profile> {
        let value = self.get_raw(KEY_LAST_FORM)?;
        serde_json::from_value(value)
            .map_err(|e| warn!("Ignoring unreadable saved form: {}", e))
            .ok()
    }

    /// Remember the form values (not synced)
    pub fn set_last_form(&self, profile: &Profile) {
        match serde_json::to_value(profile) {
            Ok(value) => self.set_raw(KEY_LAST_FORM, value),
            Err(e) => warn!("Failed to serialize form snapshot: {}", e),
        }
    }

    /// Unix seconds of the last update check, 0 if never
    pub fn last_update_check(&self) -> u64 {
        self.get_raw(KEY_LAST_UPDATE_CHECK)
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Record an update check (not synced)
    pub fn set_last_update_check(&self, timestamp: u64) {
        self.set_raw(KEY_LAST_UPDATE_CHECK, json!(timestamp));
    }

    /// Flush pending writes to durable storage
    pub fn sync(&self) -> Result<()> {
        self.backend.lock().sync()
    }

    /// Raw stored value
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.backend.lock().get(key)
    }

    fn set_raw(&self, key: &str, value: Value) {
        self.backend.lock().set(key, value);
    }

    fn stored_profiles(&self) -> Option<Vec<Profile>> {
        profiles_from_value(&self.get_raw(KEY_PROFILES)?)
    }
}

fn write_profiles(backend: &mut dyn SettingsBackend, store: &ProfileStore) {
    backend.set(KEY_PROFILES, profiles_to_value(store.iter()));
    backend.set(KEY_CURRENT_PROFILE, json!(store.current_name()));
}

/// Serialize profiles into the ordered name → record mapping
pub fn profiles_to_value<'a>(profiles: impl Iterator<Item = &'a Profile>) -> Value {
    let mut map = Map::new();
    for profile in profiles {
        match serde_json::to_value(profile) {
            Ok(record) => {
                map.insert(profile.name.clone(), record);
            }
            Err(e) => warn!("Failed to serialize profile {:?}: {}", profile.name, e),
        }
    }
    Value::Object(map)
}

/// Parse the stored name → record mapping
///
/// Unreadable records are skipped. The mapping key wins over a record's own
/// `name` field. Returns `None` when nothing usable is left.
pub fn profiles_from_value(value: &Value) -> Option<Vec<Profile>> {
    let records = value.as_object()?;
    let mut profiles = Vec::with_capacity(records.len());

    for (key, record) in records {
        if key.trim().is_empty() {
            warn!("Skipping stored profile with an empty name");
            continue;
        }
        match serde_json::from_value::<Profile>(record.clone()) {
            Ok(mut profile) => {
                if profile.name != *key {
                    debug!(
                        "Stored profile {:?} is named {:?}, using the key",
                        key, profile.name
                    );
                    profile.name.clone_from(key);
                }
                profiles.push(profile);
            }
            Err(e) => warn!("Skipping unreadable profile {:?}: {}", key, e),
        }
    }

    (!profiles.is_empty()).then_some(profiles)
}
