#![no_main]

use libfuzzer_sys::fuzz_target;
use stitchtoon_gui::config::{MemoryBackend, SettingsBackend, SettingsStore};
use stitchtoon_gui::config::settings::KEY_PROFILES;

fuzz_target!(|data: &[u8]| {
    // Arbitrary settings content must never panic, only fall back to defaults
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(serde_json::Value::Object(values)) = serde_json::from_str(s) else {
        return;
    };

    let backend = MemoryBackend::with_values(values);
    let Ok(settings) = SettingsStore::open(backend.clone()) else {
        return;
    };
    let store = settings.profile_store();
    assert!(!store.is_empty());
    assert!(store.contains(store.current_name()));
    let _ = settings.get_profile(Some(store.current_name()));
    let _ = settings.theme();
    let _ = settings.last_form();
    assert!(backend.get(KEY_PROFILES).is_some());
});
