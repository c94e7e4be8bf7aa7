//! Ordered, name-keyed profile collection
//!
//! `ProfileStore` backs the profile list and combo box. It keeps profiles in
//! insertion order, enforces unique non-empty names, always holds at least one
//! profile and always has a current profile that exists.
//!
//! The store does not persist anything itself. Every mutation is announced to
//! the registered observers, in registration order, after the change is
//! complete; the settings layer subscribes one that writes the whole mapping.

use crate::config::models::{Profile, default_profiles};
use crate::error::{Result, StitchtoonError, StringError};
use std::fmt;
use tracing::debug;

/// Change notifications emitted by [`ProfileStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    /// A new profile was appended
    Added(Profile),
    /// An existing profile was replaced
    Updated(Profile),
    /// A profile was removed; `current` is the current profile afterwards
    Deleted {
        /// Name of the removed profile
        name: String,
        /// Current profile after the removal
        current: String,
    },
    /// The current profile changed
    CurrentChanged(String),
    /// The whole collection was replaced
    Reset,
}

/// Handle returned by [`ProfileStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

type Observer = Box<dyn FnMut(&ProfileEvent, &ProfileStore)>;

/// Ordered profile collection with a current-profile pointer
///
/// Not thread-safe; owned by the UI thread.
pub struct ProfileStore {
    profiles: Vec<Profile>,
    current: String,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: usize,
}

impl ProfileStore {
    /// Build a store from `profiles`, selecting `current` when it exists
    ///
    /// Falls back to the first profile when `current` is `None` or unknown.
    /// Fails on an empty list, an empty name or a duplicate name.
    pub fn new(profiles: Vec<Profile>, current: Option<&str>) -> Result<Self> {
        let (profiles, current) = Self::validated(profiles, current)?;
        Ok(Self {
            profiles,
            current,
            observers: Vec::new(),
            next_observer: 0,
        })
    }

    /// Store holding the built-in default profiles
    pub fn with_defaults() -> Self {
        let profiles = default_profiles();
        let current = profiles[0].name.clone();
        Self {
            profiles,
            current,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    fn validated(
        profiles: Vec<Profile>,
        current: Option<&str>,
    ) -> Result<(Vec<Profile>, String)> {
        for (i, profile) in profiles.iter().enumerate() {
            validate_name(&profile.name)?;
            if profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(StitchtoonError::DuplicateProfile(profile.name.clone()));
            }
        }

        let current = match current {
            Some(name) if profiles.iter().any(|p| p.name == name) => name.to_string(),
            _ => profiles
                .first()
                .map(|p| p.name.clone())
                .ok_or_else(|| {
                    StitchtoonError::ConfigError(StringError::new(
                        "a profile store needs at least one profile",
                    ))
                })?,
        };

        Ok((profiles, current))
    }

    /// Profile names in list order
    pub fn list(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    /// Profiles in list order
    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Number of profiles (never zero)
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always `false`; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Whether a profile with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == name)
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StitchtoonError::ProfileNotFound(name.to_string()))
    }

    /// Position of a profile in the list, for selection syncing
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| StitchtoonError::ProfileNotFound(name.to_string()))
    }

    /// Name of the current profile
    pub fn current_name(&self) -> &str {
        &self.current
    }

    /// The current profile
    pub fn current(&self) -> &Profile {
        // `current` always names a stored profile; the fallback is unreachable
        self.profiles
            .iter()
            .find(|p| p.name == self.current)
            .unwrap_or(&self.profiles[0])
    }

    /// Make `name` the current profile
    pub fn set_current(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(StitchtoonError::ProfileNotFound(name.to_string()));
        }
        if self.current != name {
            self.current = name.to_string();
            self.notify(&ProfileEvent::CurrentChanged(self.current.clone()));
        }
        Ok(())
    }

    /// Append a new profile
    pub fn add(&mut self, profile: Profile) -> Result<()> {
        validate_name(&profile.name)?;
        if self.contains(&profile.name) {
            return Err(StitchtoonError::DuplicateProfile(profile.name));
        }
        debug!("Adding profile {:?}", profile.name);
        self.profiles.push(profile.clone());
        self.notify(&ProfileEvent::Added(profile));
        Ok(())
    }

    /// Replace an existing profile, keeping its position
    pub fn update(&mut self, profile: Profile) -> Result<()> {
        let index = self.index_of(&profile.name)?;
        debug!("Updating profile {:?}", profile.name);
        self.profiles[index] = profile.clone();
        self.notify(&ProfileEvent::Updated(profile));
        Ok(())
    }

    /// Update when the name exists, add otherwise
    pub fn upsert(&mut self, profile: Profile) -> Result<()> {
        if self.contains(&profile.name) {
            self.update(profile)
        } else {
            self.add(profile)
        }
    }

    /// Remove a profile
    ///
    /// Deleting the current profile moves the current pointer to the first
    /// remaining profile. The last remaining profile cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        if self.profiles.len() == 1 {
            return Err(StitchtoonError::LastProfile(name.to_string()));
        }

        let removed = self.profiles.remove(index);
        if self.current == removed.name {
            self.current = self.profiles[0].name.clone();
        }
        debug!(
            "Deleted profile {:?}, current is now {:?}",
            removed.name, self.current
        );

        self.notify(&ProfileEvent::Deleted {
            name: removed.name,
            current: self.current.clone(),
        });
        Ok(())
    }

    /// Replace every profile at once (used by "reset to defaults")
    pub fn replace_all(&mut self, profiles: Vec<Profile>, current: Option<&str>) -> Result<()> {
        let (profiles, current) = Self::validated(profiles, current)?;
        self.profiles = profiles;
        self.current = current;
        self.notify(&ProfileEvent::Reset);
        Ok(())
    }

    /// Register an observer called after every mutation
    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&ProfileEvent, &ProfileStore) + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify(&mut self, event: &ProfileEvent) {
        // Observers get a shared view of the store, so they cannot subscribe
        // or mutate while being called.
        let mut observers = std::mem::take(&mut self.observers);
        for (_, observer) in &mut observers {
            observer(event, self);
        }
        self.observers = observers;
    }
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("profiles", &self.list())
            .field("current", &self.current)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StitchtoonError::InvalidProfileName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::OutputFormat;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn two_profile_store() -> ProfileStore {
        let defaults = default_profiles();
        ProfileStore::new(defaults[..2].to_vec(), Some("To Edit")).unwrap()
    }

    fn recorder(store: &mut ProfileStore) -> Rc<RefCell<Vec<ProfileEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |event, _| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn test_defaults_are_listed_in_order() {
        let store = ProfileStore::with_defaults();
        assert_eq!(
            store.list(),
            ["To Edit", "Ready", "Manga To Edit", "Manga Ready"]
        );
        assert_eq!(store.current_name(), "To Edit");
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        assert!(ProfileStore::new(Vec::new(), None).is_err());
        assert!(matches!(
            ProfileStore::new(vec![Profile::new("  ")], None),
            Err(StitchtoonError::InvalidProfileName)
        ));
        assert!(matches!(
            ProfileStore::new(vec![Profile::new("A"), Profile::new("A")], None),
            Err(StitchtoonError::DuplicateProfile(name)) if name == "A"
        ));
    }

    #[test]
    fn test_new_falls_back_to_first_when_current_unknown() {
        let store = ProfileStore::new(default_profiles(), Some("Gone")).unwrap();
        assert_eq!(store.current_name(), "To Edit");
    }

    #[test]
    fn test_get_and_index_of() {
        let store = ProfileStore::with_defaults();
        assert_eq!(store.get("Ready").unwrap().name, "Ready");
        assert_eq!(store.index_of("Manga Ready").unwrap(), 3);
        assert!(matches!(
            store.get("Missing"),
            Err(StitchtoonError::ProfileNotFound(_))
        ));
        assert!(matches!(
            store.index_of("Missing"),
            Err(StitchtoonError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_add_appends_and_notifies() {
        let mut store = two_profile_store();
        let events = recorder(&mut store);

        store.add(Profile::new("Webtoon")).unwrap();

        assert_eq!(store.list(), ["To Edit", "Ready", "Webtoon"]);
        assert_eq!(
            events.borrow().as_slice(),
            [ProfileEvent::Added(Profile::new("Webtoon"))]
        );
    }

    #[test]
    fn test_add_duplicate_fails_without_notification() {
        let mut store = two_profile_store();
        let events = recorder(&mut store);

        let err = store.add(Profile::new("Ready")).unwrap_err();
        assert!(matches!(err, StitchtoonError::DuplicateProfile(name) if name == "Ready"));
        assert!(events.borrow().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_add_empty_name_fails() {
        let mut store = two_profile_store();
        assert!(matches!(
            store.add(Profile::new("")),
            Err(StitchtoonError::InvalidProfileName)
        ));
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut store = two_profile_store();
        let events = recorder(&mut store);

        let mut edited = Profile::new("To Edit");
        edited.output_format = OutputFormat::Png;
        store.update(edited.clone()).unwrap();

        assert_eq!(store.index_of("To Edit").unwrap(), 0);
        assert_eq!(store.get("To Edit").unwrap().output_format, OutputFormat::Png);
        assert_eq!(events.borrow().as_slice(), [ProfileEvent::Updated(edited)]);
    }

    #[test]
    fn test_update_missing_fails() {
        let mut store = two_profile_store();
        assert!(matches!(
            store.update(Profile::new("Missing")),
            Err(StitchtoonError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_upsert_twice_keeps_one_entry_with_latest_values() {
        let mut store = two_profile_store();

        let mut first = Profile::new("Webtoon");
        first.split_value = 1000;
        let mut second = Profile::new("Webtoon");
        second.split_value = 2000;

        store.upsert(first).unwrap();
        store.upsert(second).unwrap();

        let names = store.list();
        assert_eq!(names.iter().filter(|n| *n == "Webtoon").count(), 1);
        assert_eq!(store.get("Webtoon").unwrap().split_value, 2000);
    }

    #[test]
    fn test_delete_current_moves_to_first_remaining() {
        let mut store = two_profile_store();
        let events = recorder(&mut store);

        store.delete("To Edit").unwrap();

        assert_eq!(store.current_name(), "Ready");
        assert_eq!(store.list(), ["Ready"]);
        assert_eq!(
            events.borrow().as_slice(),
            [ProfileEvent::Deleted {
                name: "To Edit".to_string(),
                current: "Ready".to_string(),
            }]
        );
    }

    #[test]
    fn test_delete_other_keeps_current() {
        let mut store = ProfileStore::with_defaults();
        store.set_current("Manga Ready").unwrap();
        store.delete("Ready").unwrap();
        assert_eq!(store.current_name(), "Manga Ready");
    }

    #[test]
    fn test_delete_last_profile_is_refused() {
        let mut store = two_profile_store();
        store.delete("To Edit").unwrap();

        let err = store.delete("Ready").unwrap_err();
        assert!(matches!(err, StitchtoonError::LastProfile(name) if name == "Ready"));
        assert_eq!(store.list(), ["Ready"]);
        assert_eq!(store.current_name(), "Ready");
    }

    #[test]
    fn test_delete_missing_fails() {
        let mut store = two_profile_store();
        assert!(matches!(
            store.delete("Missing"),
            Err(StitchtoonError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_set_current_notifies_only_on_change() {
        let mut store = two_profile_store();
        let events = recorder(&mut store);

        store.set_current("To Edit").unwrap();
        store.set_current("Ready").unwrap();
        assert!(store.set_current("Missing").is_err());

        assert_eq!(
            events.borrow().as_slice(),
            [ProfileEvent::CurrentChanged("Ready".to_string())]
        );
        assert_eq!(store.current().name, "Ready");
    }

    #[test]
    fn test_observers_run_in_registration_order_and_see_new_state() {
        let mut store = two_profile_store();
        let calls = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let calls = Rc::clone(&calls);
            store.subscribe(move |_, store| {
                calls.borrow_mut().push(format!("{tag}:{}", store.len()));
            });
        }

        store.add(Profile::new("Webtoon")).unwrap();
        assert_eq!(calls.borrow().as_slice(), ["first:3", "second:3"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = two_profile_store();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let id = store.subscribe(move |_, _| *sink.borrow_mut() += 1);

        store.add(Profile::new("A")).unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add(Profile::new("B")).unwrap();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_replace_all() {
        let mut store = two_profile_store();
        store.add(Profile::new("Custom")).unwrap();
        let events = recorder(&mut store);

        store.replace_all(default_profiles(), None).unwrap();

        assert_eq!(store.len(), 4);
        assert!(!store.contains("Custom"));
        assert_eq!(store.current_name(), "To Edit");
        assert_eq!(events.borrow().as_slice(), [ProfileEvent::Reset]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(String),
            Update(String),
            Upsert(String),
            Delete(String),
            Select(String),
        }

        fn name() -> impl Strategy<Value = String> {
            prop_oneof![
                Just(String::new()),
                Just(" ".to_string()),
                Just("To Edit".to_string()),
                Just("Ready".to_string()),
                "[A-C]{1,2}",
            ]
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                name().prop_map(Op::Add),
                name().prop_map(Op::Update),
                name().prop_map(Op::Upsert),
                name().prop_map(Op::Delete),
                name().prop_map(Op::Select),
            ]
        }

        proptest! {
            /// Property: any operation sequence keeps names unique, non-empty and the
            /// current profile resolvable
            #[test]
            fn invariants_hold_for_any_sequence(ops in prop::collection::vec(op(), 0..40)) {
                let mut store = ProfileStore::new(default_profiles()[..2].to_vec(), None).unwrap();

                for op in ops {
                    let _ = match op {
                        Op::Add(name) => store.add(Profile::new(name)),
                        Op::Update(name) => store.update(Profile::new(name)),
                        Op::Upsert(name) => store.upsert(Profile::new(name)),
                        Op::Delete(name) => store.delete(&name),
                        Op::Select(name) => store.set_current(&name),
                    };

                    let names = store.list();
                    prop_assert!(!names.is_empty());
                    prop_assert!(names.iter().all(|n| !n.trim().is_empty()));
                    let mut deduped = names.clone();
                    deduped.sort();
                    deduped.dedup();
                    prop_assert_eq!(deduped.len(), names.len());
                    prop_assert!(store.contains(store.current_name()));
                }
            }
        }
    }
}
