//! Profile management
//!
//! Holds the ordered, name-keyed profile collection that drives the profile
//! list and combo box, together with its change notifications.

pub mod store;

pub use store::{ObserverId, ProfileEvent, ProfileStore};
