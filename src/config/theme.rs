//! Bundled color themes
//!
//! Only the identity of a theme lives here. Rendering the stylesheet belongs
//! to whatever toolkit hosts the window.

use crate::error::{Result, StitchtoonError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the bundled material themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Theme {
    /// Dark background, cyan accent
    DarkCyan,
    /// Dark background, pink accent
    DarkPink,
    /// Dark background, teal accent
    #[default]
    DarkTeal,
    /// Dark background, yellow accent
    DarkYellow,
    /// Light background, amber accent
    LightAmber,
    /// Light background, cyan accent
    LightCyan,
    /// Light background, pink accent
    LightPink,
    /// Light background, teal accent
    LightTeal,
}

impl Theme {
    /// All themes, in menu order
    pub const ALL: [Self; 8] = [
        Self::DarkCyan,
        Self::DarkPink,
        Self::DarkTeal,
        Self::DarkYellow,
        Self::LightAmber,
        Self::LightCyan,
        Self::LightPink,
        Self::LightTeal,
    ];

    /// Menu label, e.g. "Dark Teal"
    pub fn display_name(self) -> &'static str {
        match self {
            Self::DarkCyan => "Dark Cyan",
            Self::DarkPink => "Dark Pink",
            Self::DarkTeal => "Dark Teal",
            Self::DarkYellow => "Dark Yellow",
            Self::LightAmber => "Light Amber",
            Self::LightCyan => "Light Cyan",
            Self::LightPink => "Light Pink",
            Self::LightTeal => "Light Teal",
        }
    }

    /// Persisted key, e.g. "`dark_teal`"
    pub fn key(self) -> String {
        self.display_name().to_lowercase().replace(' ', "_")
    }

    /// Stylesheet file name, e.g. "`dark_teal.xml`"
    pub fn stylesheet(self) -> String {
        format!("{}.xml", self.key())
    }

    /// Light themes invert the secondary palette
    pub fn is_light(self) -> bool {
        matches!(
            self,
            Self::LightAmber | Self::LightCyan | Self::LightPink | Self::LightTeal
        )
    }

    /// Parse a menu label or a persisted key
    pub fn parse(value: &str) -> Result<Self> {
        let wanted = value.trim().to_lowercase().replace(' ', "_");
        Self::ALL
            .into_iter()
            .find(|theme| theme.key() == wanted)
            .ok_or_else(|| StitchtoonError::UnknownTheme(value.to_string()))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl TryFrom<String> for Theme {
    type Error = StitchtoonError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Theme> for String {
    fn from(theme: Theme) -> Self {
        theme.key()
    }
}
