//! Configuration data models
//!
//! This module defines the profile record and the option enums it is built from.
//! Field and value spellings match the settings written by earlier releases, so
//! existing `settings.json` files keep loading.

use serde::{Deserialize, Serialize};

/// Output image formats understood by the stitcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputFormat {
    /// Photoshop document
    #[serde(rename = "PSD")]
    Psd,
    /// Portable Network Graphics
    #[serde(rename = "PNG")]
    Png,
    /// JPEG (lossy)
    #[serde(rename = "JPEG")]
    Jpeg,
    /// WebP (lossy)
    #[serde(rename = "WEBP")]
    Webp,
    /// Windows bitmap
    #[serde(rename = "BMP")]
    Bmp,
    /// Tagged Image File Format
    #[serde(rename = "TIFF")]
    Tiff,
    /// Truevision TGA
    #[serde(rename = "TGA")]
    Tga,
}

impl OutputFormat {
    /// All formats, in the order they are offered to the user
    pub const ALL: [Self; 7] = [
        Self::Psd,
        Self::Png,
        Self::Jpeg,
        Self::Webp,
        Self::Bmp,
        Self::Tiff,
        Self::Tga,
    ];

    /// Name as stored and displayed
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Psd => "PSD",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WEBP",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Tga => "TGA",
        }
    }

    /// Whether the format takes a lossy quality setting
    pub fn supports_lossy_quality(self) -> bool {
        matches!(self, Self::Jpeg | Self::Webp)
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("jpg") {
            return Ok(Self::Jpeg);
        }
        parse_choice(&value, &Self::ALL, |f| f.as_str(), "output format")
    }
}

/// How the output width is forced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum WidthEnforcement {
    /// Keep every image at its own width
    None,
    /// Scale everything to the narrowest image
    Auto,
    /// Scale everything to a fixed width
    Fixed,
    /// Copywrite mode (manga page layout)
    Copywrite,
}

impl WidthEnforcement {
    /// All modes, in the order they are offered to the user
    pub const ALL: [Self; 4] = [Self::None, Self::Auto, Self::Fixed, Self::Copywrite];

    /// Name as stored and displayed
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Auto => "Auto",
            Self::Fixed => "Fixed",
            Self::Copywrite => "Copywrite",
        }
    }
}

impl TryFrom<String> for WidthEnforcement {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        parse_choice(&value, &Self::ALL, |w| w.as_str(), "width enforcement")
    }
}

/// Slice boundary detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum DetectionType {
    /// Compare pixel rows to find a quiet line
    #[serde(rename = "pixel")]
    Pixel,
    /// Cut exactly at the requested height
    #[serde(rename = "none")]
    None,
}

impl DetectionType {
    /// All strategies
    pub const ALL: [Self; 2] = [Self::Pixel, Self::None];

    /// Name as stored
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::None => "none",
        }
    }
}

impl TryFrom<String> for DetectionType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        parse_choice(&value, &Self::ALL, |d| d.as_str(), "detection type")
    }
}

/// What the split value means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum SplitMethod {
    /// Split value is the target height of each output image in pixels
    #[serde(rename = "split height")]
    SplitHeight,
    /// Split value is the number of output images
    #[serde(rename = "images number")]
    ImagesNumber,
}

impl SplitMethod {
    /// All methods
    pub const ALL: [Self; 2] = [Self::SplitHeight, Self::ImagesNumber];

    /// Name as stored
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SplitHeight => "split height",
            Self::ImagesNumber => "images number",
        }
    }
}

impl TryFrom<String> for SplitMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        // Forms have produced both "split height" and "SPLIT_HEIGHT" over time
        let normalized = value.trim().replace('_', " ");
        parse_choice(&normalized, &Self::ALL, |m| m.as_str(), "split method")
    }
}

fn parse_choice<T: Copy>(
    value: &str,
    choices: &[T],
    name: impl Fn(T) -> &'static str,
    what: &str,
) -> std::result::Result<T, String> {
    let value = value.trim();
    choices
        .iter()
        .copied()
        .find(|choice| name(*choice).eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown {what}: {value:?}"))
}

/// A named, complete set of stitching and export options
///
/// Profiles are value snapshots. The form builds a fresh one on every save
/// instead of editing a stored profile in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    /// Unique profile name
    pub name: String,
    /// Export format
    pub output_format: OutputFormat,
    /// Width enforcement mode
    pub width_enforcement: WidthEnforcement,
    /// Width used by [`WidthEnforcement::Fixed`], `-1` when unset
    pub width_enforcement_fixed_value: i32,
    /// Slice detection strategy
    pub detection_type: DetectionType,
    /// Quality for lossy formats (1-100)
    pub lossy_quality: u8,
    /// Meaning of `split_value`
    pub split_method: SplitMethod,
    /// Split height in pixels or number of images
    pub split_value: u32,
    /// Detection sensitivity (0-100)
    pub sensitivity: u8,
    /// Rows skipped between detection scans
    pub line_steps: u32,
    /// Border pixels ignored by detection
    pub ignorable_pixels: u32,
    /// Process every sub-directory of the input
    pub batch_mode: bool,
    /// Pack the output into an archive
    pub export_archive: bool,
    /// Run the post-process command after stitching
    pub enable_post_process: bool,
    /// Post-process command
    pub post_process_script: String,
    /// Post-process arguments, may reference `$input` and `$output`
    pub post_process_args: String,
    /// Slice at the same heights as the source images
    pub match_source: bool,
    /// Write slicing metadata next to the output
    pub write_metadata: bool,
}

impl Profile {
    /// Create a profile with default option values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy of this profile under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Whether the quality slider applies to this profile
    pub fn supports_lossy_quality(&self) -> bool {
        self.output_format.supports_lossy_quality()
    }

    /// Whether `width_enforcement_fixed_value` is used
    pub fn uses_fixed_width(&self) -> bool {
        self.width_enforcement == WidthEnforcement::Fixed
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            output_format: OutputFormat::Psd,
            width_enforcement: WidthEnforcement::Auto,
            width_enforcement_fixed_value: -1,
            detection_type: DetectionType::Pixel,
            lossy_quality: 90,
            split_method: SplitMethod::SplitHeight,
            split_value: 50_000,
            sensitivity: 80,
            line_steps: 30,
            ignorable_pixels: 20,
            batch_mode: false,
            export_archive: false,
            enable_post_process: false,
            post_process_script: String::new(),
            post_process_args: String::new(),
            match_source: false,
            write_metadata: false,
        }
    }
}

/// Profiles written on first run and on "reset to defaults", in list order
pub fn default_profiles() -> Vec<Profile> {
    vec![
        Profile::new("To Edit"),
        Profile {
            name: "Ready".to_string(),
            output_format: OutputFormat::Jpeg,
            width_enforcement: WidthEnforcement::Fixed,
            width_enforcement_fixed_value: 760,
            lossy_quality: 86,
            split_value: 4608,
            sensitivity: 100,
            line_steps: 5,
            export_archive: true,
            ..Profile::default()
        },
        Profile {
            name: "Manga To Edit".to_string(),
            width_enforcement: WidthEnforcement::None,
            ..Profile::default()
        },
        Profile {
            name: "Manga Ready".to_string(),
            output_format: OutputFormat::Jpeg,
            width_enforcement: WidthEnforcement::Copywrite,
            lossy_quality: 86,
            split_method: SplitMethod::ImagesNumber,
            split_value: 0,
            sensitivity: 100,
            line_steps: 5,
            export_archive: true,
            ..Profile::default()
        },
    ]
}
