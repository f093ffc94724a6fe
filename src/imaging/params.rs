//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between configuration (which decides which variants exist) and
//! the [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100). Clamped on construction.
//! - [`ResizeMode`]: `Cover` (crop to aspect + scale), `Contain` (fit inside) or `None`.
//! - [`Gravity`]: Crop anchor for `Cover`.
//! - [`OutputFormat`]: Encoded output type, parsed from a media type.
//! - [`VariantSpec`]: Everything needed to produce one named variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as passed to encoders that reject zero.
    pub fn encoder_value(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// How a variant's geometry relates to its target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale to fully cover the box, then crop to exactly `width × height`.
    Cover,
    /// Scale to fit entirely within the box, preserving aspect ratio.
    Contain,
    /// Keep the source geometry; only re-encode.
    #[default]
    None,
}

/// Anchor used when cropping the overflow of a `Cover` resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gravity {
    #[serde(alias = "north-west")]
    NorthWest,
    North,
    #[serde(alias = "north-east")]
    NorthEast,
    West,
    #[default]
    Center,
    East,
    #[serde(alias = "south-west")]
    SouthWest,
    South,
    #[serde(alias = "south-east")]
    SouthEast,
}

/// Encoded output format of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
}

/// Media type ↔ format ↔ extension. The first media type per format is canonical.
const FORMATS: &[(&str, OutputFormat, &str)] = &[
    ("image/jpeg", OutputFormat::Jpeg, "jpeg"),
    ("image/jpg", OutputFormat::Jpeg, "jpeg"),
    ("image/pjpeg", OutputFormat::Jpeg, "jpeg"),
    ("image/png", OutputFormat::Png, "png"),
    ("image/webp", OutputFormat::WebP, "webp"),
    ("image/avif", OutputFormat::Avif, "avif"),
    ("image/tiff", OutputFormat::Tiff, "tiff"),
];

impl OutputFormat {
    /// Parse a media type such as `image/jpeg`. Parameters (`; q=…`) and
    /// letter case are ignored.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|(mt, _, _)| *mt == essence)
            .map(|(_, fmt, _)| *fmt)
    }

    pub fn media_type(self) -> &'static str {
        FORMATS
            .iter()
            .find(|(_, fmt, _)| *fmt == self)
            .map(|(mt, _, _)| *mt)
            .unwrap_or("application/octet-stream")
    }

    /// File extension for keys, e.g. `jpeg` for `image/jpeg`.
    pub fn extension(self) -> &'static str {
        FORMATS
            .iter()
            .find(|(_, fmt, _)| *fmt == self)
            .map(|(_, _, ext)| *ext)
            .unwrap_or("bin")
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Full specification of one output variant.
///
/// Built once when an [`UploadConfig`](crate::config::UploadConfig) is
/// validated, then shared read-only by every transform of every upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSpec {
    pub name: String,
    pub resize: ResizeMode,
    pub width: u32,
    pub height: u32,
    /// Only consulted for [`ResizeMode::Cover`].
    pub gravity: Gravity,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Drop embedded profiles (ICC) from the output.
    pub strip: bool,
    /// Allow [`ResizeMode::Contain`] to upscale small sources.
    pub enlarge: bool,
}

impl VariantSpec {
    /// A variant with the stock defaults: no resize, 1024×1024 box, JPEG q75,
    /// metadata stripped.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resize: ResizeMode::None,
            width: 1024,
            height: 1024,
            gravity: Gravity::default(),
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
            strip: true,
            enlarge: false,
        }
    }

    /// Fill-and-crop variant of exactly `width × height`.
    pub fn cover(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            resize: ResizeMode::Cover,
            width,
            height,
            ..Self::new(name)
        }
    }

    /// Fit-inside variant bounded by `width × height`.
    pub fn contain(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            resize: ResizeMode::Contain,
            width,
            height,
            ..Self::new(name)
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Quality::new(quality);
        self
    }

    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn keep_metadata(mut self) -> Self {
        self.strip = false;
        self
    }

    pub fn allow_enlarge(mut self) -> Self {
        self.enlarge = true;
        self
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}
