//! Font requirement and resolved font types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FontError, Result};

/// Font weight (100-900)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: FontWeight = FontWeight(100);
    pub const EXTRA_LIGHT: FontWeight = FontWeight(200);
    pub const LIGHT: FontWeight = FontWeight(300);
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const MEDIUM: FontWeight = FontWeight(500);
    pub const SEMI_BOLD: FontWeight = FontWeight(600);
    pub const BOLD: FontWeight = FontWeight(700);
    pub const EXTRA_BOLD: FontWeight = FontWeight(800);
    pub const BLACK: FontWeight = FontWeight(900);

    /// Whether this is one of the nine standard weights
    pub fn is_standard(self) -> bool {
        (100..=900).contains(&self.0) && self.0 % 100 == 0
    }

    /// Snap an arbitrary weight class to the nearest standard weight
    pub fn nearest(value: u16) -> Self {
        let clamped = value.clamp(100, 900);
        FontWeight(((clamped + 50) / 100 * 100).min(900))
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::NORMAL
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Font style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
        }
    }

    /// Parse a CSS `font-style` value; oblique is treated as italic
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(FontStyle::Normal),
            "italic" => Some(FontStyle::Italic),
            v if v.starts_with("oblique") => Some(FontStyle::Italic),
            _ => None,
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a required font comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontSource {
    /// Built into the renderer, nothing to fetch
    #[serde(rename = "websafe")]
    WebSafe,
    /// Hosted by the remote font service
    #[serde(rename = "remote", alias = "google")]
    Remote,
    /// Uploaded by the user
    #[serde(rename = "custom")]
    Custom,
}

impl fmt::Display for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontSource::WebSafe => "websafe",
            FontSource::Remote => "remote",
            FontSource::Custom => "custom",
        })
    }
}

/// Embedded font format handed to the document generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    #[default]
    Ttf,
    Otf,
}

impl FontFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::Ttf => "ttf",
            FontFormat::Otf => "otf",
        }
    }
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Natural key of a font: family (case-folded), weight and style
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl FontKey {
    pub fn new(family: &str, weight: FontWeight, style: FontStyle) -> Self {
        Self {
            family: family.trim().to_lowercase(),
            weight,
            style,
        }
    }
}

/// One font usage detected in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRequirement {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub source: FontSource,
}

impl FontRequirement {
    pub fn new(family: impl Into<String>, weight: u16, style: FontStyle, source: FontSource) -> Self {
        Self {
            family: family.into(),
            weight: FontWeight(weight),
            style,
            source,
        }
    }

    pub fn key(&self) -> FontKey {
        FontKey::new(&self.family, self.weight, self.style)
    }

    /// Reject requirements no analyzer should ever produce
    pub fn validate(&self) -> Result<()> {
        if self.family.trim().is_empty() {
            return Err(FontError::MalformedRequirement(
                "font family is empty".to_string(),
            ));
        }
        if !self.weight.is_standard() {
            return Err(FontError::MalformedRequirement(format!(
                "weight {} for \"{}\" is not one of 100, 200, ..., 900",
                self.weight, self.family
            )));
        }
        Ok(())
    }
}

/// Resolved, renderer-ready font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontData {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub format: FontFormat,
    /// Decompressed SFNT bytes
    pub bytes: Vec<u8>,
}

/// User-uploaded font as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFont {
    pub id: String,
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub format: FontFormat,
    /// Decompressed SFNT bytes, kept out of the metadata index
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
    pub file_size: u64,
}

impl CustomFont {
    pub fn key(&self) -> FontKey {
        FontKey::new(&self.family, self.weight, self.style)
    }

    /// Whether this font satisfies `(family, weight, style)`, folding case
    /// the same way as [`FontKey`]
    pub fn matches(&self, family: &str, weight: FontWeight, style: FontStyle) -> bool {
        self.key() == FontKey::new(family, weight, style)
    }

    pub fn to_font_data(&self) -> FontData {
        FontData {
            family: self.family.clone(),
            weight: self.weight,
            style: self.style,
            format: self.format,
            bytes: self.bytes.clone(),
        }
    }
}

/// Caller-supplied description of an uploaded font
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadMetadata {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl UploadMetadata {
    pub fn new(family: impl Into<String>, weight: u16, style: FontStyle) -> Self {
        Self {
            family: family.into(),
            weight: FontWeight(weight),
            style,
        }
    }
}
