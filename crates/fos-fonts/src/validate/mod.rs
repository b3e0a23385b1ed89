//! Binary font validation
//!
//! Uploads go through two phases. [`FontValidator::quick_check`] looks only
//! at the file name and size. [`FontValidator::validate`] sniffs the
//! container, decompresses WOFF/WOFF2 to SFNT and reads the embedded
//! naming metadata.

mod reader;
mod sfnt;
mod woff;
mod woff2;
mod woff2_glyf;

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::types::{FontFormat, FontStyle, FontWeight, UploadMetadata};
use crate::{FontError, Result};

use self::sfnt::{SFNT_CFF, SFNT_COLLECTION, SFNT_TRUE, SFNT_TRUETYPE, inspect};
use self::woff::{WOFF_SIGNATURE, decode_woff};
use self::woff2::{WOFF2_SIGNATURE, decode_woff2};

/// Font decoding error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
    #[error("invalid table directory")]
    InvalidTableDirectory,
    #[error("table {0} lies outside the file")]
    TableOutOfBounds(String),
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("invalid {0} transform")]
    InvalidTransform(&'static str),
    #[error("unsupported transform on table {0}")]
    UnsupportedTransform(String),
    #[error("required table {0} is missing")]
    MissingTable(&'static str),
    #[error(
        "unsupported outline format: PostScript/CFF outlines are not supported, convert the font to TrueType outlines"
    )]
    UnsupportedOutlines,
    #[error("font collections are not supported, upload a single font")]
    Collection,
    #[error("decoded font would exceed {0} bytes")]
    TooLarge(usize),
    #[error("not a font file (unrecognised signature)")]
    UnknownSignature,
    #[error("font tables could not be parsed: {0}")]
    Unparseable(String),
}

impl From<DecodeError> for FontError {
    fn from(err: DecodeError) -> Self {
        FontError::ValidationFailed(err.to_string())
    }
}

/// Container identified by its leading magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontContainer {
    TrueType,
    Cff,
    Woff,
    Woff2,
    Collection,
}

impl FontContainer {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let magic = u32::from_be_bytes(data.get(..4)?.try_into().ok()?);
        match magic {
            SFNT_TRUETYPE | SFNT_TRUE => Some(FontContainer::TrueType),
            SFNT_CFF => Some(FontContainer::Cff),
            WOFF_SIGNATURE => Some(FontContainer::Woff),
            WOFF2_SIGNATURE => Some(FontContainer::Woff2),
            SFNT_COLLECTION => Some(FontContainer::Collection),
            _ => None,
        }
    }
}

/// Decoded SFNT ceiling relative to the upload limit
pub const DECODED_SIZE_FACTOR: u64 = 8;

/// Unwrap any supported container to TrueType-outline SFNT bytes no
/// larger than `max_sfnt_bytes`
pub fn normalize_sfnt(data: &[u8], max_sfnt_bytes: usize) -> std::result::Result<Vec<u8>, DecodeError> {
    if data.len() > max_sfnt_bytes {
        return Err(DecodeError::TooLarge(max_sfnt_bytes));
    }
    let sfnt = match FontContainer::sniff(data) {
        Some(FontContainer::TrueType) => return Ok(data.to_vec()),
        Some(FontContainer::Cff) => return Err(DecodeError::UnsupportedOutlines),
        Some(FontContainer::Collection) => return Err(DecodeError::Collection),
        Some(FontContainer::Woff) => decode_woff(data, max_sfnt_bytes)?,
        Some(FontContainer::Woff2) => decode_woff2(data, max_sfnt_bytes)?,
        None => return Err(DecodeError::UnknownSignature),
    };

    // The wrapped flavor decides the outline format
    match FontContainer::sniff(&sfnt) {
        Some(FontContainer::TrueType) => Ok(sfnt),
        Some(FontContainer::Cff) => Err(DecodeError::UnsupportedOutlines),
        _ => Err(DecodeError::UnknownSignature),
    }
}

/// Upload file type, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Ttf,
    Otf,
    Woff,
    Woff2,
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "ttf" => Some(FileKind::Ttf),
            "otf" => Some(FileKind::Otf),
            "woff" => Some(FileKind::Woff),
            "woff2" => Some(FileKind::Woff2),
            _ => None,
        }
    }

    fn accepts(self, container: FontContainer) -> bool {
        match self {
            // .otf with TrueType outlines is fine; CFF is rejected later
            FileKind::Ttf | FileKind::Otf => {
                matches!(container, FontContainer::TrueType | FontContainer::Cff)
            }
            FileKind::Woff => container == FontContainer::Woff,
            FileKind::Woff2 => container == FontContainer::Woff2,
        }
    }

    fn format(self) -> FontFormat {
        match self {
            FileKind::Otf => FontFormat::Otf,
            _ => FontFormat::Ttf,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Ttf => "TTF",
            FileKind::Otf => "OTF",
            FileKind::Woff => "WOFF",
            FileKind::Woff2 => "WOFF2",
        })
    }
}

/// Descriptor of a validated font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontMetadata {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub format: FontFormat,
    /// Size of the decompressed SFNT
    pub file_size: u64,
}

/// Output of a successful full validation
#[derive(Debug, Clone)]
pub struct ValidatedFont {
    pub metadata: FontMetadata,
    pub sfnt: Vec<u8>,
}

/// Two-phase upload validator
#[derive(Debug, Clone)]
pub struct FontValidator {
    max_upload_bytes: u64,
}

impl FontValidator {
    pub fn new(max_upload_bytes: u64) -> Self {
        Self { max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Largest SFNT an accepted upload may decode to
    pub fn max_sfnt_bytes(&self) -> usize {
        usize::try_from(self.max_upload_bytes.saturating_mul(DECODED_SIZE_FACTOR)).unwrap_or(usize::MAX)
    }

    /// Cheap check on name and size, never reads the contents
    pub fn quick_check(&self, file_name: &str, size: u64) -> Result<FileKind> {
        let kind = FileKind::from_file_name(file_name).ok_or_else(|| {
            FontError::InvalidFormat(format!(
                "\"{file_name}\" is not a supported font file. Upload a TTF, OTF, WOFF or WOFF2 file."
            ))
        })?;

        if size == 0 {
            return Err(FontError::InvalidFormat(format!("\"{file_name}\" is empty.")));
        }
        if size > self.max_upload_bytes {
            return Err(FontError::InvalidFormat(format!(
                "\"{file_name}\" is {:.1} MB, the limit is {:.1} MB. Try WOFF2 for better compression.",
                megabytes(size),
                megabytes(self.max_upload_bytes)
            )));
        }

        Ok(kind)
    }

    /// Full check: container, decompression and embedded metadata
    pub async fn validate(
        &self,
        kind: FileKind,
        bytes: Vec<u8>,
        hint: &UploadMetadata,
    ) -> Result<ValidatedFont> {
        let container = FontContainer::sniff(&bytes).ok_or(DecodeError::UnknownSignature)?;
        if !kind.accepts(container) {
            return Err(FontError::ValidationFailed(format!(
                "file extension says {kind} but the contents are {container:?}"
            )));
        }

        let max_sfnt_bytes = self.max_sfnt_bytes();
        let (sfnt, names) = smol::unblock(move || {
            let sfnt = normalize_sfnt(&bytes, max_sfnt_bytes)?;
            let names = inspect(&sfnt)?;
            Ok::<_, DecodeError>((sfnt, names))
        })
        .await?;

        let family = names
            .family
            .or_else(|| Some(hint.family.trim().to_string()).filter(|f| !f.is_empty()))
            .ok_or_else(|| {
                FontError::ValidationFailed("font has no family name; provide one with the upload".to_string())
            })?;

        let metadata = FontMetadata {
            family,
            weight: names.weight.unwrap_or(hint.weight),
            style: names.style.unwrap_or(hint.style),
            format: kind.format(),
            file_size: sfnt.len() as u64,
        };
        debug!(
            family = %metadata.family,
            weight = %metadata.weight,
            style = %metadata.style,
            size = metadata.file_size,
            "Validated font"
        );

        Ok(ValidatedFont { metadata, sfnt })
    }
}

impl Default for FontValidator {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024)
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
