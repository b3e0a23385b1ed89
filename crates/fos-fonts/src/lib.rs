//! fOS Fonts - Font Requirement Resolution
//!
//! Turns the fonts a document needs into embeddable font bytes for the
//! print pipeline:
//! - Classification of families (web-safe, remotely hosted, custom)
//! - Remote fetching with retry, backoff and per-attempt deadlines
//! - WOFF/WOFF2 validation and decompression to canonical SFNT
//! - A quota-bounded store for user-uploaded fonts
//! - An orchestrator that tolerates per-font failure

pub mod classify;
pub mod config;
pub mod library;
pub mod orchestrator;
pub mod remote;
pub mod retry;
pub mod store;
pub mod types;
pub mod validate;

pub use config::FontsConfig;
pub use library::FontLibrary;
pub use orchestrator::FontFetchOrchestrator;
pub use remote::{CacheStats, FontTransport, HttpTransport, RemoteFontRepository};
pub use retry::RetryPolicy;
pub use store::{CustomFontStore, DirectoryBackend, FontBackend, MemoryBackend, StoreStats};
pub use types::{
    CustomFont, FontData, FontFormat, FontKey, FontRequirement, FontSource, FontStyle, FontWeight,
    UploadMetadata,
};
pub use validate::{FileKind, FontMetadata, FontValidator, ValidatedFont};

use std::fmt;

/// Font subsystem error
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error(
        "Timed out fetching font \"{family}\" after {attempts} attempts. Check your connection or switch to a web-safe font."
    )]
    NetworkTimeout { family: String, attempts: u32 },

    #[error(
        "Network error fetching font \"{family}\": {message}. Check your connection or switch to a web-safe font."
    )]
    Network { family: String, message: String },

    #[error(
        "Font \"{family}\" is not available in weight {weight} {style}. Pick another weight or switch to a web-safe font."
    )]
    FontNotFound {
        family: String,
        weight: FontWeight,
        style: FontStyle,
    },

    #[error("Invalid font file: {0}")]
    InvalidFormat(String),

    #[error("Font validation failed: {0}")]
    ValidationFailed(String),

    #[error("Custom font storage is full: {0}. Remove unused custom fonts to free space.")]
    StorageQuotaExceeded(String),

    #[error("Font storage error: {0}")]
    Storage(String),

    #[error("Malformed font requirement: {0}")]
    MalformedRequirement(String),
}

impl FontError {
    /// Error code in the subsystem taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            FontError::NetworkTimeout { .. } => ErrorKind::NetworkTimeout,
            FontError::Network { .. } => ErrorKind::NetworkError,
            FontError::FontNotFound { .. } => ErrorKind::FontNotFound,
            FontError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            FontError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            FontError::StorageQuotaExceeded(_) => ErrorKind::StorageQuotaExceeded,
            FontError::Storage(_) => ErrorKind::StorageError,
            FontError::MalformedRequirement(_) => ErrorKind::MalformedRequirement,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FontError::NetworkTimeout { .. } | FontError::Network { .. }
        )
    }
}

impl From<std::io::Error> for FontError {
    fn from(err: std::io::Error) -> Self {
        FontError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for FontError {
    fn from(err: serde_json::Error) -> Self {
        FontError::Storage(err.to_string())
    }
}

/// Error codes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkTimeout,
    NetworkError,
    FontNotFound,
    InvalidFormat,
    ValidationFailed,
    StorageQuotaExceeded,
    StorageError,
    MalformedRequirement,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::FontNotFound => "FONT_NOT_FOUND",
            ErrorKind::InvalidFormat => "INVALID_FORMAT",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::StorageQuotaExceeded => "STORAGE_QUOTA_EXCEEDED",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::MalformedRequirement => "MALFORMED_REQUIREMENT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, FontError>;
