//! Configuration
//!
//! Loaded from a JSON file with environment overrides on top. Every field
//! has a default so a partial (or absent) file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub retry: RetrySettings,
    pub remote: RemoteSettings,
    pub store: StoreSettings,
    pub validator: ValidatorSettings,
}

/// Network retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Deadline for a single attempt
    pub timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            timeout_ms: 15_000,
        }
    }
}

/// Remote font service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Stylesheet endpoint of the font service
    pub stylesheet_url: String,
    pub user_agent: String,
    /// Maximum number of fonts kept in the in-process cache
    pub cache_max_entries: usize,
    /// Backstop timeout on the HTTP client itself
    pub http_timeout_ms: u64,
    /// Largest decoded font accepted from the service
    pub max_font_bytes: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            stylesheet_url: "https://fonts.googleapis.com/css2".to_string(),
            user_agent: format!("fOS-Fonts/{}", env!("CARGO_PKG_VERSION")),
            cache_max_entries: 50,
            http_timeout_ms: 30_000,
            max_font_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Custom font store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub directory: PathBuf,
    pub max_total_bytes: u64,
    pub max_fonts: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            directory: base.join("fos-fonts").join("custom"),
            max_total_bytes: 50 * 1024 * 1024,
            max_fonts: 100,
        }
    }
}

/// Upload validation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Soft ceiling checked before any bytes are parsed
    pub max_upload_bytes: u64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl FontsConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("Loaded font config from {}", path.display());
                Ok(serde_json::from_str(&text)?)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No font config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load the file named by `FOS_FONTS_CONFIG` (if any), then apply
    /// `FOS_FONTS_*` overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os("FOS_FONTS_CONFIG") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("FOS_FONTS_STORE_DIR") {
            self.store.directory = PathBuf::from(dir);
        }
        if let Some(url) = lookup("FOS_FONTS_STYLESHEET_URL") {
            self.remote.stylesheet_url = url;
        }
        if let Some(value) = lookup("FOS_FONTS_MAX_ATTEMPTS") {
            match value.parse() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!("Ignoring FOS_FONTS_MAX_ATTEMPTS={value}: not a number"),
            }
        }
        if let Some(value) = lookup("FOS_FONTS_TIMEOUT_MS") {
            match value.parse() {
                Ok(ms) => self.retry.timeout_ms = ms,
                Err(_) => warn!("Ignoring FOS_FONTS_TIMEOUT_MS={value}: not a number"),
            }
        }
    }
}
