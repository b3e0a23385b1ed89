//! Remote Font Repository
//!
//! Resolves `(family, weight, style)` against a hosted font service:
//! stylesheet first, then the font binary it points at. Both requests run
//! under the retry policy and successful results are cached in-process.

mod cache;
pub mod css;
mod transport;

pub use cache::{CacheStats, FontCache};
pub use transport::{FontTransport, HttpTransport, TransportError, TransportResponse};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use url::Url;

use crate::retry::RetryPolicy;
use crate::types::{FontData, FontFormat, FontKey, FontStyle, FontWeight};
use crate::validate::normalize_sfnt;
use crate::{FontError, Result};

const DEFAULT_MAX_FONT_BYTES: usize = 64 * 1024 * 1024;

/// Remote font source with an owned, bounded cache
pub struct RemoteFontRepository {
    transport: Arc<dyn FontTransport>,
    retry: RetryPolicy,
    stylesheet_url: String,
    max_font_bytes: usize,
    cache: Mutex<FontCache>,
}

/// Which of the two requests a response answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Stylesheet,
    Binary,
}

impl RemoteFontRepository {
    pub fn new(
        transport: Arc<dyn FontTransport>,
        retry: RetryPolicy,
        stylesheet_url: impl Into<String>,
        cache_max_entries: usize,
    ) -> Self {
        Self {
            transport,
            retry,
            stylesheet_url: stylesheet_url.into(),
            max_font_bytes: DEFAULT_MAX_FONT_BYTES,
            cache: Mutex::new(FontCache::new(cache_max_entries)),
        }
    }

    /// Cap on the decoded size of a downloaded font
    pub fn with_max_font_bytes(mut self, max_font_bytes: usize) -> Self {
        self.max_font_bytes = max_font_bytes;
        self
    }

    /// Resolve one font to decompressed SFNT bytes
    pub async fn fetch(&self, family: &str, weight: FontWeight, style: FontStyle) -> Result<FontData> {
        let key = FontKey::new(family, weight, style);
        if let Some(cached) = self.cache().get(&key) {
            debug!(family, %weight, %style, "Remote font served from cache");
            return Ok(FontData {
                family: family.to_string(),
                ..cached.clone()
            });
        }

        let css_url = self.stylesheet_request_url(family, weight, style)?;
        let css = self
            .retry
            .execute(family, || self.get(Request::Stylesheet, &css_url, family, weight, style))
            .await?;
        let css = String::from_utf8_lossy(&css);

        let faces = css::parse_font_faces(&css);
        let source = css::select_face(&faces, weight, style)
            .and_then(|face| face.best_source())
            .ok_or_else(|| not_found(family, weight, style))?;
        let font_url = resolve_url(&css_url, &source.url).map_err(|message| FontError::Network {
            family: family.to_string(),
            message,
        })?;
        debug!(family, url = %font_url, "Selected font face");

        let bytes = self
            .retry
            .execute(family, || self.get(Request::Binary, &font_url, family, weight, style))
            .await?;

        let max_font_bytes = self.max_font_bytes;
        let sfnt = smol::unblock(move || normalize_sfnt(&bytes, max_font_bytes))
            .await
            .map_err(|e| {
                FontError::ValidationFailed(format!(
                    "font \"{family}\" from the font service is unusable: {e}"
                ))
            })?;

        let font = FontData {
            family: family.to_string(),
            weight,
            style,
            format: FontFormat::Ttf,
            bytes: sfnt,
        };
        info!(family, %weight, %style, size = font.bytes.len(), "Fetched remote font");

        self.cache().put(key, font.clone());
        Ok(font)
    }

    /// One GET with the status mapped into the error taxonomy. Only the
    /// stylesheet request can say a face is not served; a failed binary
    /// download is a network error.
    async fn get(
        &self,
        request: Request,
        url: &str,
        family: &str,
        weight: FontWeight,
        style: FontStyle,
    ) -> Result<Vec<u8>> {
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| FontError::Network {
                family: family.to_string(),
                message: e.to_string(),
            })?;

        if response.is_success() {
            return Ok(response.body);
        }
        match (request, response.status) {
            // Timeouts and throttling are worth another try
            (_, 408 | 429) => Err(http_error(family, response.status)),
            (Request::Stylesheet, s) if (400..500).contains(&s) => Err(not_found(family, weight, style)),
            (_, s) => Err(http_error(family, s)),
        }
    }

    /// `<base>?family=Name:ital,wght@<0|1>,<weight>&display=swap`
    pub fn stylesheet_request_url(&self, family: &str, weight: FontWeight, style: FontStyle) -> Result<String> {
        let ital = match style {
            FontStyle::Normal => 0,
            FontStyle::Italic => 1,
        };
        let spec = format!("{}:ital,wght@{},{}", family.trim(), ital, weight);
        let url = Url::parse_with_params(&self.stylesheet_url, &[("family", spec.as_str()), ("display", "swap")])
            .map_err(|e| FontError::Network {
                family: family.to_string(),
                message: format!("invalid stylesheet url {}: {e}", self.stylesheet_url),
            })?;
        Ok(url.into())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn is_cached(&self, family: &str, weight: FontWeight, style: FontStyle) -> bool {
        self.cache().contains(&FontKey::new(family, weight, style))
    }

    /// Drop every cached font, e.g. between independent sessions
    pub fn clear_cache(&self) {
        self.cache().clear();
        debug!("Remote font cache cleared");
    }

    fn cache(&self) -> MutexGuard<'_, FontCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn resolve_url(base: &str, href: &str) -> std::result::Result<String, String> {
    let base = Url::parse(base).map_err(|e| e.to_string())?;
    base.join(href)
        .map(String::from)
        .map_err(|e| format!("invalid font url {href}: {e}"))
}

fn not_found(family: &str, weight: FontWeight, style: FontStyle) -> FontError {
    FontError::FontNotFound {
        family: family.to_string(),
        weight,
        style,
    }
}

fn http_error(family: &str, status: u16) -> FontError {
    FontError::Network {
        family: family.to_string(),
        message: format!("HTTP {status}"),
    }
}
