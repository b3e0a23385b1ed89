//! Custom Font Store
//!
//! Quota-bounded persistence of validated user fonts. Listing is fail-soft:
//! a broken backend yields an empty collection and an error log so that
//! startup and orchestration never block on it.

mod backend;

pub use backend::{DirectoryBackend, FontBackend, MemoryBackend};

use serde::Serialize;
use tracing::{error, info};

use crate::config::StoreSettings;
use crate::types::{CustomFont, FontStyle, FontWeight};
use crate::{FontError, Result};

/// Store usage statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub max_fonts: usize,
    pub percent_used: f64,
}

/// Quota-bounded custom font store
pub struct CustomFontStore {
    backend: Box<dyn FontBackend>,
    max_total_bytes: u64,
    max_fonts: usize,
}

impl CustomFontStore {
    pub fn new(backend: Box<dyn FontBackend>, max_total_bytes: u64, max_fonts: usize) -> Self {
        Self {
            backend,
            max_total_bytes,
            max_fonts,
        }
    }

    pub fn with_settings(backend: Box<dyn FontBackend>, settings: &StoreSettings) -> Self {
        Self::new(backend, settings.max_total_bytes, settings.max_fonts)
    }

    /// Persist a font unless it would exceed the byte or count budget
    pub async fn save(&self, font: CustomFont) -> Result<CustomFont> {
        let existing = self.backend.load_all().await?;
        let used: u64 = existing.iter().map(|f| f.file_size).sum();

        if existing.len() >= self.max_fonts {
            return Err(FontError::StorageQuotaExceeded(format!(
                "the limit of {} custom fonts is reached",
                self.max_fonts
            )));
        }
        if used + font.file_size > self.max_total_bytes {
            return Err(FontError::StorageQuotaExceeded(format!(
                "\"{}\" needs {} KB but only {} KB of {} KB remain",
                font.family,
                font.file_size.div_ceil(1024),
                self.max_total_bytes.saturating_sub(used) / 1024,
                self.max_total_bytes / 1024
            )));
        }

        self.backend.insert(&font).await?;
        info!(
            id = %font.id,
            family = %font.family,
            weight = %font.weight,
            style = %font.style,
            size = font.file_size,
            "Saved custom font"
        );
        Ok(font)
    }

    /// Every stored font; empty on storage failure
    pub async fn get_all(&self) -> Vec<CustomFont> {
        match self.backend.load_all().await {
            Ok(fonts) => fonts,
            Err(err) => {
                error!("Failed to load custom fonts: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Option<CustomFont> {
        self.get_all().await.into_iter().find(|f| f.id == id)
    }

    /// Returns whether the font existed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.backend.remove(id).await?;
        if removed {
            info!(id, "Deleted custom font");
        }
        Ok(removed)
    }

    pub async fn delete_all(&self) -> Result<()> {
        self.backend.clear().await?;
        info!("Deleted all custom fonts");
        Ok(())
    }

    pub async fn stats(&self) -> StoreStats {
        let fonts = self.get_all().await;
        let total_bytes: u64 = fonts.iter().map(|f| f.file_size).sum();
        let percent_used = if self.max_total_bytes == 0 {
            0.0
        } else {
            total_bytes as f64 / self.max_total_bytes as f64 * 100.0
        };

        StoreStats {
            count: fonts.len(),
            total_bytes,
            max_bytes: self.max_total_bytes,
            max_fonts: self.max_fonts,
            percent_used,
        }
    }

    /// Stored font matching `(family, weight, style)`, family case-insensitive
    pub async fn find(&self, family: &str, weight: FontWeight, style: FontStyle) -> Option<CustomFont> {
        self.get_all()
            .await
            .into_iter()
            .find(|f| f.matches(family, weight, style))
    }

    pub async fn is_duplicate(&self, family: &str, weight: FontWeight, style: FontStyle) -> bool {
        self.find(family, weight, style).await.is_some()
    }
}
