//! Font library: the entry points used by the application shell
//!
//! Owns one repository (and so one cache), one store and the validator,
//! and wires the orchestrator over them.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::config::FontsConfig;
use crate::orchestrator::FontFetchOrchestrator;
use crate::remote::{CacheStats, FontTransport, HttpTransport, RemoteFontRepository};
use crate::retry::RetryPolicy;
use crate::store::{CustomFontStore, DirectoryBackend, FontBackend, StoreStats};
use crate::types::{CustomFont, FontData, FontRequirement, FontStyle, FontWeight, UploadMetadata};
use crate::validate::{FontValidator, ValidatedFont};
use crate::Result;

/// Composition root for font resolution and custom font management
pub struct FontLibrary {
    repository: Arc<RemoteFontRepository>,
    store: Arc<CustomFontStore>,
    validator: FontValidator,
    orchestrator: FontFetchOrchestrator,
}

impl FontLibrary {
    /// Library backed by HTTP and the configured store directory
    pub fn new(config: &FontsConfig) -> Self {
        let transport = HttpTransport::new(
            config.remote.user_agent.clone(),
            Duration::from_millis(config.remote.http_timeout_ms),
        );
        let backend = DirectoryBackend::new(config.store.directory.clone());
        Self::with_parts(config, Arc::new(transport), Box::new(backend))
    }

    /// Library over caller-supplied transport and storage
    pub fn with_parts(
        config: &FontsConfig,
        transport: Arc<dyn FontTransport>,
        backend: Box<dyn FontBackend>,
    ) -> Self {
        let repository = Arc::new(RemoteFontRepository::new(
            transport,
            RetryPolicy::from(&config.retry),
            config.remote.stylesheet_url.clone(),
            config.remote.cache_max_entries,
        )
        .with_max_font_bytes(config.remote.max_font_bytes));
        let store = Arc::new(CustomFontStore::with_settings(backend, &config.store));
        let orchestrator = FontFetchOrchestrator::new(repository.clone(), store.clone());

        Self {
            repository,
            store,
            validator: FontValidator::new(config.validator.max_upload_bytes),
            orchestrator,
        }
    }

    /// Validate and store an uploaded font.
    ///
    /// Fails with `INVALID_FORMAT` from the quick check (before any bytes
    /// are parsed), `VALIDATION_FAILED` from the full check, or
    /// `STORAGE_QUOTA_EXCEEDED` from the store.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>, metadata: UploadMetadata) -> Result<CustomFont> {
        let validated = self.validate_upload(file_name, bytes, &metadata).await?;
        self.save_validated(file_name, validated).await
    }

    /// Both validation phases without storing, so callers can look at the
    /// font's own naming (e.g. for a duplicate check) first
    pub async fn validate_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
    ) -> Result<ValidatedFont> {
        let kind = self.validator.quick_check(file_name, bytes.len() as u64)?;
        self.validator.validate(kind, bytes, metadata).await
    }

    /// Store a font that already passed [`FontLibrary::validate_upload`]
    pub async fn save_validated(&self, file_name: &str, validated: ValidatedFont) -> Result<CustomFont> {
        let font = CustomFont {
            id: Uuid::new_v4().to_string(),
            family: validated.metadata.family,
            weight: validated.metadata.weight,
            style: validated.metadata.style,
            format: validated.metadata.format,
            file_size: validated.metadata.file_size,
            bytes: validated.sfnt,
            uploaded_at: chrono::Utc::now(),
        };
        info!(file_name, id = %font.id, family = %font.family, "Uploaded custom font");

        self.store.save(font).await
    }

    pub async fn list_custom(&self) -> Vec<CustomFont> {
        self.store.get_all().await
    }

    pub async fn get_custom(&self, id: &str) -> Option<CustomFont> {
        self.store.get_by_id(id).await
    }

    pub async fn remove_custom(&self, id: &str) -> Result<bool> {
        self.store.delete(id).await
    }

    pub async fn clear_all_custom(&self) -> Result<()> {
        self.store.delete_all().await
    }

    pub async fn custom_stats(&self) -> StoreStats {
        self.store.stats().await
    }

    pub async fn is_duplicate(&self, family: &str, weight: u16, style: FontStyle) -> bool {
        self.store.is_duplicate(family, FontWeight(weight), style).await
    }

    /// Warm-up listing at application start; never fails
    pub async fn load_custom_on_startup(&self) -> Vec<CustomFont> {
        let fonts = self.store.get_all().await;
        info!(count = fonts.len(), "Loaded custom fonts");
        fonts
    }

    pub async fn resolve(&self, requirements: &[FontRequirement]) -> Result<Vec<FontData>> {
        self.orchestrator.resolve(requirements).await
    }

    pub async fn resolve_with_progress<P>(&self, requirements: &[FontRequirement], on_progress: P) -> Result<Vec<FontData>>
    where
        P: FnMut(usize, usize, &str),
    {
        self.orchestrator
            .resolve_with_progress(requirements, on_progress)
            .await
    }

    /// Forget cached remote fonts before an unrelated session
    pub fn clear_session_cache(&self) {
        self.repository.clear_cache();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.repository.cache_stats()
    }

    pub fn validator(&self) -> &FontValidator {
        &self.validator
    }
}

impl std::fmt::Debug for FontLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontLibrary")
            .field("cache", &self.repository.cache_stats())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
