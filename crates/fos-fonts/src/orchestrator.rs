//! Font Fetch Orchestrator
//!
//! Turns a document's requirements into font bytes. Web-safe fonts need
//! nothing; remote fonts go through the repository; custom fonts come from
//! the store. A font that cannot be resolved is logged and left out so the
//! document can still be generated with fallbacks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::Result;
use crate::remote::RemoteFontRepository;
use crate::store::CustomFontStore;
use crate::types::{CustomFont, FontData, FontRequirement, FontSource};

/// Sequential resolver over the repository and the store
pub struct FontFetchOrchestrator {
    repository: Arc<RemoteFontRepository>,
    store: Arc<CustomFontStore>,
}

impl FontFetchOrchestrator {
    pub fn new(repository: Arc<RemoteFontRepository>, store: Arc<CustomFontStore>) -> Self {
        Self { repository, store }
    }

    pub async fn resolve(&self, requirements: &[FontRequirement]) -> Result<Vec<FontData>> {
        self.resolve_with_progress(requirements, |_, _, _| {}).await
    }

    /// Resolve requirements in input order.
    ///
    /// `on_progress(current, total, family)` fires once per remote or custom
    /// requirement, `current` counting from 1. Duplicate
    /// `(family, weight, style)` entries are resolved once and counted once.
    ///
    /// Only a malformed requirement is an error; every fetch or lookup
    /// failure just leaves that font out of the result.
    pub async fn resolve_with_progress<P>(
        &self,
        requirements: &[FontRequirement],
        mut on_progress: P,
    ) -> Result<Vec<FontData>>
    where
        P: FnMut(usize, usize, &str),
    {
        for requirement in requirements {
            requirement.validate()?;
        }

        let mut seen = HashSet::new();
        let unique: Vec<&FontRequirement> = requirements
            .iter()
            .filter(|r| seen.insert(r.key()))
            .collect();

        let total = unique
            .iter()
            .filter(|r| r.source != FontSource::WebSafe)
            .count();
        debug!(requested = requirements.len(), unique = unique.len(), total, "Resolving fonts");

        let mut fonts = Vec::with_capacity(total);
        let mut custom_fonts: Option<Vec<CustomFont>> = None;
        let mut current = 0;

        for requirement in unique {
            let family = requirement.family.as_str();
            match requirement.source {
                FontSource::WebSafe => continue,
                FontSource::Remote => {
                    current += 1;
                    on_progress(current, total, family);

                    match self
                        .repository
                        .fetch(family, requirement.weight, requirement.style)
                        .await
                    {
                        Ok(font) => fonts.push(font),
                        Err(err) => warn!(
                            family,
                            weight = %requirement.weight,
                            style = %requirement.style,
                            code = %err.kind(),
                            "Skipping remote font: {}",
                            err
                        ),
                    }
                }
                FontSource::Custom => {
                    current += 1;
                    on_progress(current, total, family);

                    // One store snapshot per pass
                    if custom_fonts.is_none() {
                        custom_fonts = Some(self.store.get_all().await);
                    }
                    let found = custom_fonts.iter().flatten().find(|font| {
                        font.matches(family, requirement.weight, requirement.style)
                    });

                    match found {
                        Some(font) => fonts.push(font.to_font_data()),
                        None => warn!(
                            weight = %requirement.weight,
                            style = %requirement.style,
                            "Custom font not found: {}",
                            family
                        ),
                    }
                }
            }
        }

        info!(resolved = fonts.len(), total, "Font resolution finished");
        Ok(fonts)
    }
}
