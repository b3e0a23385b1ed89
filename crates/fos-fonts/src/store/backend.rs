//! Persistence backends for custom fonts

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;
use crate::types::CustomFont;

/// Durable storage for custom fonts
#[async_trait]
pub trait FontBackend: Send + Sync {
    /// Every stored font, bytes included
    async fn load_all(&self) -> Result<Vec<CustomFont>>;
    async fn insert(&self, font: &CustomFont) -> Result<()>;
    /// Returns whether a font with `id` existed
    async fn remove(&self, id: &str) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
}

/// Process-lifetime backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    fonts: Mutex<Vec<CustomFont>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FontBackend for MemoryBackend {
    async fn load_all(&self) -> Result<Vec<CustomFont>> {
        Ok(self.fonts.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn insert(&self, font: &CustomFont) -> Result<()> {
        self.fonts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(font.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut fonts = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
        let before = fonts.len();
        fonts.retain(|f| f.id != id);
        Ok(fonts.len() != before)
    }

    async fn clear(&self) -> Result<()> {
        self.fonts.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

/// Directory backend: `index.json` with metadata plus one `<id>.font` blob per font
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    dir: PathBuf,
}

const INDEX_FILE: &str = "index.json";

impl DirectoryBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.font"))
    }

    async fn read_index(&self) -> Result<Vec<CustomFont>> {
        match smol::fs::read(self.dir.join(INDEX_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_index(&self, records: &[CustomFont]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.dir.join(INDEX_FILE), &json).await
    }
}

/// Write to a sibling temp file, then rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    smol::fs::write(&tmp, bytes).await?;
    smol::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match smol::fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

#[async_trait]
impl FontBackend for DirectoryBackend {
    async fn load_all(&self) -> Result<Vec<CustomFont>> {
        let records = self.read_index().await?;
        let mut fonts = Vec::with_capacity(records.len());

        for mut font in records {
            match smol::fs::read(self.blob_path(&font.id)).await {
                Ok(bytes) => {
                    font.bytes = bytes;
                    fonts.push(font);
                }
                Err(err) => warn!(id = %font.id, family = %font.family, "Skipping custom font with unreadable data: {}", err),
            }
        }

        Ok(fonts)
    }

    async fn insert(&self, font: &CustomFont) -> Result<()> {
        smol::fs::create_dir_all(&self.dir).await?;
        write_atomic(&self.blob_path(&font.id), &font.bytes).await?;

        let mut records = self.read_index().await?;
        records.retain(|f| f.id != font.id);
        records.push(font.clone());
        self.write_index(&records).await?;

        debug!(id = %font.id, dir = %self.dir.display(), "Stored custom font");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.read_index().await?;
        let before = records.len();
        records.retain(|f| f.id != id);
        if records.len() == before {
            return Ok(false);
        }

        self.write_index(&records).await?;
        remove_if_present(&self.blob_path(id)).await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        for font in self.read_index().await? {
            remove_if_present(&self.blob_path(&font.id)).await?;
        }
        remove_if_present(&self.dir.join(INDEX_FILE)).await
    }
}
