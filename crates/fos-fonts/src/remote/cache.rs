//! Remote font cache
//!
//! Bounded by entry count; evicts the least recently used font.

use std::collections::HashMap;

use crate::types::{FontData, FontKey};

/// Cached font entry
#[derive(Debug, Clone)]
struct CacheEntry {
    font: FontData,
    /// Tick of the last get/put
    last_accessed: u64,
}

/// In-process cache of resolved remote fonts
#[derive(Debug)]
pub struct FontCache {
    entries: HashMap<FontKey, CacheEntry>,
    max_entries: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl FontCache {
    /// Create a cache; `max_entries == 0` disables caching
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Get a cached font, marking it recently used
    pub fn get(&mut self, key: &FontKey) -> Option<&FontData> {
        self.tick += 1;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = self.tick;
                self.hits += 1;
                Some(&entry.font)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Check if a key is cached (without updating access time)
    pub fn contains(&self, key: &FontKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a font, evicting the least recently used entry when full
    pub fn put(&mut self, key: FontKey, font: FontData) {
        if self.max_entries == 0 {
            return;
        }
        self.tick += 1;

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_entries {
                if !self.evict_one() {
                    break;
                }
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                font,
                last_accessed: self.tick,
            },
        );
    }

    fn evict_one(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_accessed)
            .map(|(k, _)| k.clone());

        match oldest {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Clear all entries and counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_entries,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
