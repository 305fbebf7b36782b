//! Per-archive thumbnail cache
//!
//! Bounded LRU keyed by file identity. Entries are explicitly invalidated
//! when a file's bytes are replaced, so stale previews never survive an
//! edit; switching directories unloads pixel data but keeps the decoded
//! info fields, since those are cheap and likely to be shown again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::filetype::Thumbnail;
use crate::session::ArchiveSession;
use crate::tree::{DirId, FileId};

/// Default maximum number of cached thumbnails per archive
const DEFAULT_MAX_ENTRIES: usize = 200;

/// How a file-initialization call should treat the thumbnail cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailMode {
    /// Do not touch thumbnails
    None,
    /// Load a thumbnail only if the cache has none for this entry
    LoadIfAbsent,
    /// Reload and replace whatever is cached
    ForceReload,
    /// Reload only entries that were previously loaded
    ReloadIfPreviouslyLoaded,
}

/// A cached preview; `image` is dropped when the entry is unloaded
#[derive(Debug, Clone)]
pub struct CachedThumbnail {
    /// Decoded pixels, absent while unloaded
    pub image: Option<Thumbnail>,
    /// Display fields from the last decode
    pub info: Vec<(String, String)>,
}

/// Cache statistics for debugging
#[derive(Debug, Default, Clone)]
pub struct ThumbnailCacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

/// Thumbnail cache with LRU eviction
pub struct ThumbnailCache {
    entries: HashMap<FileId, CachedThumbnail>,
    /// Access order for LRU eviction (most recent at end)
    access_order: Vec<FileId>,
    max_entries: usize,
    stats: ThumbnailCacheStats,
}

impl ThumbnailCache {
    /// Create a cache with default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a custom capacity
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: Vec::new(),
            max_entries: max_entries.max(1),
            stats: ThumbnailCacheStats::default(),
        }
    }

    /// Whether an entry (loaded or unloaded) exists for this file
    #[must_use]
    pub fn contains(&self, file: FileId) -> bool {
        self.entries.contains_key(&file)
    }

    /// Get a cached entry, updating the access order
    pub fn get(&mut self, file: FileId) -> Option<&CachedThumbnail> {
        if self.entries.contains_key(&file) {
            self.stats.hits += 1;
            self.access_order.retain(|id| *id != file);
            self.access_order.push(file);
            self.entries.get(&file)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, file: FileId, thumbnail: Thumbnail) {
        while self.entries.len() >= self.max_entries && !self.entries.contains_key(&file) {
            self.evict_oldest();
        }

        let info = thumbnail.info.clone();
        self.entries.insert(
            file,
            CachedThumbnail {
                image: Some(thumbnail),
                info,
            },
        );
        self.access_order.retain(|id| *id != file);
        self.access_order.push(file);
    }

    /// Remove an entry entirely (invalidation on edit)
    pub fn remove(&mut self, file: FileId) {
        self.entries.remove(&file);
        self.access_order.retain(|id| *id != file);
    }

    /// Drop pixel data for every entry but keep the info fields.
    /// Used when navigating away from a directory.
    pub fn unload_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.image = None;
        }
    }

    /// Remove everything (tree reload)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> &ThumbnailCacheStats {
        &self.stats
    }

    fn evict_oldest(&mut self) {
        if self.access_order.is_empty() {
            return;
        }
        let oldest = self.access_order.remove(0);
        if self.entries.remove(&oldest).is_some() {
            self.stats.evictions += 1;
        }
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize thumbnails for every file in a directory as a background task.
///
/// The task takes the session lock once per file, so mutations interleave
/// freely; the token is checked between files and the task stops cleanly
/// when the user navigates away. Returns the number of files processed.
pub fn spawn_directory_loader(
    session: Arc<ArchiveSession>,
    dir: DirId,
    token: CancellationToken,
) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let files = session.with_tree(|tree| tree.collect_files(dir, false)).await;

        let mut processed = 0;
        for file in files {
            if token.is_cancelled() {
                break;
            }
            match session.initialize_file(file, ThumbnailMode::LoadIfAbsent).await {
                // Stale ids just mean the entry was deleted mid-scan.
                Ok(()) | Err(crate::error::Error::StaleId) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "thumbnail initialization failed");
                }
            }
            processed += 1;
        }
        processed
    })
}
