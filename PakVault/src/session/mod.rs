//! Archive session
//!
//! An `ArchiveSession` owns one open archive: the file handle, the decoded
//! tree and the codec context from the last load. Every load, mutation and
//! repack runs under a single exclusive, FIFO-queued async lock, so at most
//! one such operation is in flight per archive. User prompts and file I/O
//! happen inside the lock for single-operation flows; this intentionally
//! blocks other mutations until the prompt resolves.

mod edit;
mod export;
mod import;
mod ops;
mod repack;

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::codec::{ArchiveCodec, ArchiveHandle, Generator};
use crate::error::{Error, Result};
use crate::filetype::{TypeRegistry, extension_of};
use crate::thumbnail::{ThumbnailCache, ThumbnailMode};
use crate::tree::{ArchiveTree, DirId, FileEntry, FileId};

pub use edit::EditOutcome;
pub use export::{ExportOptions, ExportOutcome};
pub use import::ImportOutcome;
pub use ops::{AddFilesOutcome, DirListing, files_under};
pub use repack::RepackOutcome;

/// Mutable session state guarded by the session lock
pub(crate) struct SessionState {
    /// Open archive handle; `None` only transiently during a repack swap
    pub(crate) file: Option<File>,
    pub(crate) archive: ArchiveHandle,
    /// Codec write context from the last load
    pub(crate) generator: Option<Generator>,
    pub(crate) tree: ArchiveTree,
}

/// One row of a session's advisory listing snapshot
#[derive(Debug, Clone)]
pub struct ListingRow {
    /// Full path within the archive
    pub path: String,
    /// File name
    pub name: String,
    /// Decoded size in bytes (pending bytes win over stored size)
    pub size: u64,
    /// Descriptor name once initialized, otherwise the extension
    pub type_label: String,
    /// Whether replacement bytes are queued for the next repack
    pub modified: bool,
}

/// One open archive: handle, tree and the lock serializing all access
pub struct ArchiveSession {
    name: String,
    path: PathBuf,
    codec: Arc<dyn ArchiveCodec>,
    registry: Arc<TypeRegistry>,
    state: Mutex<SessionState>,
    /// Monotonic count of modifications this session; informational only
    modified_files: AtomicU64,
    /// Advisory listing refreshed after load and after each mutation.
    /// Readers may observe a slightly stale view; that is accepted.
    snapshot: std::sync::RwLock<Vec<ListingRow>>,
    thumbnails: std::sync::Mutex<ThumbnailCache>,
}

impl ArchiveSession {
    /// Open an archive and load its tree.
    ///
    /// # Errors
    /// Returns [`Error::FileLocked`] if another process holds the file,
    /// or a codec error if the archive cannot be parsed.
    pub async fn open(
        path: impl AsRef<Path>,
        codec: Arc<dyn ArchiveCodec>,
        registry: Arc<TypeRegistry>,
    ) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().to_string());

        let mut file = open_exclusive(&path)?;
        let archive = codec.load_archive(&mut file, &name)?;
        let tree = ArchiveTree::new(codec.path_separator());

        let session = Arc::new(Self {
            name,
            path,
            codec,
            registry,
            state: Mutex::new(SessionState {
                file: Some(file),
                archive,
                generator: None,
                tree,
            }),
            modified_files: AtomicU64::new(0),
            snapshot: std::sync::RwLock::new(Vec::new()),
            thumbnails: std::sync::Mutex::new(ThumbnailCache::new()),
        });

        {
            let mut state = session.state.lock().await;
            session.load_tree(&mut state)?;
            session.refresh_snapshot(&state);
        }

        Ok(session)
    }

    /// Archive display name (file stem)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the archive file on disk
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The codec backing this session
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn ArchiveCodec> {
        &self.codec
    }

    /// Monotonic count of modifications made this session
    #[must_use]
    pub fn modified_count(&self) -> u64 {
        self.modified_files.load(Ordering::Relaxed)
    }

    /// Advisory listing of every file; may lag behind in-flight mutations
    #[must_use]
    pub fn listing_snapshot(&self) -> Vec<ListingRow> {
        self.snapshot.read().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Replace the thumbnail cache with one of the given capacity.
    /// Intended for right after open, before any previews are loaded.
    pub fn set_thumbnail_capacity(&self, capacity: usize) {
        let mut cache = self.thumbnails.lock().expect("thumbnail cache poisoned");
        *cache = ThumbnailCache::with_max_entries(capacity);
    }

    /// The root directory id for the current load cycle
    pub async fn root(&self) -> DirId {
        self.state.lock().await.tree.root()
    }

    /// Run a read-only closure against the tree under the session lock
    pub async fn with_tree<R>(&self, f: impl FnOnce(&ArchiveTree) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.tree)
    }

    /// Resolve a separator-joined directory path
    pub async fn resolve_directory(&self, path: &str) -> Option<DirId> {
        self.state.lock().await.tree.resolve_path(path)
    }

    /// Set or clear an entry's selection flag
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id.
    pub async fn set_selected(&self, file: FileId, selected: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tree.file_mut(file)?.selected = selected;
        Ok(())
    }

    /// Detect an entry's type and optionally load its thumbnail.
    ///
    /// Detection is cached until the entry's bytes are replaced. Decode or
    /// preview failures downgrade the entry to the terminal error type
    /// instead of propagating; only handle-level I/O errors surface.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id, [`Error::Io`] if the
    /// archive handle itself fails.
    pub async fn initialize_file(&self, file: FileId, mode: ThumbnailMode) -> Result<()> {
        let mut state = self.state.lock().await;
        self.initialize_file_locked(&mut state, file, mode)
    }

    pub(crate) fn initialize_file_locked(
        &self,
        state: &mut SessionState,
        file: FileId,
        mode: ThumbnailMode,
    ) -> Result<()> {
        let needs_detection = state.tree.file(file)?.descriptor.is_none();

        let wants_thumbnail = {
            let cache = self.thumbnails.lock().expect("thumbnail cache poisoned");
            match mode {
                ThumbnailMode::None => false,
                ThumbnailMode::LoadIfAbsent => !cache.contains(file),
                ThumbnailMode::ForceReload => true,
                ThumbnailMode::ReloadIfPreviouslyLoaded => cache.contains(file),
            }
        };

        if !needs_detection && !wants_thumbnail {
            return Ok(());
        }

        let bytes = match self.current_bytes_locked(state, file) {
            Ok(bytes) => bytes,
            // The handle is gone; nothing left to read from.
            Err(err @ (Error::Io(_) | Error::HandleLost { .. })) => return Err(err),
            // Decode failed but the archive stream is fine: downgrade.
            Err(err) => {
                let name = state.tree.file(file)?.name.clone();
                tracing::warn!(entry = %name, error = %err, "decode failed, downgrading entry");
                self.downgrade_to_error(state, file)?;
                return Ok(());
            }
        };

        let extension = extension_of(&state.tree.file(file)?.name);

        if needs_detection {
            let probe_len = bytes.len().min(crate::filetype::HEADER_PROBE_LEN);
            let descriptor = self.registry.detect(&extension, &bytes[..probe_len]);
            let entry = state.tree.file_mut(file)?;
            entry.export_formats = descriptor.export_formats(&extension);
            entry.import_formats = descriptor.import_formats(&extension);
            entry.descriptor = Some(descriptor);
        }

        if wants_thumbnail {
            let descriptor = state
                .tree
                .file(file)?
                .descriptor
                .clone()
                .expect("descriptor set above");

            match descriptor.load_thumbnail(&bytes, &extension) {
                Ok(Some(thumbnail)) => {
                    let mut cache = self.thumbnails.lock().expect("thumbnail cache poisoned");
                    cache.insert(file, thumbnail);
                }
                Ok(None) => {}
                Err(err) => {
                    let name = state.tree.file(file)?.name.clone();
                    tracing::warn!(entry = %name, error = %err, "preview failed, downgrading entry");
                    self.downgrade_to_error(state, file)?;
                }
            }
        }

        Ok(())
    }

    fn downgrade_to_error(&self, state: &mut SessionState, file: FileId) -> Result<()> {
        let error = self.registry.error_descriptor();
        let entry = state.tree.file_mut(file)?;
        entry.descriptor = Some(error);
        entry.export_formats = Vec::new();
        entry.import_formats = Vec::new();
        self.thumbnails
            .lock()
            .expect("thumbnail cache poisoned")
            .remove(file);
        Ok(())
    }

    /// The entry's current bytes: pending replacement if present, otherwise
    /// decoded from the archive.
    pub(crate) fn current_bytes_locked(
        &self,
        state: &mut SessionState,
        file: FileId,
    ) -> Result<Vec<u8>> {
        let SessionState { file: handle, tree, .. } = state;
        let entry = tree.file(file)?;
        if let Some(pending) = &entry.pending {
            return Ok(pending.clone());
        }
        let stream = handle.as_mut().ok_or_else(|| Error::HandleLost {
            path: self.path.clone(),
        })?;
        self.codec.decode_entry(&entry.handle, stream)
    }

    /// Rebuild the tree from the archive. Always clears first; trees are
    /// never merged.
    pub(crate) fn load_tree(&self, state: &mut SessionState) -> Result<()> {
        self.clear_tree(state);

        let SessionState { file, archive, generator, tree } = state;
        let stream = file.as_mut().ok_or_else(|| Error::HandleLost {
            path: self.path.clone(),
        })?;

        let loaded = self.codec.load_archive_data(archive, stream, &self.name)?;
        for (dir_path, entries) in loaded.directories {
            let dir = tree.ensure_path(&dir_path)?;
            for loaded_entry in entries {
                let entry = FileEntry::new(loaded_entry.name, dir, loaded_entry.handle);
                tree.attach_file(dir, entry)?;
            }
        }
        *generator = Some(loaded.generator);

        tracing::debug!(archive = %self.name, files = tree.file_count(), "tree loaded");
        Ok(())
    }

    /// Dispose every entry (releasing pending buffers) and all nodes
    pub(crate) fn clear_tree(&self, state: &mut SessionState) {
        state.tree.clear();
        self.thumbnails
            .lock()
            .expect("thumbnail cache poisoned")
            .clear();
    }

    pub(crate) fn refresh_snapshot(&self, state: &SessionState) {
        let tree = &state.tree;
        let rows: Vec<ListingRow> = tree
            .collect_files(tree.root(), true)
            .into_iter()
            .filter_map(|id| {
                let entry = tree.file(id).ok()?;
                let type_label = entry.descriptor.as_ref().map_or_else(
                    || extension_of(&entry.name).to_uppercase(),
                    |d| d.name().to_string(),
                );
                let size = entry.pending.as_ref().map_or_else(
                    || self.codec.entry_size(&entry.handle),
                    |p| p.len() as u64,
                );
                Some(ListingRow {
                    path: tree.file_path(id),
                    name: entry.name.clone(),
                    size,
                    type_label,
                    modified: entry.pending.is_some(),
                })
            })
            .collect();

        if let Ok(mut snapshot) = self.snapshot.write() {
            *snapshot = rows;
        }
    }

    pub(crate) fn count_modification(&self, count: u64) {
        self.modified_files.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn thumbnails(&self) -> &std::sync::Mutex<ThumbnailCache> {
        &self.thumbnails
    }

    pub(crate) async fn lock_state(&self) -> tokio::sync::MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

impl std::fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("modified", &self.modified_count())
            .finish_non_exhaustive()
    }
}

/// Open the archive for exclusive read+write access.
///
/// Sharing violations and permission failures map to [`Error::FileLocked`];
/// the same probe runs again before every repack.
pub(crate) fn open_exclusive(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied | ErrorKind::WouldBlock => Error::FileLocked {
                path: path.to_path_buf(),
            },
            _ => Error::Io(err),
        })
}
