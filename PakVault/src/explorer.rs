//! Explorer controller
//!
//! Coordinates multiple open archive sessions: cross-session navigation,
//! address resolution and filename search. Addresses have the form
//! `<archiveName>:<sep><path...>`, where `<sep>` is the archive codec's
//! path separator. Search reads each session's advisory listing snapshot
//! and never takes a session lock.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::codec::ArchiveCodec;
use crate::error::{Error, Result};
use crate::filetype::TypeRegistry;
use crate::session::{ArchiveSession, ListingRow};
use crate::thumbnail::spawn_directory_loader;
use crate::tree::DirId;

/// A parsed cross-archive address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Archive display name
    pub archive: String,
    /// Separator-joined directory path; empty for the root
    pub path: String,
}

/// One filename-search hit
#[derive(Debug, Clone)]
pub struct SearchMatch {
    /// Full address of the matching file
    pub address: String,
    /// The matching listing row
    pub row: ListingRow,
}

struct ThumbnailTask {
    archive: String,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<usize>,
}

/// Coordinates every open archive session
pub struct ExplorerController {
    registry: Arc<TypeRegistry>,
    config: std::sync::Mutex<crate::config::ExplorerConfig>,
    sessions: std::sync::RwLock<IndexMap<String, Arc<ArchiveSession>>>,
    current: std::sync::RwLock<Option<(String, DirId)>>,
    thumbnail_task: std::sync::Mutex<Option<ThumbnailTask>>,
}

impl ExplorerController {
    /// Create a controller with the given detector registry and default
    /// settings
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, crate::config::ExplorerConfig::default())
    }

    /// Create a controller with loaded settings
    #[must_use]
    pub fn with_config(registry: Arc<TypeRegistry>, config: crate::config::ExplorerConfig) -> Self {
        Self {
            registry,
            config: std::sync::Mutex::new(config),
            sessions: std::sync::RwLock::new(IndexMap::new()),
            current: std::sync::RwLock::new(None),
            thumbnail_task: std::sync::Mutex::new(None),
        }
    }

    /// A copy of the current settings (recents included)
    #[must_use]
    pub fn config(&self) -> crate::config::ExplorerConfig {
        self.config.lock().expect("config poisoned").clone()
    }

    /// Open an archive and register its session under its display name
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] if an archive with the same name is
    /// already open, or any session open error.
    pub async fn open_archive(
        &self,
        path: impl AsRef<Path>,
        codec: Arc<dyn ArchiveCodec>,
    ) -> Result<Arc<ArchiveSession>> {
        let path = path.as_ref();
        let session =
            ArchiveSession::open(path, codec, Arc::clone(&self.registry)).await?;
        let name = session.name().to_string();

        {
            let mut sessions = self.sessions.write().expect("session map poisoned");
            if sessions.contains_key(&name) {
                return Err(Error::NameConflict { name });
            }
            sessions.insert(name, Arc::clone(&session));
        }

        let mut config = self.config.lock().expect("config poisoned");
        session.set_thumbnail_capacity(config.thumbnail_capacity);
        config.push_recent(path.display().to_string());

        Ok(session)
    }

    /// Close an archive session, cancelling its background work
    ///
    /// # Errors
    /// Returns [`Error::ArchiveNotOpen`] for an unknown name.
    pub fn close_archive(&self, name: &str) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .expect("session map poisoned")
            .shift_remove(name);
        if removed.is_none() {
            return Err(Error::ArchiveNotOpen(name.to_string()));
        }

        let mut task = self.thumbnail_task.lock().expect("task slot poisoned");
        if task.as_ref().is_some_and(|t| t.archive == name)
            && let Some(task) = task.take()
        {
            task.token.cancel();
            task.handle.abort();
        }

        let mut current = self.current.write().expect("current slot poisoned");
        if current.as_ref().is_some_and(|(archive, _)| archive == name) {
            *current = None;
        }
        Ok(())
    }

    /// Look up an open session by archive name
    ///
    /// # Errors
    /// Returns [`Error::ArchiveNotOpen`] for an unknown name.
    pub fn session(&self, name: &str) -> Result<Arc<ArchiveSession>> {
        self.sessions
            .read()
            .expect("session map poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ArchiveNotOpen(name.to_string()))
    }

    /// Every open session, in opening order
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<ArchiveSession>> {
        self.sessions
            .read()
            .expect("session map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Parse an `<archiveName>:<sep><path...>` address
    ///
    /// # Errors
    /// Returns [`Error::InvalidAddress`] for a malformed string and
    /// [`Error::ArchiveNotOpen`] for an unknown archive.
    pub fn parse_address(&self, address: &str) -> Result<(Arc<ArchiveSession>, Address)> {
        let (archive, rest) = address
            .split_once(':')
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

        let session = self.session(archive)?;
        let separator = session.codec().path_separator();

        let path = rest
            .strip_prefix(separator)
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

        Ok((
            session,
            Address {
                archive: archive.to_string(),
                path: path.trim_end_matches(separator).to_string(),
            },
        ))
    }

    /// Format the address of a directory within a session
    pub async fn format_address(&self, session: &ArchiveSession, dir: DirId) -> Result<String> {
        let separator = session.codec().path_separator();
        let path = session.with_tree(|tree| tree.dir_path(dir)).await;
        Ok(format!("{}:{}{}", session.name(), separator, path))
    }

    /// Navigate to an address: resolve it, make it the current directory
    /// and start thumbnail initialization for it in the background.
    ///
    /// The previous directory's background task is cancelled and its
    /// thumbnails are unloaded (pixel data dropped, info kept).
    ///
    /// # Errors
    /// Returns [`Error::EntryNotFound`] if the path does not resolve.
    pub async fn navigate(&self, address: &str) -> Result<(Arc<ArchiveSession>, DirId)> {
        let (session, parsed) = self.parse_address(address)?;

        let dir = session
            .resolve_directory(&parsed.path)
            .await
            .ok_or_else(|| Error::EntryNotFound(parsed.path.clone()))?;

        // Cancel the previous directory's loader and unload its previews.
        {
            let mut task = self.thumbnail_task.lock().expect("task slot poisoned");
            if let Some(previous) = task.take() {
                previous.token.cancel();
                if let Ok(previous_session) = self.session(&previous.archive) {
                    previous_session
                        .thumbnails()
                        .lock()
                        .expect("thumbnail cache poisoned")
                        .unload_all();
                }
            }

            let token = CancellationToken::new();
            let handle = spawn_directory_loader(Arc::clone(&session), dir, token.clone());
            *task = Some(ThumbnailTask {
                archive: session.name().to_string(),
                token,
                handle,
            });
        }

        *self.current.write().expect("current slot poisoned") =
            Some((session.name().to_string(), dir));

        tracing::debug!(address, "navigated");
        Ok((session, dir))
    }

    /// The current archive name and directory, if any
    #[must_use]
    pub fn current(&self) -> Option<(String, DirId)> {
        self.current.read().expect("current slot poisoned").clone()
    }

    /// Case-insensitive filename search across every open archive.
    ///
    /// Reads advisory snapshots only; results may lag an in-flight
    /// mutation by one refresh.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<SearchMatch> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.sessions()
            .into_iter()
            .flat_map(|session| {
                let name = session.name().to_string();
                let separator = session.codec().path_separator();
                session
                    .listing_snapshot()
                    .into_iter()
                    .filter(|row| row.name.to_lowercase().contains(&needle))
                    .map(move |row| SearchMatch {
                        address: format!("{name}:{separator}{}", row.path),
                        row,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl std::fmt::Debug for ExplorerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sessions = self.sessions.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("ExplorerController")
            .field("sessions", &sessions)
            .finish_non_exhaustive()
    }
}
