//! Directory and file mutations
//!
//! Every operation takes the session lock, validates structural invariants
//! before mutating, and refreshes the advisory listing snapshot on the way
//! out. Name conflicts are rejected before any state changes.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::codec::EntryMetadata;
use crate::error::{Error, Result};
use crate::filetype::{FileFormat, extension_of};
use crate::interact::InteractionHandler;
use crate::thumbnail::ThumbnailMode;
use crate::tree::{DirId, FileEntry, FileId};

use super::{ArchiveSession, ListingRow, SessionState};

/// Recursively collect regular files under a directory, sorted by name.
/// Convenience for feeding a whole folder to an add-files batch.
///
/// # Errors
/// Returns [`Error::WalkDir`] if traversal fails.
pub fn files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Result of an add-files batch
#[derive(Debug, Default, Clone)]
pub struct AddFilesOutcome {
    /// Entries whose content actually changed (new entries, or replacements
    /// that differ from the previous bytes)
    pub added: usize,
    /// Conflicting entries replaced with identical bytes (no-ops)
    pub unchanged: usize,
    /// Files skipped (declined replacements or unreadable sources)
    pub skipped: usize,
}

/// Contents of one directory for display
#[derive(Debug, Clone)]
pub struct DirListing {
    /// Child directories: id and name
    pub dirs: Vec<(DirId, String)>,
    /// File entries in archive order
    pub files: Vec<(FileId, ListingRow)>,
}

impl ArchiveSession {
    /// Enumerate one directory's children and files
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id.
    pub async fn directory_listing(&self, dir: DirId) -> Result<DirListing> {
        let state = self.lock_state().await;
        let tree = &state.tree;
        let node = tree.dir(dir)?;

        let dirs = node
            .child_dirs()
            .filter_map(|id| Some((id, tree.dir(id).ok()?.name().to_string())))
            .collect();

        let files = node
            .files()
            .iter()
            .filter_map(|id| {
                let entry = tree.file(*id).ok()?;
                let type_label = entry.descriptor.as_ref().map_or_else(
                    || extension_of(&entry.name).to_uppercase(),
                    |d| d.name().to_string(),
                );
                let size = entry.pending.as_ref().map_or_else(
                    || self.codec().entry_size(&entry.handle),
                    |p| p.len() as u64,
                );
                Some((
                    *id,
                    ListingRow {
                        path: tree.file_path(*id),
                        name: entry.name.clone(),
                        size,
                        type_label,
                        modified: entry.pending.is_some(),
                    },
                ))
            })
            .collect();

        Ok(DirListing { dirs, files })
    }

    /// Create a subdirectory
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] on a case-insensitive sibling match,
    /// [`Error::DirectoriesUnsupported`] if the format has fixed directories.
    pub async fn add_directory(&self, parent: DirId, name: &str) -> Result<DirId> {
        if !self.codec().can_modify_directories() {
            return Err(Error::DirectoriesUnsupported);
        }

        let mut state = self.lock_state().await;
        let id = state.tree.add_directory(parent, name)?;
        self.refresh_snapshot(&state);
        Ok(id)
    }

    /// Detach a directory and recursively dispose its subtree.
    ///
    /// A no-op on the root (returns `false`). The deletion is persisted only
    /// by the next successful repack.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id,
    /// [`Error::DirectoriesUnsupported`] if the format has fixed directories.
    pub async fn delete_directory(&self, dir: DirId) -> Result<bool> {
        let mut state = self.lock_state().await;
        if state.tree.dir(dir)?.is_root() {
            return Ok(false);
        }
        if !self.codec().can_modify_directories() {
            return Err(Error::DirectoriesUnsupported);
        }

        let removed = state.tree.remove_directory(dir)?;
        {
            let mut thumbnails = self.thumbnails().lock().expect("thumbnail cache poisoned");
            for file in &removed {
                thumbnails.remove(*file);
            }
        }
        self.count_modification(removed.len() as u64);
        self.refresh_snapshot(&state);

        tracing::debug!(archive = %self.name(), files = removed.len(), "directory deleted");
        Ok(true)
    }

    /// Add disk files to a directory.
    ///
    /// Name conflicts raise a single confirmation covering every conflict in
    /// the batch; declined conflicts are skipped. A replacement whose bytes
    /// equal the current content is a no-op and is not counted as added.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale directory id. Unreadable
    /// source files are skipped and logged, not fatal.
    pub async fn add_files(
        &self,
        dir: DirId,
        paths: &[PathBuf],
        interact: &dyn InteractionHandler,
    ) -> Result<AddFilesOutcome> {
        let mut state = self.lock_state().await;
        state.tree.dir(dir)?;

        // Read sources and split into fresh names and conflicts up front so
        // the prompt can cover the whole batch.
        let mut sources: Vec<(String, Vec<u8>, Option<FileId>)> = Vec::new();
        let mut conflicts: Vec<String> = Vec::new();
        let mut outcome = AddFilesOutcome::default();

        for path in paths {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                outcome.skipped += 1;
                continue;
            };
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    outcome.skipped += 1;
                    continue;
                }
            };
            let existing = state.tree.find_file(dir, &name);
            if let Some(id) = existing {
                let display = state.tree.file(id)?.name().to_string();
                conflicts.push(display);
            }
            sources.push((name, bytes, existing));
        }

        let replace_conflicts = if conflicts.is_empty() {
            false
        } else {
            let message = if conflicts.len() == 1 {
                format!("Replace existing file \"{}\"?", conflicts[0])
            } else {
                format!(
                    "Replace {} existing files?\n{}",
                    conflicts.len(),
                    conflicts.join("\n")
                )
            };
            // Prompt once for the whole batch, inside the lock.
            interact.confirm_replace(&message, &conflicts)
        };

        let dir_path = state.tree.dir_path(dir);
        for (name, bytes, existing) in sources {
            match existing {
                Some(id) => {
                    if !replace_conflicts {
                        outcome.skipped += 1;
                        continue;
                    }
                    let current = self.current_bytes_locked(&mut state, id)?;
                    if current == bytes {
                        outcome.unchanged += 1;
                        continue;
                    }
                    self.replace_file_locked(&mut state, id, &mut bytes.as_slice(), None, false)?;
                    outcome.added += 1;
                }
                None => {
                    let SessionState { archive, tree, .. } = &mut *state;
                    let handle = self.codec().new_entry(archive, &dir_path, &name)?;
                    let id = tree.attach_file(dir, FileEntry::new(name, dir, handle))?;
                    self.replace_file_locked(&mut state, id, &mut bytes.as_slice(), None, false)?;
                    outcome.added += 1;
                }
            }
        }

        self.refresh_snapshot(&state);
        Ok(outcome)
    }

    /// Queue replacement bytes for an entry.
    ///
    /// The input is encoded through the codec; a codec that performs no
    /// import-time encoding passes the bytes through unmodified. Returns
    /// `true` only the first time the entry transitions into "has pending
    /// import"; repeated edits before a repack report `false`.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id, or a codec error if
    /// encoding fails.
    pub async fn replace_file(
        &self,
        file: FileId,
        input: &mut (dyn Read + Send),
        metadata: Option<&EntryMetadata>,
        force_thumbnail: bool,
    ) -> Result<bool> {
        let mut state = self.lock_state().await;
        let first = self.replace_file_locked(&mut state, file, input, metadata, force_thumbnail)?;
        self.refresh_snapshot(&state);
        Ok(first)
    }

    pub(crate) fn replace_file_locked(
        &self,
        state: &mut SessionState,
        file: FileId,
        input: &mut dyn Read,
        metadata: Option<&EntryMetadata>,
        force_thumbnail: bool,
    ) -> Result<bool> {
        let owned_metadata;
        let metadata = match metadata {
            Some(meta) => meta,
            None => {
                owned_metadata = EntryMetadata {
                    name: state.tree.file(file)?.name().to_string(),
                    ..EntryMetadata::default()
                };
                &owned_metadata
            }
        };

        let mut encoded = Vec::new();
        let written = {
            let entry = state.tree.file(file)?;
            self.codec()
                .encode_file(input, &mut encoded, &entry.handle, metadata)?
        };
        if written == 0 {
            // Codec performs no import-time encoding: raw passthrough.
            encoded.clear();
            input.read_to_end(&mut encoded)?;
        }

        let entry = state.tree.file_mut(file)?;
        let first_transition = entry.pending.is_none();
        entry.pending = Some(encoded);
        // Bytes were structurally replaced: the cached type is void.
        entry.descriptor = None;
        entry.export_formats = Vec::new();
        entry.import_formats = Vec::new();

        self.thumbnails()
            .lock()
            .expect("thumbnail cache poisoned")
            .remove(file);

        if first_transition {
            self.count_modification(1);
        }

        if force_thumbnail {
            self.initialize_file_locked(state, file, ThumbnailMode::ForceReload)?;
        }

        Ok(first_transition)
    }

    /// Detach and dispose a file entry. Counts as one modification.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id.
    pub async fn delete_file(&self, file: FileId) -> Result<()> {
        let mut state = self.lock_state().await;
        let name = state.tree.file(file)?.name().to_string();
        state.tree.remove_file(file)?;
        self.thumbnails()
            .lock()
            .expect("thumbnail cache poisoned")
            .remove(file);
        self.count_modification(1);
        self.refresh_snapshot(&state);

        tracing::debug!(archive = %self.name(), entry = %name, "file deleted");
        Ok(())
    }

    /// Rename a file entry.
    ///
    /// A handle's name is never mutated in place: a new entry with the same
    /// type and bytes is created at the new name, inserted at the old
    /// position, and the old entry deleted, all under the lock.
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] if a sibling (any casing) already
    /// uses the new name, leaving the original entry untouched.
    pub async fn rename_file(&self, file: FileId, new_name: &str) -> Result<FileId> {
        let mut state = self.lock_state().await;

        let parent = state.tree.file(file)?.parent();
        if let Some(existing) = state.tree.find_file(parent, new_name)
            && existing != file
        {
            return Err(Error::NameConflict {
                name: new_name.to_string(),
            });
        }

        let bytes = self.current_bytes_locked(&mut state, file)?;
        let dir_path = state.tree.dir_path(parent);

        let SessionState { archive, tree, .. } = &mut *state;
        let new_handle = self.codec().new_entry(archive, &dir_path, new_name)?;

        let old_entry = tree.file(file)?;
        let mut new_entry = FileEntry::new(new_name, parent, new_handle);
        new_entry.pending = Some(bytes);
        new_entry.descriptor = old_entry.descriptor.clone();
        new_entry.export_formats = old_entry.export_formats.clone();
        new_entry.import_formats = old_entry.import_formats.clone();
        new_entry.selected = old_entry.selected;

        // Conflicts were rejected above, so the detach-then-attach pair
        // cannot fail halfway.
        let position = tree.remove_file(file)?;
        let new_id = tree.insert_file_at(parent, new_entry, position)?;

        self.thumbnails()
            .lock()
            .expect("thumbnail cache poisoned")
            .remove(file);
        self.count_modification(1);
        self.refresh_snapshot(&state);

        Ok(new_id)
    }

    /// Export one entry to a destination path.
    ///
    /// `format = None` writes the decoded bytes verbatim; otherwise the
    /// entry's descriptor converts them. A partially written destination is
    /// deleted before the failure propagates.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id, [`Error::Conversion`] if
    /// the converter fails, or [`Error::Io`] for filesystem failures.
    pub async fn export_file(
        &self,
        file: FileId,
        dest: &Path,
        format: Option<&FileFormat>,
    ) -> Result<()> {
        let mut state = self.lock_state().await;
        self.initialize_file_locked(&mut state, file, ThumbnailMode::None)?;

        let bytes = self.current_bytes_locked(&mut state, file)?;
        let entry = state.tree.file(file)?;
        let extension = extension_of(&entry.name);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match format {
            None => {
                std::fs::write(dest, &bytes)?;
            }
            Some(target) => {
                let descriptor = entry
                    .descriptor
                    .clone()
                    .expect("descriptor set by initialization");
                if descriptor.is_error() {
                    // Error-typed entries only support native export.
                    return Err(Error::FormatDetection {
                        name: entry.name().to_string(),
                    });
                }
                let result = (|| -> Result<()> {
                    let mut output = std::fs::File::create(dest)?;
                    descriptor.convert_to(
                        &extension,
                        &target.extension,
                        &mut bytes.as_slice(),
                        &mut output,
                    )
                })();
                if let Err(err) = result {
                    // Never leave a half-written destination behind.
                    let _ = std::fs::remove_file(dest);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
