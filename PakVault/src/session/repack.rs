//! Repack: the transactional whole-archive rewrite
//!
//! The tree plus every pending edit is serialized to a temporary file in
//! the archive's directory, verified by the codec's post-repack hook, and
//! atomically moved over the original. The original file survives every
//! failure before the disk swap; the tree is unconditionally reloaded after
//! a successful swap because all entry handles are stale at that point.

use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::codec::RepackFile;
use crate::error::{Error, Result};
use crate::progress::{OpPhase, OpProgress, ProgressCallback};
use crate::session::SessionState;

use super::{ArchiveSession, open_exclusive};

/// Result of a successful repack
#[derive(Debug, Clone)]
pub struct RepackOutcome {
    /// Number of files written to the new archive
    pub files_written: usize,
    /// Number of entries that had pending edits applied
    pub edits_applied: usize,
}

impl ArchiveSession {
    /// Rewrite the archive from the current tree and pending edits.
    ///
    /// Ordered steps, exclusive under the session lock:
    /// 1. probe that no other process holds the file,
    /// 2. serialize tree + pending buffers to a temp file via the codec,
    /// 3. run the codec's post-repack hook against the temp file,
    /// 4. close the current handle,
    /// 5. atomically move the temp file over the original path,
    /// 6. reopen, clear and reload the tree from the new file.
    ///
    /// Cancellation is honored between steps up to and including step 3;
    /// once the old handle is closed the swap always runs to completion.
    ///
    /// # Errors
    /// [`Error::FileLocked`] from step 1 and any failure through step 3
    /// leave the original file and the tree untouched. A swap failure in
    /// step 5 reopens the old handle before returning. [`Error::HandleLost`]
    /// means the session has no open handle and is unusable.
    pub async fn repack(
        &self,
        cancel: &CancellationToken,
        progress: ProgressCallback<'_>,
    ) -> Result<RepackOutcome> {
        let mut state = self.lock_state().await;

        // Step 1: external-lock probe; the tree is untouched on failure.
        drop(open_exclusive(self.path())?);

        if cancel.is_cancelled() {
            return Err(Error::RepackCancelled);
        }

        // Step 2: serialize into a sibling temp file so the final rename
        // stays on one filesystem.
        let parent = self
            .path()
            .parent()
            .ok_or_else(|| Error::InvalidPath(self.path().display().to_string()))?;
        let mut temp = NamedTempFile::new_in(parent)?;

        let (files_written, edits_applied) = {
            let SessionState {
                file,
                archive,
                generator,
                tree,
            } = &mut *state;

            let stream = file.as_mut().ok_or_else(|| Error::HandleLost {
                path: self.path().to_path_buf(),
            })?;
            let generator = generator.as_mut().ok_or_else(|| Error::Repack {
                message: "no codec context from the last load".to_string(),
            })?;

            let ids = tree.collect_files(tree.root(), true);
            let paths: Vec<String> = ids.iter().map(|id| tree.file_path(*id)).collect();

            let mut files = Vec::with_capacity(ids.len());
            let mut edits = 0usize;
            for (id, path) in ids.iter().zip(&paths) {
                let entry = tree.file(*id)?;
                if entry.is_modified() {
                    edits += 1;
                }
                files.push(RepackFile {
                    path: path.clone(),
                    handle: entry.handle(),
                    pending: entry.pending.as_deref(),
                });
            }

            self.codec()
                .write_archive(generator, archive, stream, temp.as_file_mut(), &files, progress)
                .map_err(|err| Error::Repack {
                    message: format!("serialization failed: {err}"),
                })?;

            (files.len(), edits)
        };

        if cancel.is_cancelled() {
            return Err(Error::RepackCancelled);
        }

        // Step 3: post-repack hook against the temp file.
        self.codec()
            .on_repacked(&[temp.path().to_path_buf()], progress)?;

        // Last cancellation point: after this the swap runs to completion.
        if cancel.is_cancelled() {
            return Err(Error::RepackCancelled);
        }

        progress(&OpProgress::new(OpPhase::Finalizing, 0, 1));

        // Step 4: close the current handle so the rename can take its place.
        drop(state.file.take());

        // Step 5: atomic swap. On failure, reopen the old file before
        // returning so the session never sits without a handle.
        if let Err(persist_err) = temp.persist(self.path()) {
            match open_exclusive(self.path()) {
                Ok(old) => {
                    state.file = Some(old);
                    return Err(Error::Repack {
                        message: format!("disk swap failed: {}", persist_err.error),
                    });
                }
                Err(_) => {
                    return Err(Error::HandleLost {
                        path: self.path().to_path_buf(),
                    });
                }
            }
        }

        // Step 6: reopen and reload unconditionally; every entry handle is
        // stale now that the archive has been rewritten.
        progress(&OpProgress::new(OpPhase::Reloading, 0, 1));

        let mut new_file = match open_exclusive(self.path()) {
            Ok(file) => file,
            Err(_) => {
                return Err(Error::HandleLost {
                    path: self.path().to_path_buf(),
                });
            }
        };
        state.archive = self.codec().load_archive(&mut new_file, self.name())?;
        state.file = Some(new_file);

        self.load_tree(&mut state)?;
        self.refresh_snapshot(&state);

        progress(&OpProgress::new(OpPhase::Complete, 1, 1));
        tracing::info!(
            archive = %self.name(),
            files = files_written,
            edits = edits_applied,
            "repack complete"
        );

        Ok(RepackOutcome {
            files_written,
            edits_applied,
        })
    }
}
