//! Batch import
//!
//! Walks a directory's entries and replaces each one that has a matching
//! file under the mirrored source path: an exact stem+extension match is a
//! raw passthrough, a stem match with a supported import extension goes
//! through the descriptor's converter. Unmatched entries are skipped; a
//! batch that matches nothing is a warning, not an error.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::filetype::{extension_of, stem_of};
use crate::progress::{OpPhase, OpProgress, ProgressCallback};
use crate::thumbnail::ThumbnailMode;
use crate::tree::DirId;

use super::ArchiveSession;

/// Result of a batch import
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Entries replaced by an exact-name source file
    pub imported: usize,
    /// Entries replaced through a format conversion
    pub converted: usize,
    /// Entries with no matching source file
    pub skipped: usize,
    /// Per-file failures (entry path, error message)
    pub errors: Vec<(String, String)>,
    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

impl ImportOutcome {
    /// Whether the batch found nothing to import, surfaced as a warning
    #[must_use]
    pub fn nothing_imported(&self) -> bool {
        self.imported == 0 && self.converted == 0
    }
}

impl ArchiveSession {
    /// Replace entries under `dir` from files in `source_dir`.
    ///
    /// # Errors
    /// Returns [`crate::Error::StaleId`] for a stale directory id. Per-file
    /// conversion failures are collected in the outcome.
    pub async fn import_directory(
        &self,
        dir: DirId,
        source_dir: &Path,
        cancel: &CancellationToken,
        progress: ProgressCallback<'_>,
    ) -> Result<ImportOutcome> {
        let mut state = self.lock_state().await;
        state.tree.dir(dir)?;

        let base_path = state.tree.dir_path(dir);
        let files = state.tree.collect_files(dir, true);

        let mut outcome = ImportOutcome::default();
        let total = files.len();

        for (i, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let (name, parent) = match state.tree.file(file) {
                Ok(entry) => (entry.name().to_string(), entry.parent()),
                Err(_) => continue,
            };
            progress(&OpProgress::with_file(OpPhase::Importing, i + 1, total, &name));

            let source = mirror_source(
                source_dir,
                &state.tree.dir_path(parent),
                &base_path,
                state.tree.separator(),
            );

            // Exact stem+extension match: raw passthrough.
            let exact = source.join(&name);
            if exact.is_file() {
                match std::fs::read(&exact) {
                    Ok(bytes) => {
                        self.replace_file_locked(
                            &mut state,
                            file,
                            &mut bytes.as_slice(),
                            None,
                            false,
                        )?;
                        outcome.imported += 1;
                    }
                    Err(err) => {
                        outcome.errors.push((state.tree.file_path(file), err.to_string()));
                    }
                }
                continue;
            }

            // Otherwise look for the stem with a supported import extension.
            self.initialize_file_locked(&mut state, file, ThumbnailMode::None)?;
            let entry = state.tree.file(file)?;
            let import_formats = entry.import_formats.clone();
            let descriptor = entry.descriptor.clone();

            let stem = stem_of(&name);
            let extension = extension_of(&name);
            let candidate = import_formats.iter().find_map(|format| {
                let path = source.join(format!("{stem}.{}", format.extension));
                path.is_file().then_some((format.clone(), path))
            });

            let Some((format, path)) = candidate else {
                outcome.skipped += 1;
                continue;
            };
            let Some(descriptor) = descriptor else {
                outcome.skipped += 1;
                continue;
            };

            progress(&OpProgress::with_file(OpPhase::Converting, i + 1, total, &name));

            let converted = std::fs::read(&path).map_err(Into::into).and_then(|bytes| {
                let mut native = Vec::new();
                descriptor
                    .convert_from(&format.extension, &extension, &mut bytes.as_slice(), &mut native)
                    .map(|()| native)
            });

            match converted {
                Ok(native) => {
                    self.replace_file_locked(
                        &mut state,
                        file,
                        &mut native.as_slice(),
                        None,
                        false,
                    )?;
                    outcome.converted += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        entry = %name,
                        source = %path.display(),
                        error = %err,
                        "import conversion failed"
                    );
                    outcome.errors.push((state.tree.file_path(file), err.to_string()));
                }
            }
        }

        if outcome.nothing_imported() && !outcome.cancelled {
            tracing::warn!(archive = %self.name(), "nothing imported from the source directory");
        }

        self.refresh_snapshot(&state);
        progress(&OpProgress::new(OpPhase::Complete, total, total));
        Ok(outcome)
    }
}

/// Source directory mirroring the entry's position under the imported root
fn mirror_source(source_root: &Path, dir_path: &str, base_path: &str, separator: char) -> PathBuf {
    let relative = if base_path.is_empty() {
        dir_path
    } else {
        dir_path
            .strip_prefix(base_path)
            .map_or("", |rest| rest.trim_start_matches(separator))
    };

    let mut out = source_root.to_path_buf();
    for segment in relative.split(separator).filter(|s| !s.is_empty()) {
        out.push(segment);
    }
    out
}
