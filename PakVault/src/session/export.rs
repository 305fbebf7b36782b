//! Batch export
//!
//! Decodes each selected file and writes it under a mirrored directory
//! structure. Target formats are chosen once per distinct file type and
//! remembered for the rest of the batch; conversion failures fall back to
//! native export for that file and never abort the batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::filetype::{FileFormat, extension_of, stem_of};
use crate::interact::InteractionHandler;
use crate::progress::{OpPhase, OpProgress, ProgressCallback};
use crate::thumbnail::ThumbnailMode;
use crate::tree::DirId;

use super::ArchiveSession;

/// Options for a batch export
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Export only entries with the selection flag set
    pub selected_only: bool,
    /// Write decoded bytes verbatim; never invoke a converter
    pub force_native: bool,
}

/// Result of a batch export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Root directory everything was written under
    pub destination: PathBuf,
    /// Files written in their native format
    pub exported: usize,
    /// Files written through a format conversion
    pub converted: usize,
    /// Per-file failures (entry path, error message)
    pub errors: Vec<(String, String)>,
    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

impl ExportOutcome {
    /// Whether every file made it out without a recorded error
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

impl ArchiveSession {
    /// Export a directory's files under `target_dir/<export_name>/`.
    ///
    /// `export_name` is the directory's own name, or the archive name when
    /// exporting from the root. Aborts before writing anything if that
    /// destination already exists.
    ///
    /// # Errors
    /// Returns [`Error::DestinationExists`] if the destination is taken and
    /// [`Error::StaleId`] for a stale directory id. Per-file failures are
    /// collected in the outcome instead of propagating.
    pub async fn export_directory(
        &self,
        dir: DirId,
        target_dir: &Path,
        options: ExportOptions,
        interact: &dyn InteractionHandler,
        cancel: &CancellationToken,
        progress: ProgressCallback<'_>,
    ) -> Result<ExportOutcome> {
        let mut state = self.lock_state().await;

        let node = state.tree.dir(dir)?;
        let export_name = if node.is_root() {
            self.name().to_string()
        } else {
            node.name().to_string()
        };

        let destination = target_dir.join(&export_name);
        if destination.exists() {
            return Err(Error::DestinationExists { path: destination });
        }

        let base_path = state.tree.dir_path(dir);
        let mut files = state.tree.collect_files(dir, options.recursive);
        if options.selected_only {
            files.retain(|id| state.tree.file(*id).is_ok_and(|f| f.is_selected()));
        }

        let mut outcome = ExportOutcome {
            destination: destination.clone(),
            exported: 0,
            converted: 0,
            errors: Vec::new(),
            cancelled: false,
        };

        // Format choice per descriptor name, decided at most once per batch.
        let mut format_choices: HashMap<&'static str, Option<FileFormat>> = HashMap::new();

        let total = files.len();
        for (i, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let name = match state.tree.file(file) {
                Ok(entry) => entry.name().to_string(),
                Err(_) => continue,
            };
            progress(&OpProgress::with_file(OpPhase::Exporting, i + 1, total, &name));

            self.initialize_file_locked(&mut state, file, ThumbnailMode::None)?;

            let bytes = match self.current_bytes_locked(&mut state, file) {
                Ok(bytes) => bytes,
                Err(err) => {
                    outcome.errors.push((state.tree.file_path(file), err.to_string()));
                    continue;
                }
            };

            let entry = state.tree.file(file)?;
            let descriptor = entry
                .descriptor
                .clone()
                .expect("descriptor set by initialization");
            let formats = entry.export_formats.clone();
            let parent = entry.parent();

            let out_dir = mirror_dir(&destination, &state.tree.dir_path(parent), &base_path,
                state.tree.separator());

            let choice = if options.force_native || formats.is_empty() {
                None
            } else {
                format_choices
                    .entry(descriptor.name())
                    .or_insert_with(|| interact.choose_export_format(descriptor.name(), &formats))
                    .clone()
            };

            match &choice {
                None => match write_native(&out_dir, &name, &bytes) {
                    Ok(()) => outcome.exported += 1,
                    Err(err) => {
                        outcome.errors.push((state.tree.file_path(file), err.to_string()));
                    }
                },
                Some(target) => {
                    progress(&OpProgress::with_file(OpPhase::Converting, i + 1, total, &name));
                    let extension = extension_of(&name);
                    let out_path =
                        out_dir.join(format!("{}.{}", stem_of(&name), target.extension));
                    match write_converted(descriptor.as_ref(), &extension, target, &bytes, &out_path)
                    {
                        Ok(()) => outcome.converted += 1,
                        Err(err) => {
                            // Converter failed: log, fall back to native
                            // output and treat the entry as error-typed from
                            // here on.
                            tracing::warn!(
                                entry = %name,
                                error = %err,
                                "conversion failed, falling back to native export"
                            );
                            outcome.errors.push((state.tree.file_path(file), err.to_string()));

                            match write_native(&out_dir, &name, &bytes) {
                                Ok(()) => outcome.exported += 1,
                                Err(native_err) => {
                                    outcome
                                        .errors
                                        .push((state.tree.file_path(file), native_err.to_string()));
                                }
                            }

                            let error = self.registry.error_descriptor();
                            let entry = state.tree.file_mut(file)?;
                            entry.descriptor = Some(error);
                            entry.export_formats = Vec::new();
                            entry.import_formats = Vec::new();
                        }
                    }
                }
            }
        }

        progress(&OpProgress::new(OpPhase::Complete, total, total));
        Ok(outcome)
    }
}

fn write_native(out_dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    std::fs::write(out_dir.join(name), bytes)?;
    Ok(())
}

fn write_converted(
    descriptor: &dyn crate::filetype::FileTypeDescriptor,
    extension: &str,
    target: &FileFormat,
    bytes: &[u8],
    out_path: &Path,
) -> Result<()> {
    std::fs::create_dir_all(out_path.parent().unwrap_or(Path::new(".")))?;
    let mut output = std::fs::File::create(out_path)?;
    let result = descriptor.convert_to(extension, &target.extension, &mut &bytes[..], &mut output);
    if result.is_err() {
        drop(output);
        // Never leave a half-written destination behind.
        let _ = std::fs::remove_file(out_path);
    }
    result
}

/// Destination directory mirroring the entry's position under the exported
/// root: `dest_root` plus the segments of `dir_path` below `base_path`.
fn mirror_dir(dest_root: &Path, dir_path: &str, base_path: &str, separator: char) -> PathBuf {
    let relative = if base_path.is_empty() {
        dir_path
    } else {
        dir_path
            .strip_prefix(base_path)
            .map_or("", |rest| rest.trim_start_matches(separator))
    };

    let mut out = dest_root.to_path_buf();
    for segment in relative.split(separator).filter(|s| !s.is_empty()) {
        out.push(segment);
    }
    out
}
