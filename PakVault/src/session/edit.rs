//! Edit-in-place
//!
//! Materializes an entry's bytes (optionally converted) to a temp file,
//! hands the file to an external editor collaborator, and re-imports the
//! result with the mirrored conversion once the editor returns. The whole
//! flow holds the session lock, so a slow editor blocks other mutations
//! on this archive.

use crate::error::Result;
use crate::filetype::{FileFormat, extension_of, stem_of};
use crate::interact::ExternalEditor;
use crate::thumbnail::ThumbnailMode;
use crate::tree::FileId;

use super::ArchiveSession;

/// Result of an edit-in-place round trip
#[derive(Debug, Clone, Copy)]
pub struct EditOutcome {
    /// Whether the edited bytes differ and were queued as a pending import
    pub modified: bool,
}

impl ArchiveSession {
    /// Edit one entry with an external editor.
    ///
    /// `format = None` edits the native bytes; otherwise the bytes are
    /// converted to the given format before the handoff and converted back
    /// on completion. An unchanged file is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::Error::StaleId`] for a stale id,
    /// [`crate::Error::Conversion`] if either conversion fails, or the
    /// editor's own error.
    pub async fn edit_file(
        &self,
        file: FileId,
        editor: &dyn ExternalEditor,
        format: Option<&FileFormat>,
    ) -> Result<EditOutcome> {
        let mut state = self.lock_state().await;
        self.initialize_file_locked(&mut state, file, ThumbnailMode::None)?;

        let bytes = self.current_bytes_locked(&mut state, file)?;
        let entry = state.tree.file(file)?;
        let name = entry.name().to_string();
        let extension = extension_of(&name);
        let descriptor = entry.descriptor.clone();

        // Materialize into a private temp dir; the file keeps a recognizable
        // name so the editor can pick tooling by extension.
        let staging = tempfile::tempdir()?;
        let (staged_name, staged_bytes) = match format {
            None => (name.clone(), bytes.clone()),
            Some(target) => {
                let descriptor = descriptor
                    .clone()
                    .expect("descriptor set by initialization");
                let mut converted = Vec::new();
                descriptor.convert_to(
                    &extension,
                    &target.extension,
                    &mut bytes.as_slice(),
                    &mut converted,
                )?;
                (format!("{}.{}", stem_of(&name), target.extension), converted)
            }
        };

        let staged_path = staging.path().join(&staged_name);
        std::fs::write(&staged_path, &staged_bytes)?;

        editor.edit(&staged_path)?;

        let edited = std::fs::read(&staged_path)?;
        if edited == staged_bytes {
            return Ok(EditOutcome { modified: false });
        }

        let native = match format {
            None => edited,
            Some(target) => {
                let descriptor = descriptor.expect("descriptor set by initialization");
                let mut back = Vec::new();
                descriptor.convert_from(
                    &target.extension,
                    &extension,
                    &mut edited.as_slice(),
                    &mut back,
                )?;
                back
            }
        };

        self.replace_file_locked(&mut state, file, &mut native.as_slice(), None, false)?;
        self.refresh_snapshot(&state);

        tracing::debug!(archive = %self.name(), entry = %name, "edit applied");
        Ok(EditOutcome { modified: true })
    }
}
