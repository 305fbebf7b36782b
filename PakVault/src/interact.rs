//! Collaborator seams for user interaction
//!
//! The engine never opens dialogs itself; callers supply an
//! `InteractionHandler` for the prompts batch operations need, and an
//! `ExternalEditor` for edit-in-place handoff. Prompts run inside the
//! session lock, so a slow answer blocks other mutations on that archive.

use std::path::Path;

use crate::error::Result;
use crate::filetype::FileFormat;

/// Answers the prompts raised by batch operations
pub trait InteractionHandler: Send + Sync {
    /// Pick a target format for every file of the given type in this batch.
    ///
    /// Asked once per distinct file type; the answer is reused for the rest
    /// of the batch. `None` means export in the native format.
    fn choose_export_format(&self, type_name: &str, formats: &[FileFormat]) -> Option<FileFormat>;

    /// Confirm replacing entries that already exist.
    ///
    /// `message` is ready for display (singular for one conflict, a count
    /// plus list for many); `conflicts` carries the names for callers that
    /// render their own UI. Applies to every conflict in the batch.
    fn confirm_replace(&self, message: &str, conflicts: &[String]) -> bool;
}

/// Handler that never prompts: native formats, no replacements.
/// Used by the CLI and as a safe default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentInteraction;

impl InteractionHandler for SilentInteraction {
    fn choose_export_format(&self, _type_name: &str, _formats: &[FileFormat]) -> Option<FileFormat> {
        None
    }

    fn confirm_replace(&self, _message: &str, _conflicts: &[String]) -> bool {
        false
    }
}

/// External editor collaborator for edit-in-place.
///
/// `edit` receives a materialized temp file and returns once the user is
/// done with it; the session then re-imports the (possibly changed) bytes.
pub trait ExternalEditor: Send + Sync {
    /// Hand the file to the editor and block until editing finishes.
    ///
    /// # Errors
    /// Returns an error if the editor could not be launched.
    fn edit(&self, path: &Path) -> Result<()>;
}
