//! File type detection and conversion dispatch
//!
//! Each entry's real format is decided by a descriptor chosen from a
//! priority-ordered registry, purely as a function of the entry's extension
//! and header bytes. Descriptors expose the alternate formats an entry can
//! be exported to or imported from, the converters between them, and
//! thumbnail extraction for previews.

mod image;
mod raw;
mod text;

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::Result;

pub use image::ImageDescriptor;
pub use raw::{ErrorDescriptor, RawDescriptor};
pub use text::TextDescriptor;

/// Number of header bytes handed to detectors
pub const HEADER_PROBE_LEN: usize = 64;

/// Maximum thumbnail dimension (width or height)
///
/// Kept small so a directory's worth of previews stays cheap to hold.
pub const MAX_THUMBNAIL_SIZE: u32 = 256;

/// One alternate format an entry can be converted to or from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFormat {
    /// Extension without the leading dot, lowercase
    pub extension: String,
    /// Human-readable label for prompts
    pub label: String,
}

impl FileFormat {
    /// Create a format from an extension and label
    #[must_use]
    pub fn new(extension: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            extension: extension.into().to_lowercase(),
            label: label.into(),
        }
    }
}

/// Decoded preview for one entry
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes
    pub rgba: Vec<u8>,
    /// Display fields extracted during decode (label, value)
    pub info: Vec<(String, String)>,
}

/// Pluggable per-file-type logic: detection, conversion and previews.
///
/// Implementations must be pure with respect to the bytes they are given;
/// the session caches the chosen descriptor until an entry's bytes are
/// structurally replaced.
pub trait FileTypeDescriptor: Send + Sync {
    /// Short descriptor name, used for display labels and prompt dedup
    fn name(&self) -> &'static str;

    /// Whether this descriptor claims the entry
    fn matches(&self, extension: &str, header: &[u8]) -> bool;

    /// Formats this type can be imported from (replacement sources)
    fn import_formats(&self, extension: &str) -> Vec<FileFormat>;

    /// Formats this type can be exported to
    fn export_formats(&self, extension: &str) -> Vec<FileFormat>;

    /// Convert native bytes to an alternate format
    ///
    /// # Errors
    /// Returns [`crate::Error::Conversion`] if the bytes cannot be converted.
    fn convert_to(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;

    /// Convert bytes in an alternate format back to the native format
    ///
    /// # Errors
    /// Returns [`crate::Error::Conversion`] if the bytes cannot be converted.
    fn convert_from(
        &self,
        src_ext: &str,
        dst_ext: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;

    /// Decode a preview image plus display fields
    ///
    /// Returns `Ok(None)` for types that have no visual preview.
    ///
    /// # Errors
    /// Returns an error if the bytes claim this type but cannot be decoded.
    fn load_thumbnail(&self, bytes: &[u8], extension: &str) -> Result<Option<Thumbnail>>;

    /// Whether this is the terminal error descriptor entries are downgraded
    /// to when detection or decode fails
    fn is_error(&self) -> bool {
        false
    }
}

/// Priority-ordered detector registry with a raw fallback and an error
/// variant for downgraded entries.
pub struct TypeRegistry {
    detectors: Vec<Arc<dyn FileTypeDescriptor>>,
    fallback: Arc<dyn FileTypeDescriptor>,
    error: Arc<dyn FileTypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry with only the raw fallback and error variant
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            fallback: Arc::new(RawDescriptor),
            error: Arc::new(ErrorDescriptor),
        }
    }

    /// Create a registry with the built-in image and text descriptors
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ImageDescriptor));
        registry.register(Arc::new(TextDescriptor));
        registry
    }

    /// Append a detector. Earlier registrations win ties.
    pub fn register(&mut self, descriptor: Arc<dyn FileTypeDescriptor>) {
        self.detectors.push(descriptor);
    }

    /// Pick the first descriptor that claims the entry, falling back to raw
    #[must_use]
    pub fn detect(&self, extension: &str, header: &[u8]) -> Arc<dyn FileTypeDescriptor> {
        let extension = extension.to_lowercase();
        self.detectors
            .iter()
            .find(|d| d.matches(&extension, header))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// The terminal error descriptor
    #[must_use]
    pub fn error_descriptor(&self) -> Arc<dyn FileTypeDescriptor> {
        Arc::clone(&self.error)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Extension of a file name, lowercase, without the dot
#[must_use]
pub fn extension_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Stem of a file name (name without the final extension)
#[must_use]
pub fn stem_of(name: &str) -> String {
    std::path::Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_string(), |s| s.to_string_lossy().to_string())
}
