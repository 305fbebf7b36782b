//! Archive codec abstraction
//!
//! A codec understands one container format: it parses the raw archive into
//! an ordered list of directory groups and entry handles, and serializes a
//! tree (plus any pending edits) back into archive bytes. Everything the
//! codec knows about an entry's on-disk location lives behind opaque
//! handles, so the tree never depends on a particular format's layout.

pub mod bundle;

use std::any::Any;
use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::progress::ProgressCallback;

pub use bundle::BundleCodec;

/// Trait for streams that can Read and Seek
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Trait for streams that can Write and Seek
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

/// Opaque per-archive state owned by the codec.
pub struct ArchiveHandle(Box<dyn Any + Send>);

/// Opaque per-entry state owned by the codec.
///
/// Identifies a file's location within the archive. Handles become invalid
/// once the archive is rewritten; the session rebuilds the tree (and all
/// handles) after every successful repack.
pub struct EntryHandle(Box<dyn Any + Send>);

/// Opaque codec context carried from load to write, so rewriting can reuse
/// archive-level data gathered during the last load.
pub struct Generator(Box<dyn Any + Send>);

macro_rules! opaque_handle {
    ($name:ident) => {
        impl $name {
            /// Wrap a codec-private value.
            pub fn new<T: Any + Send>(value: T) -> Self {
                Self(Box::new(value))
            }

            /// Borrow the codec-private value, if it has the expected type.
            #[must_use]
            pub fn downcast_ref<T: Any + Send>(&self) -> Option<&T> {
                self.0.downcast_ref()
            }

            /// Mutably borrow the codec-private value, if it has the
            /// expected type.
            pub fn downcast_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
                self.0.downcast_mut()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }
    };
}

opaque_handle!(ArchiveHandle);
opaque_handle!(EntryHandle);
opaque_handle!(Generator);

/// One entry as reported by the codec during load.
#[derive(Debug)]
pub struct LoadedEntry {
    /// File name (last path segment).
    pub name: String,
    /// Codec-owned handle for the entry.
    pub handle: EntryHandle,
}

/// The structured result of decoding an archive's entry table.
#[derive(Debug)]
pub struct LoadedArchive {
    /// Ordered groups of `(directory_path, entries)`. An empty path denotes
    /// files that live directly in the archive root. Paths use the codec's
    /// separator character.
    pub directories: Vec<(String, Vec<LoadedEntry>)>,
    /// Context for the next [`ArchiveCodec::write_archive`] call.
    pub generator: Generator,
}

/// Display metadata for an entry.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    /// File name as stored in the archive.
    pub name: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// Extra codec-specific fields for display (label, value).
    pub fields: Vec<(String, String)>,
}

/// One file scheduled for a repack write.
pub struct RepackFile<'a> {
    /// Full path within the archive, joined with the codec's separator.
    pub path: String,
    /// The entry's current handle (stale location in the old archive).
    pub handle: &'a EntryHandle,
    /// Pending replacement bytes, if the entry was edited this session.
    pub pending: Option<&'a [u8]>,
}

/// Format-specific archive codec.
///
/// All methods are synchronous; the session serializes calls through its
/// exclusive lock and runs them on worker threads.
pub trait ArchiveCodec: Send + Sync {
    /// Codec name for logging and CLI listings.
    fn name(&self) -> &'static str;

    /// Parse the archive header and build per-archive state.
    ///
    /// # Errors
    /// Returns an error if the stream is not a valid archive of this format.
    fn load_archive(&self, stream: &mut dyn ReadSeek, name: &str) -> Result<ArchiveHandle>;

    /// Decode the entry table into ordered directory groups.
    ///
    /// # Errors
    /// Returns an error if the table cannot be read or decompressed.
    fn load_archive_data(
        &self,
        archive: &mut ArchiveHandle,
        stream: &mut dyn ReadSeek,
        name: &str,
    ) -> Result<LoadedArchive>;

    /// Serialize the given files into a complete new archive.
    ///
    /// `source` is the currently open archive; entries without pending bytes
    /// are decoded from it. The output stream is a fresh temporary file.
    ///
    /// # Errors
    /// Returns an error if any entry cannot be decoded or written. The
    /// output stream is discarded by the caller on failure.
    fn write_archive(
        &self,
        generator: &mut Generator,
        archive: &mut ArchiveHandle,
        source: &mut dyn ReadSeek,
        output: &mut dyn WriteSeek,
        files: &[RepackFile<'_>],
        progress: ProgressCallback<'_>,
    ) -> Result<()>;

    /// Create a handle for a brand-new entry with no stored bytes yet.
    ///
    /// # Errors
    /// Returns an error if the codec rejects the name or directory.
    fn new_entry(
        &self,
        archive: &mut ArchiveHandle,
        dir_path: &str,
        name: &str,
    ) -> Result<EntryHandle>;

    /// Decoded size of the entry in bytes.
    fn entry_size(&self, entry: &EntryHandle) -> u64;

    /// Display metadata for the entry.
    fn entry_metadata(&self, entry: &EntryHandle) -> EntryMetadata;

    /// Read and decode the entry's current bytes from the archive stream.
    ///
    /// # Errors
    /// Returns an error if the bytes cannot be read or decompressed.
    fn decode_entry(&self, entry: &EntryHandle, stream: &mut dyn ReadSeek) -> Result<Vec<u8>>;

    /// Encode replacement bytes for an entry.
    ///
    /// Returns the number of bytes written to `output`. A return of zero
    /// means the codec performs no import-time encoding and the caller
    /// should pass the input through unmodified; a codec returning zero
    /// must not have consumed the input.
    ///
    /// # Errors
    /// Returns an error if encoding fails mid-stream.
    fn encode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        entry: &EntryHandle,
        metadata: &EntryMetadata,
    ) -> Result<u64>;

    /// Whether the format supports creating and deleting directories.
    fn can_modify_directories(&self) -> bool;

    /// The path separator used inside this archive format.
    fn path_separator(&self) -> char;

    /// Hook run against the rewritten archive file(s) after serialization,
    /// before the disk swap.
    ///
    /// # Errors
    /// Returns an error to abort the repack; the original file is untouched.
    fn on_repacked(
        &self,
        paths: &[std::path::PathBuf],
        progress: ProgressCallback<'_>,
    ) -> Result<()> {
        let _ = (paths, progress);
        Ok(())
    }
}
