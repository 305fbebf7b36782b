//! Error types for `PakVault`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `PakVault` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Session Errors ====================
    /// The archive file is held by another process.
    ///
    /// Retryable: close the other process and repeat the operation.
    #[error("archive is locked by another process: {path}")]
    FileLocked {
        /// Path to the archive file.
        path: PathBuf,
    },

    /// A directory or file id refers to a node that no longer exists.
    ///
    /// Ids become stale when their node is deleted or when the tree is
    /// rebuilt after a repack.
    #[error("stale tree id: the node was removed or the tree was reloaded")]
    StaleId,

    /// No archive with the given name is open in the explorer.
    #[error("archive not open: {0}")]
    ArchiveNotOpen(String),

    /// A cross-archive address string could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The session lost its file handle between closing the old archive
    /// and reopening the rewritten one. The session is no longer usable.
    #[error("archive handle lost after repack: {path}")]
    HandleLost {
        /// Path to the archive file.
        path: PathBuf,
    },

    // ==================== Tree Errors ====================
    /// A sibling with the same name (case-insensitive) already exists.
    ///
    /// Rejected before any mutation takes place.
    #[error("name already exists: {name}")]
    NameConflict {
        /// The conflicting name.
        name: String,
    },

    /// The requested entry was not found in the tree.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// The archive format has a fixed directory layout.
    #[error("this archive format does not support directory changes")]
    DirectoriesUnsupported,

    // ==================== File Type / Conversion Errors ====================
    /// The entry's bytes could not be decoded by any registered descriptor.
    ///
    /// The entry is downgraded to the error type for the rest of the load
    /// cycle; delete and native export still work.
    #[error("format detection failed for {name}")]
    FormatDetection {
        /// The entry name.
        name: String,
    },

    /// A per-file format conversion failed.
    ///
    /// Batch operations catch this, fall back to native export and continue.
    #[error("conversion of {name} from .{from} to .{to} failed: {message}")]
    Conversion {
        /// The entry name.
        name: String,
        /// Source extension (without dot).
        from: String,
        /// Target extension (without dot).
        to: String,
        /// Converter error message.
        message: String,
    },

    // ==================== Export / Import Errors ====================
    /// The export destination already exists; nothing was written.
    #[error("export destination already exists: {path}")]
    DestinationExists {
        /// The destination path.
        path: PathBuf,
    },

    // ==================== Repack Errors ====================
    /// Archive serialization or disk swap failed.
    ///
    /// The original file is intact unless the failure occurred strictly
    /// after the disk swap, in which case the tree has been reloaded from
    /// the new file.
    #[error("repack failed: {message}")]
    Repack {
        /// Description of the failing step.
        message: String,
    },

    /// Repack was cancelled before the disk swap began.
    #[error("repack cancelled")]
    RepackCancelled,

    // ==================== Bundle Codec Errors ====================
    /// The file is not a valid bundle archive (missing BNDL magic).
    #[error("invalid bundle magic: expected BNDL")]
    InvalidBundleMagic,

    /// The bundle version is not supported.
    #[error("unsupported bundle version: {version}")]
    UnsupportedBundleVersion {
        /// The version number found in the file.
        version: u32,
    },

    /// A bundle entry's checksum did not match its contents.
    #[error("checksum mismatch for {path}")]
    ChecksumMismatch {
        /// Path of the entry within the bundle.
        path: String,
    },

    /// An entry or table exceeds the format's size limits.
    #[error("{name} is too large: {size} bytes")]
    TooLarge {
        /// What exceeded the limit.
        name: String,
        /// The offending size in bytes.
        size: usize,
    },

    // ==================== Generic/Fallback Errors ====================
    /// Decompression failed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDir(String),

    /// Configuration load/store error.
    #[error("config error: {0}")]
    Config(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// A specialized Result type for `PakVault` operations.
pub type Result<T> = std::result::Result<T, Error>;
