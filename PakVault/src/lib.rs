//! # PakVault
//!
//! An archive virtual filesystem and repacking engine: container archives
//! are presented as a browsable, editable directory tree and rewritten back
//! to disk transactionally.
//!
//! ## What it does
//!
//! - **Sessions** - one open archive per [`session::ArchiveSession`]:
//!   exclusive file access, a fully decoded tree, and a single FIFO async
//!   lock serializing every load, mutation and repack.
//! - **Editing** - rename, delete, replace and add entries; replacements
//!   are queued as pending imports and applied at the next repack.
//! - **Repack** - the whole tree plus pending edits is serialized to a
//!   temp file and atomically swapped over the original; the original file
//!   survives any failure before the swap.
//! - **File types** - pluggable descriptors detect each entry's real
//!   format from its header bytes and drive conversions and previews.
//! - **Explorer** - multiple sessions, `<archive>:<sep><path>` addresses,
//!   and cross-archive filename search over advisory snapshots.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pakvault::prelude::*;
//!
//! # async fn run() -> pakvault::Result<()> {
//! let registry = Arc::new(TypeRegistry::with_defaults());
//! let explorer = ExplorerController::new(registry);
//!
//! let session = explorer
//!     .open_archive("Assets.bnd", Arc::new(BundleCodec::new()))
//!     .await?;
//!
//! // Browse and edit.
//! let root = session.root().await;
//! let listing = session.directory_listing(root).await?;
//! println!("{} files at the root", listing.files.len());
//!
//! // Persist every pending edit.
//! let token = tokio_util::sync::CancellationToken::new();
//! session.repack(&token, pakvault::progress::silent()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `pakvault` command-line binary

pub mod codec;
pub mod config;
pub mod error;
pub mod explorer;
pub mod filetype;
pub mod interact;
pub mod progress;
pub mod session;
pub mod thumbnail;
pub mod tree;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::codec::{
        ArchiveCodec, ArchiveHandle, BundleCodec, EntryHandle, EntryMetadata, Generator,
        LoadedArchive, LoadedEntry, RepackFile,
    };
    pub use crate::config::ExplorerConfig;
    pub use crate::error::{Error, Result};
    pub use crate::explorer::{Address, ExplorerController, SearchMatch};
    pub use crate::filetype::{
        FileFormat, FileTypeDescriptor, Thumbnail, TypeRegistry,
    };
    pub use crate::interact::{ExternalEditor, InteractionHandler, SilentInteraction};
    pub use crate::progress::{OpPhase, OpProgress, ProgressCallback};
    pub use crate::session::{
        AddFilesOutcome, ArchiveSession, DirListing, ExportOptions, ExportOutcome,
        ImportOutcome, ListingRow, RepackOutcome, files_under,
    };
    pub use crate::thumbnail::{ThumbnailCache, ThumbnailMode};
    pub use crate::tree::{ArchiveTree, DirId, DirectoryNode, FileEntry, FileId};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
