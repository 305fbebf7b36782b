use std::path::PathBuf;

use clap::Subcommand;

pub mod create;
pub mod export;
pub mod list;
pub mod repack;

#[derive(Subcommand)]
pub enum Commands {
    /// List the contents of a bundle archive
    List {
        /// Source bundle file
        #[arg(short, long)]
        source: PathBuf,

        /// Show sizes and modification state
        #[arg(short, long)]
        detailed: bool,
    },

    /// Create a bundle archive from a directory
    Create {
        /// Source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output bundle file
        #[arg(short, long)]
        destination: PathBuf,
    },

    /// Export a bundle archive's files to a directory
    Export {
        /// Source bundle file
        #[arg(short, long)]
        source: PathBuf,

        /// Target directory (the archive name becomes a subdirectory)
        #[arg(short, long)]
        destination: PathBuf,
    },

    /// Rewrite a bundle archive in place (recompresses every entry)
    Repack {
        /// Bundle file to rewrite
        #[arg(short, long)]
        source: PathBuf,
    },
}

impl Commands {
    /// Execute the selected command
    ///
    /// # Errors
    /// Returns any error from the underlying operation.
    pub fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::List { source, detailed } => list::execute(&source, detailed),
            Commands::Create {
                source,
                destination,
            } => create::execute(&source, &destination),
            Commands::Export {
                source,
                destination,
            } => export::execute(&source, &destination),
            Commands::Repack { source } => repack::execute(&source),
        }
    }
}

/// Build the runtime the async session commands run on
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
