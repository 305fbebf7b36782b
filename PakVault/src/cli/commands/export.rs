//! CLI command for exporting a bundle's files

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::progress::{operation_bar, update_bar};
use crate::codec::BundleCodec;
use crate::filetype::TypeRegistry;
use crate::interact::SilentInteraction;
use crate::session::{ArchiveSession, ExportOptions};

pub fn execute(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let runtime = super::runtime()?;
    runtime.block_on(async {
        let session = ArchiveSession::open(
            source,
            Arc::new(BundleCodec::new()),
            Arc::new(TypeRegistry::with_defaults()),
        )
        .await?;

        let bar = operation_bar();
        let root = session.root().await;
        let outcome = session
            .export_directory(
                root,
                destination,
                ExportOptions {
                    recursive: true,
                    selected_only: false,
                    force_native: true,
                },
                &SilentInteraction,
                &CancellationToken::new(),
                &|progress| update_bar(&bar, progress),
            )
            .await?;
        bar.finish_and_clear();

        println!(
            "exported {} files to {}",
            outcome.exported,
            outcome.destination.display()
        );
        for (path, error) in &outcome.errors {
            eprintln!("failed: {path}: {error}");
        }
        Ok(())
    })
}
