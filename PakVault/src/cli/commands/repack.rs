//! CLI command for rewriting a bundle in place

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::progress::{operation_bar, update_bar};
use crate::codec::BundleCodec;
use crate::filetype::TypeRegistry;
use crate::session::ArchiveSession;

pub fn execute(source: &Path) -> anyhow::Result<()> {
    let runtime = super::runtime()?;
    runtime.block_on(async {
        let session = ArchiveSession::open(
            source,
            Arc::new(BundleCodec::new()),
            Arc::new(TypeRegistry::with_defaults()),
        )
        .await?;

        let bar = operation_bar();
        let outcome = session
            .repack(&CancellationToken::new(), &|progress| {
                update_bar(&bar, progress);
            })
            .await?;
        bar.finish_and_clear();

        println!(
            "repacked {}: {} files written",
            source.display(),
            outcome.files_written
        );
        Ok(())
    })
}
