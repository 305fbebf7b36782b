//! CLI command for listing bundle contents

use std::path::Path;
use std::sync::Arc;

use crate::codec::BundleCodec;
use crate::filetype::TypeRegistry;
use crate::session::ArchiveSession;

/// Format byte size for human-readable output
fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}

pub fn execute(source: &Path, detailed: bool) -> anyhow::Result<()> {
    let runtime = super::runtime()?;
    runtime.block_on(async {
        let session = ArchiveSession::open(
            source,
            Arc::new(BundleCodec::new()),
            Arc::new(TypeRegistry::with_defaults()),
        )
        .await?;

        let rows = session.listing_snapshot();
        for row in &rows {
            if detailed {
                println!("{:>8}  {}", format_size(row.size), row.path);
            } else {
                println!("{}", row.path);
            }
        }
        println!("{} files", rows.len());
        Ok(())
    })
}
