//! CLI command for creating a bundle from a directory

use std::path::Path;

use crate::codec::bundle::write_bundle;
use crate::session::files_under;

pub fn execute(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let files = files_under(source)?;

    let mut pairs = Vec::with_capacity(files.len());
    for path in &files {
        let relative = path
            .strip_prefix(source)
            .map_err(|_| anyhow::anyhow!("file escapes source directory: {}", path.display()))?;
        // Bundle paths always use '/'.
        let archive_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        pairs.push((archive_path, std::fs::read(path)?));
    }

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut output = std::fs::File::create(destination)?;
    write_bundle(&mut output, &pairs)?;

    println!("{}: {} files", destination.display(), pairs.len());
    Ok(())
}
