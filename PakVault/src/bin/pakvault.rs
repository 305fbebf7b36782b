//! PakVault command-line binary

fn main() -> anyhow::Result<()> {
    pakvault::cli::run_cli()
}
