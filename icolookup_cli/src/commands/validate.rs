//! Offline IČO checksum validation.

use anyhow::{bail, Result};
use clap::Args;

use crate::output::{build_validate_rows, print_rows, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Identifiers to check; spaces and other separators are ignored
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Exit with an error if any identifier is invalid
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: &ValidateArgs, format: OutputFormat) -> Result<()> {
    let rows = build_validate_rows(&args.ids);
    let invalid = rows.iter().filter(|r| !r.is_valid()).count();
    print_rows(&rows, format)?;
    if args.strict && invalid > 0 {
        bail!("{} of {} identifiers failed validation", invalid, rows.len());
    }
    Ok(())
}
