//! Offline preview of name cleaning and search variants.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use icolookup_lib::LookupConfig;

use crate::output::{build_normalize_rows, print_rows, OutputFormat};

#[derive(Args)]
pub struct NormalizeArgs {
    /// Company names to normalize
    #[arg(required = true)]
    pub names: Vec<String>,

    /// TOML config file with a custom legal_suffixes list
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &NormalizeArgs, format: OutputFormat) -> Result<()> {
    let config = match &args.config {
        Some(path) => LookupConfig::load(path)?,
        None => LookupConfig::default(),
    }
    .with_env_overrides()?;
    let normalizer = config.normalizer()?;

    let queries: Vec<_> = args.names.iter().map(|n| normalizer.normalize(n)).collect();
    print_rows(&build_normalize_rows(&queries), format)
}
