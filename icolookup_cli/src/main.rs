mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "icolookup")]
#[command(about = "Find Slovak company identifiers (IČO) by name in the RPO registry")]
struct Cli {
    /// Output format: table, json, csv, markdown
    #[arg(long, default_value = "table", global = true)]
    output_format: String,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up identifiers for every name in a CSV file
    Lookup(Box<commands::lookup::LookupArgs>),
    /// Show the cleaned name and search variants for names
    Normalize(commands::normalize::NormalizeArgs),
    /// Check IČO checksums
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("icolookup={}", level).parse()?)
                .add_directive(format!("rpo_api={}", level).parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::parse(&cli.output_format);

    match &cli.command {
        Commands::Lookup(args) => commands::lookup::run(args.as_ref(), format).await?,
        Commands::Normalize(args) => commands::normalize::run(args, format)?,
        Commands::Validate(args) => commands::validate::run(args, format)?,
    }

    Ok(())
}
