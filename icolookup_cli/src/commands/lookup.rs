//! Batch IČO lookup for a CSV export of a company list.
//!
//! Reads the name column, runs every name through the registry with the
//! configured worker pool and rate limit, and writes the input rows back out
//! with the result columns appended as `<stem>_s_ICO.csv`.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use csv::StringRecord;
use icolookup_lib::{
    resolve_input_spec, BatchProgress, ColumnStats, InputChoice, LookupConfig, LookupCoordinator,
    LookupResult, ProgressSink, RowProgress,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{export_fields, print_summary, OutputFormat, EXPORT_COLUMNS};

#[derive(Args)]
pub struct LookupArgs {
    /// Input CSV file with a header row
    #[arg(long, short)]
    pub input: PathBuf,

    /// Column holding company names, by name or 1-based index (default: Firma)
    #[arg(long)]
    pub column: Option<String>,

    /// Sheet to read, by name or 1-based index (a CSV file is a single sheet named after the file)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Output CSV path (default: <input stem>_s_ICO.csv next to the input)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Also write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// TOML config file; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Concurrent lookup workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Requests allowed per rate-limit window
    #[arg(long)]
    pub rate: Option<u64>,

    /// Rate-limit window length in seconds
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Attempts per search, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Rows per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Include dissolved entities in registry searches
    #[arg(long)]
    pub include_inactive: bool,

    /// Registry API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Defaults, then the config file, then `ICOLOOKUP_*` variables, then flags.
pub fn build_config(args: &LookupArgs) -> Result<LookupConfig> {
    build_config_with(args, |key| std::env::var(key).ok())
}

/// [`build_config`] with the environment lookup supplied by the caller.
pub fn build_config_with<F>(args: &LookupArgs, env: F) -> Result<LookupConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match &args.config {
        Some(path) => LookupConfig::load(path)?,
        None => LookupConfig::default(),
    };
    let mut config = config
        .with_overrides(env)
        .context("invalid ICOLOOKUP_* environment variable")?;

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(rate) = args.rate {
        config.max_requests = rate;
    }
    if let Some(window) = args.window_secs {
        config.window_secs = window;
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    if let Some(attempts) = args.retries {
        config.max_attempts = attempts;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.include_inactive {
        config.only_active = false;
    }
    if let Some(ref url) = args.base_url {
        config.base_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

/// `data.csv` becomes `data_s_ICO.csv` in the same directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_s_ICO.csv", stem))
}

pub struct InputTable {
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
}

pub fn read_input(path: &Path) -> Result<InputTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(InputTable { headers, records })
}

/// Writes the input rows with the result columns appended, row for row.
pub fn write_export(path: &Path, input: &InputTable, results: &[LookupResult]) -> Result<()> {
    if input.records.len() != results.len() {
        bail!(
            "result count {} does not match row count {}",
            results.len(),
            input.records.len()
        );
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    // Rows longer than the header keep their extra fields under generated names
    let width = input
        .records
        .iter()
        .map(StringRecord::len)
        .fold(input.headers.len(), usize::max);
    let mut header: Vec<String> = input.headers.clone();
    if width > header.len() {
        let long_rows = input
            .records
            .iter()
            .filter(|r| r.len() > input.headers.len())
            .count();
        tracing::warn!(
            "{} row(s) have more fields than the header; extra fields kept as Column{}..Column{}",
            long_rows,
            header.len() + 1,
            width
        );
        header.extend((header.len() + 1..=width).map(|i| format!("Column{}", i)));
    }
    header.extend(EXPORT_COLUMNS.iter().map(|c| c.to_string()));
    wtr.write_record(&header)?;

    for (record, result) in input.records.iter().zip(results) {
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        row.extend(export_fields(result));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Drives an indicatif bar from coordinator progress.
struct BarProgress {
    pb: ProgressBar,
    matched: usize,
}

impl ProgressSink for BarProgress {
    fn on_row(&mut self, progress: &RowProgress<'_>) {
        if progress.result.is_match() {
            self.matched += 1;
        }
        self.pb.set_position(progress.completed as u64);
        self.pb
            .set_message(format!("{} matched, {} without ICO", self.matched, progress.completed - self.matched));
    }

    fn on_batch(&mut self, progress: &BatchProgress) {
        self.pb.println(format!(
            "  batch {}/{} done: {}/{} rows, {} matched, {:.0}s elapsed",
            progress.batch,
            progress.batches,
            progress.completed,
            progress.total,
            progress.succeeded,
            progress.elapsed.as_secs_f64()
        ));
    }
}

pub async fn run(args: &LookupArgs, format: OutputFormat) -> Result<()> {
    let config = build_config(args)?;
    tracing::debug!("Effective config: {:?}", config);
    let input = read_input(&args.input)?;

    let sheet = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let choice = InputChoice {
        sheet: args.sheet.clone(),
        column: args.column.clone(),
    };
    let spec = resolve_input_spec(&[sheet], &input.headers, &choice)?;

    let names: Vec<String> = input
        .records
        .iter()
        .map(|r| r.get(spec.column_index).unwrap_or("").to_string())
        .collect();
    if names.is_empty() {
        eprintln!("No rows in {}", args.input.display());
        return Ok(());
    }

    let stats = ColumnStats::from_values(names.iter().map(String::as_str));
    eprintln!(
        "Column '{}': {} rows, {} non-empty ({:?} data quality)",
        spec.column, stats.total, stats.non_empty, stats.quality
    );
    if let Some(warning) = stats.warning() {
        eprintln!("Warning: {}", warning);
    }
    if stats.non_empty == 0 {
        bail!("column '{}' has no company names", spec.column);
    }

    let coordinator = LookupCoordinator::from_config(&config)?;
    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing rows in flight...");
            cancel.cancel();
        }
    });

    eprintln!(
        "Looking up {} names with {} workers, {} requests per {}s",
        names.len(),
        config.workers,
        config.max_requests,
        config.window_secs
    );

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta}) {msg}",
        )
        .context("invalid progress bar template")?,
    );
    pb.set_message("looking up...");
    let mut sink = BarProgress { pb, matched: 0 };

    let queries = coordinator.normalize(&names);
    let (results, summary) = coordinator.run_with_progress(queries, &mut sink).await;
    sink.pb.finish_with_message(format!(
        "done: {} of {} matched",
        summary.succeeded, summary.attempted
    ));

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_export(&output_path, &input, &results)?;
    eprintln!("Wrote {}", output_path.display());

    if let Some(ref path) = args.summary_json {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)?;
        eprintln!("Wrote summary to {}", path.display());
    }

    print_summary(&summary, format)
}
