use anyhow::Result;
use icolookup_lib::{is_valid_ico, normalize_identifier, CompanyQuery, LookupResult, RunSummary};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            "markdown" | "md" => Self::Markdown,
            _ => Self::Table,
        }
    }
}

/// Columns appended to every input row in the exported sheet.
pub const EXPORT_COLUMNS: [&str; 7] = [
    "CleanName",
    "ICO",
    "UsedQueryVariant",
    "MatchedFullName",
    "IdentifierType",
    "MatchStrategy",
    "Notes",
];

#[derive(Tabled, Serialize)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    #[serde(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Tabled, Serialize)]
pub struct NormalizeRow {
    #[tabled(rename = "Input")]
    #[serde(rename = "Input")]
    input: String,
    #[tabled(rename = "Clean Name")]
    #[serde(rename = "Clean Name")]
    clean_name: String,
    #[tabled(rename = "Variants")]
    #[serde(rename = "Variants")]
    variants: String,
}

#[derive(Tabled, Serialize)]
pub struct ValidateRow {
    #[tabled(rename = "Input")]
    #[serde(rename = "Input")]
    input: String,
    #[tabled(rename = "ICO")]
    #[serde(rename = "ICO")]
    normalized: String,
    #[tabled(rename = "Valid")]
    #[serde(rename = "Valid")]
    valid: bool,
}

impl ValidateRow {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

// -- Row builders --

pub fn build_summary_rows(summary: &RunSummary) -> Vec<SummaryRow> {
    let row = |metric: &str, value: String| SummaryRow {
        metric: metric.to_string(),
        value,
    };
    vec![
        row("Rows", summary.attempted.to_string()),
        row("Matched", summary.succeeded.to_string()),
        row("Not found", summary.not_found.to_string()),
        row("Failed after retry", summary.failed_after_retry.to_string()),
        row("Failed permanently", summary.failed_permanently.to_string()),
        row("Cancelled", summary.cancelled.to_string()),
        row("Success rate", format!("{:.1}%", summary.success_rate())),
        row("Requests", summary.requests_made.to_string()),
        row("Failed requests", summary.failed_requests.to_string()),
        row("Retries", summary.retries.to_string()),
        row("Backoff", format_duration(summary.backoff.as_secs_f64())),
        row("Duration", format_duration(summary.duration.as_secs_f64())),
        row("Avg per row", format!("{:.2}s", summary.avg_secs_per_row())),
        row("Rows per minute", format!("{:.1}", summary.rows_per_minute())),
    ]
}

pub fn build_normalize_rows(queries: &[CompanyQuery]) -> Vec<NormalizeRow> {
    queries
        .iter()
        .map(|q| NormalizeRow {
            input: q.raw_name.clone(),
            clean_name: q.clean_name.clone(),
            variants: q.variants.join(" | "),
        })
        .collect()
}

pub fn build_validate_rows(inputs: &[String]) -> Vec<ValidateRow> {
    inputs
        .iter()
        .map(|raw| {
            let normalized = normalize_identifier(raw);
            ValidateRow {
                input: raw.clone(),
                valid: normalized.as_deref().is_some_and(is_valid_ico),
                normalized: normalized.unwrap_or_default(),
            }
        })
        .collect()
}

/// Values for [`EXPORT_COLUMNS`], in the same order.
pub fn export_fields(result: &LookupResult) -> [String; 7] {
    [
        result.clean_name.clone(),
        result.identifier.clone().unwrap_or_default(),
        result.used_variant.clone(),
        result.matched_full_name.clone().unwrap_or_default(),
        result.identifier_type.to_string(),
        result.match_strategy.to_string(),
        result.notes.clone(),
    ]
}

// -- Rendering --

pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => println!("{}", markdown_table(rows)),
        OutputFormat::Csv => print_csv(rows)?,
        OutputFormat::Json => print_json(rows),
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        // the typed summary carries timestamps the table flattens away
        OutputFormat::Json => {
            print_json(summary);
            Ok(())
        }
        _ => print_rows(&build_summary_rows(summary), format),
    }
}

fn markdown_table<T: Tabled>(rows: &[T]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::markdown());
    table.to_string()
}

fn print_csv<T: Serialize>(rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_json<T: serde::Serialize + ?Sized>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_duration(secs: f64) -> String {
    if secs >= 3600.0 {
        format!("{}h {}m", (secs / 3600.0) as u64, ((secs % 3600.0) / 60.0) as u64)
    } else if secs >= 60.0 {
        format!("{}m {}s", (secs / 60.0) as u64, (secs % 60.0) as u64)
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use icolookup_lib::{IdentifierType, MatchStrategy, NameNormalizer};
    use std::time::Duration;

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary {
            attempted: 10,
            succeeded: 7,
            not_found: 2,
            failed_permanently: 0,
            failed_after_retry: 1,
            cancelled: 0,
            requests_made: 14,
            failed_requests: 3,
            retries: 2,
            backoff: Duration::from_secs(3),
            started_at: now,
            finished_at: now,
            duration: Duration::from_secs(95),
        }
    }

    fn csv_from_rows<T: Serialize>(rows: &[T]) -> String {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row).unwrap();
        }
        wtr.flush().unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("CSV"), OutputFormat::Csv);
        assert_eq!(OutputFormat::parse("md"), OutputFormat::Markdown);
        assert_eq!(OutputFormat::parse("whatever"), OutputFormat::Table);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(95.0), "1m 35s");
        assert_eq!(format_duration(7260.0), "2h 1m");
    }

    #[test]
    fn test_build_summary_rows() {
        let rows = build_summary_rows(&summary());
        assert_eq!(rows[0].metric, "Rows");
        assert_eq!(rows[0].value, "10");
        let rate = rows.iter().find(|r| r.metric == "Success rate").unwrap();
        assert_eq!(rate.value, "70.0%");
        let duration = rows.iter().find(|r| r.metric == "Duration").unwrap();
        assert_eq!(duration.value, "1m 35s");
        let failed = rows.iter().find(|r| r.metric == "Failed requests").unwrap();
        assert_eq!(failed.value, "3");
        let backoff = rows.iter().find(|r| r.metric == "Backoff").unwrap();
        assert_eq!(backoff.value, "3.0s");
    }

    #[test]
    fn test_build_normalize_rows() {
        let normalizer = NameNormalizer::default();
        let queries = vec![normalizer.normalize("Žilinská teplárenská, a.s.")];
        let rows = build_normalize_rows(&queries);
        assert_eq!(rows[0].clean_name, "Žilinská teplárenská");
        assert_eq!(
            rows[0].variants,
            "Žilinská teplárenská | Zilinska teplarenska | Žilinská teplárenská, a.s."
        );
    }

    #[test]
    fn test_build_validate_rows() {
        let rows = build_validate_rows(&[
            "31322832".to_string(),
            "35 763 469".to_string(),
            "31322833".to_string(),
            "abc".to_string(),
        ]);
        assert!(rows[0].valid);
        assert!(rows[1].valid);
        assert_eq!(rows[1].normalized, "35763469");
        assert!(!rows[2].valid);
        assert!(!rows[3].valid);
        assert_eq!(rows[3].normalized, "");
    }

    #[test]
    fn test_export_fields_matched() {
        let result = LookupResult {
            clean_name: "Slovnaft".into(),
            used_variant: "Slovnaft".into(),
            identifier: Some("31322832".into()),
            matched_full_name: Some("SLOVNAFT, a.s.".into()),
            identifier_type: IdentifierType::PrimaryId,
            match_strategy: MatchStrategy::Exact,
            name_similarity: Some(1.0),
            notes: String::new(),
        };
        assert_eq!(
            export_fields(&result),
            [
                "Slovnaft",
                "31322832",
                "Slovnaft",
                "SLOVNAFT, a.s.",
                "PRIMARY_ID",
                "EXACT",
                ""
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_export_fields_unmatched() {
        let fields = export_fields(&LookupResult::unmatched("Firma", "no candidates for any variant"));
        assert_eq!(fields[1], "");
        assert_eq!(fields[4], "NONE");
        assert_eq!(fields[5], "NONE");
        assert_eq!(fields[6], "no candidates for any variant");
    }

    #[test]
    fn test_csv_validate_headers() {
        let rows = build_validate_rows(&["31322832".to_string()]);
        let csv = csv_from_rows(&rows);
        assert_eq!(csv.lines().next().unwrap(), "Input,ICO,Valid");
        assert_eq!(csv.lines().nth(1).unwrap(), "31322832,31322832,true");
    }

    #[test]
    fn test_markdown_summary_structure() {
        let md = markdown_table(&build_summary_rows(&summary()));
        assert!(md.contains('|'));
        assert!(md.contains("---"));
        assert!(md.lines().next().unwrap().contains("Metric"));
    }

    #[test]
    fn test_json_summary_serializable() {
        let val = serde_json::to_value(summary()).unwrap();
        assert_eq!(val["attempted"], 10);
        assert_eq!(val["duration_secs"], 95.0);
    }
}
