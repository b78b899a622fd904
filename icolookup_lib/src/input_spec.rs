//! Choosing which sheet and column hold the company names.
//!
//! Resolution is pure: callers pass what the workbook offers and what the user
//! asked for, and get back either a definite choice or a reason to ask again.

use serde::Serialize;
use thiserror::Error;

/// Column looked for when the user names none.
pub const DEFAULT_COLUMN: &str = "Firma";

/// What the user asked for. Each part is a name or a 1-based index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputChoice {
    pub sheet: Option<String>,
    pub column: Option<String>,
}

/// A resolved sheet and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    pub sheet: String,
    pub column: String,
    /// 0-based positions in the lists that were passed in.
    pub sheet_index: usize,
    pub column_index: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputSpecError {
    #[error("input has no sheets")]
    NoSheets,
    #[error("sheet '{0}' has no columns")]
    NoColumns(String),
    #[error("unknown {kind} '{requested}', available: {}", .available.join(", "))]
    Unknown {
        kind: &'static str,
        requested: String,
        available: Vec<String>,
    },
    #[error("no 'Firma' column, choose one of: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

/// Resolves the user's choice against the available sheets and columns.
///
/// A requested name matches exactly first, then case-insensitively, then as a
/// 1-based index. Without a request the first sheet is used, and the
/// `Firma` column, or the only column if there is just one.
pub fn resolve_input_spec(
    sheets: &[String],
    columns: &[String],
    choice: &InputChoice,
) -> Result<InputSpec, InputSpecError> {
    if sheets.is_empty() {
        return Err(InputSpecError::NoSheets);
    }
    let sheet_index = match &choice.sheet {
        Some(requested) => find(sheets, requested, "sheet")?,
        None => 0,
    };
    let sheet = sheets[sheet_index].clone();

    if columns.is_empty() {
        return Err(InputSpecError::NoColumns(sheet));
    }
    let column_index = match &choice.column {
        Some(requested) => find(columns, requested, "column")?,
        None => match position(columns, DEFAULT_COLUMN) {
            Some(i) => i,
            None if columns.len() == 1 => 0,
            None => return Err(InputSpecError::Ambiguous(columns.to_vec())),
        },
    };

    Ok(InputSpec {
        sheet,
        column: columns[column_index].clone(),
        sheet_index,
        column_index,
    })
}

fn position(available: &[String], requested: &str) -> Option<usize> {
    let requested = requested.trim();
    available
        .iter()
        .position(|a| a.trim() == requested)
        .or_else(|| {
            let lower = requested.to_lowercase();
            available.iter().position(|a| a.trim().to_lowercase() == lower)
        })
}

fn find(available: &[String], requested: &str, kind: &'static str) -> Result<usize, InputSpecError> {
    if let Some(i) = position(available, requested) {
        return Ok(i);
    }
    match requested.trim().parse::<usize>() {
        Ok(n) if (1..=available.len()).contains(&n) => Ok(n - 1),
        _ => Err(InputSpecError::Unknown {
            kind,
            requested: requested.to_string(),
            available: available.to_vec(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Excellent,
    Good,
    Poor,
}

/// Fill statistics for the chosen column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub total: usize,
    pub non_empty: usize,
    pub empty_pct: f64,
    pub quality: DataQuality,
}

impl ColumnStats {
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (total, non_empty) = values.into_iter().fold((0, 0), |(t, n), v| {
            (t + 1, if v.trim().is_empty() { n } else { n + 1 })
        });
        let empty_pct = if total == 0 {
            0.0
        } else {
            (total - non_empty) as f64 / total as f64 * 100.0
        };
        let quality = if empty_pct < 5.0 {
            DataQuality::Excellent
        } else if empty_pct < 20.0 {
            DataQuality::Good
        } else {
            DataQuality::Poor
        };
        Self {
            total,
            non_empty,
            empty_pct,
            quality,
        }
    }

    /// A line worth showing the user before the run, if any.
    pub fn warning(&self) -> Option<String> {
        let empty = self.total - self.non_empty;
        if self.non_empty == 0 {
            Some("column is completely empty".to_string())
        } else if self.empty_pct > 20.0 {
            Some(format!(
                "column has {} empty values out of {} ({:.1}%)",
                empty, self.total, self.empty_pct
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn choice(sheet: Option<&str>, column: Option<&str>) -> InputChoice {
        InputChoice {
            sheet: sheet.map(str::to_string),
            column: column.map(str::to_string),
        }
    }

    #[test]
    fn defaults_to_first_sheet_and_firma() {
        let spec = resolve_input_spec(
            &names(&["Hárok1", "Hárok2"]),
            &names(&["Por.", "Firma", "Mesto"]),
            &InputChoice::default(),
        )
        .unwrap();
        assert_eq!(spec.sheet, "Hárok1");
        assert_eq!(spec.column, "Firma");
        assert_eq!(spec.column_index, 1);
    }

    #[test]
    fn sole_column_is_chosen() {
        let spec =
            resolve_input_spec(&names(&["data"]), &names(&["Názov"]), &InputChoice::default()).unwrap();
        assert_eq!(spec.column, "Názov");
    }

    #[test]
    fn ambiguous_without_firma() {
        let err = resolve_input_spec(
            &names(&["data"]),
            &names(&["Názov", "Mesto"]),
            &InputChoice::default(),
        )
        .unwrap_err();
        assert_eq!(err, InputSpecError::Ambiguous(names(&["Názov", "Mesto"])));
    }

    #[test]
    fn by_name_case_insensitive_and_index() {
        let sheets = names(&["Hárok1", "Zoznam"]);
        let columns = names(&["Por.", "Názov firmy"]);

        let spec = resolve_input_spec(&sheets, &columns, &choice(Some("zoznam"), Some("NÁZOV FIRMY"))).unwrap();
        assert_eq!(spec.sheet_index, 1);
        assert_eq!(spec.column_index, 1);

        let spec = resolve_input_spec(&sheets, &columns, &choice(Some("2"), Some("1"))).unwrap();
        assert_eq!(spec.sheet, "Zoznam");
        assert_eq!(spec.column, "Por.");
    }

    #[test]
    fn unknown_and_out_of_range() {
        let sheets = names(&["data"]);
        let columns = names(&["Firma"]);
        assert!(matches!(
            resolve_input_spec(&sheets, &columns, &choice(None, Some("Meno"))),
            Err(InputSpecError::Unknown { kind: "column", .. })
        ));
        assert!(matches!(
            resolve_input_spec(&sheets, &columns, &choice(Some("3"), None)),
            Err(InputSpecError::Unknown { kind: "sheet", .. })
        ));
        assert!(resolve_input_spec(&sheets, &columns, &choice(None, Some("0"))).is_err());
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(
            resolve_input_spec(&[], &names(&["Firma"]), &InputChoice::default()),
            Err(InputSpecError::NoSheets)
        );
        assert_eq!(
            resolve_input_spec(&names(&["data"]), &[], &InputChoice::default()),
            Err(InputSpecError::NoColumns("data".into()))
        );
    }

    #[test]
    fn column_quality_labels() {
        let full = ColumnStats::from_values(vec!["A"; 20]);
        assert_eq!(full.quality, DataQuality::Excellent);
        assert!(full.warning().is_none());

        let mut values = vec!["A"; 9];
        values.push("  ");
        let good = ColumnStats::from_values(values);
        assert_eq!(good.non_empty, 9);
        assert_eq!(good.quality, DataQuality::Good);

        let poor = ColumnStats::from_values(["A", "", "", "B"]);
        assert_eq!(poor.quality, DataQuality::Poor);
        assert!(poor.warning().unwrap().contains("2 empty values out of 4"));

        let empty = ColumnStats::from_values(["", ""]);
        assert_eq!(empty.warning().as_deref(), Some("column is completely empty"));
    }
}
