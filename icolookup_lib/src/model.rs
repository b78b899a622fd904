//! Data types shared by the lookup pipeline.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One input row after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyQuery {
    /// The name as supplied by the caller.
    pub raw_name: String,
    /// Legal suffix stripped, whitespace collapsed, original casing kept.
    pub clean_name: String,
    /// Search strings in priority order. Never empty.
    pub variants: Vec<String>,
}

/// A registry record reduced to what matching needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCandidate {
    pub identifier: String,
    pub full_name: String,
    pub is_active: bool,
    /// Registered termination date, when the registry reports one.
    #[serde(default)]
    pub terminated_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    /// A well-formed IČO that passes the mod-11 check.
    PrimaryId,
    /// Some identifier was found but it is not a valid IČO.
    Other,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStrategy {
    /// The registry name equals the query once case, diacritics and legal form are ignored.
    Exact,
    /// No exact name match; the registry's top-ranked record was taken.
    FirstCandidate,
    None,
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryId => "PRIMARY_ID",
            Self::Other => "OTHER",
            Self::None => "NONE",
        })
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "EXACT",
            Self::FirstCandidate => "FIRST_CANDIDATE",
            Self::None => "NONE",
        })
    }
}

/// Per-row outcome handed to the export stage.
///
/// `identifier` is set exactly when `match_strategy` is not `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub clean_name: String,
    /// The variant that produced the winning candidate; empty when nothing matched.
    pub used_variant: String,
    pub identifier: Option<String>,
    pub matched_full_name: Option<String>,
    pub identifier_type: IdentifierType,
    pub match_strategy: MatchStrategy,
    /// Jaro-Winkler similarity of the folded query and matched name, for review.
    pub name_similarity: Option<f64>,
    pub notes: String,
}

impl LookupResult {
    /// A row that produced no identifier.
    pub fn unmatched(clean_name: &str, notes: impl Into<String>) -> Self {
        Self {
            clean_name: clean_name.to_string(),
            used_variant: String::new(),
            identifier: None,
            matched_full_name: None,
            identifier_type: IdentifierType::None,
            match_strategy: MatchStrategy::None,
            name_similarity: None,
            notes: notes.into(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.match_strategy != MatchStrategy::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_row_upholds_invariant() {
        let r = LookupResult::unmatched("Firma", "no candidates");
        assert!(!r.is_match());
        assert!(r.identifier.is_none());
        assert_eq!(r.identifier_type, IdentifierType::None);
        assert_eq!(r.used_variant, "");
    }

    #[test]
    fn enums_serialize_as_labels() {
        assert_eq!(
            serde_json::to_string(&MatchStrategy::FirstCandidate).unwrap(),
            "\"FIRST_CANDIDATE\""
        );
        assert_eq!(
            serde_json::to_string(&IdentifierType::PrimaryId).unwrap(),
            "\"PRIMARY_ID\""
        );
        assert_eq!(MatchStrategy::Exact.to_string(), "EXACT");
        assert_eq!(IdentifierType::Other.to_string(), "OTHER");
    }
}
