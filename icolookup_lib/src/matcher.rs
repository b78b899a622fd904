//! Choosing one identifier per row from the candidates each variant returned.

use serde::Serialize;

use crate::error::RegistryError;
use crate::identifier::is_valid_ico;
use crate::model::{ApiCandidate, CompanyQuery, IdentifierType, LookupResult, MatchStrategy};
use crate::normalize::NameNormalizer;
use crate::registry::SearchOutcome;

/// One variant that was actually sent, with what came back.
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub variant: String,
    pub result: Result<SearchOutcome, RegistryError>,
}

impl VariantOutcome {
    pub(crate) fn retries(&self) -> u32 {
        match &self.result {
            Ok(outcome) => outcome.retries,
            Err(err) => err.attempts().saturating_sub(1),
        }
    }

    fn describe_failure(&self) -> String {
        match &self.result {
            Ok(outcome) if outcome.candidates.is_empty() => {
                format!("'{}': no candidates", self.variant)
            }
            Ok(_) => format!("'{}': ok", self.variant),
            Err(err) => format!("'{}': {}", self.variant, err),
        }
    }
}

/// How a row ended, for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Matched,
    /// Every variant came back empty without errors.
    NotFound,
    FailedAfterRetry,
    FailedPermanently,
    Cancelled,
}

impl RowStatus {
    pub fn classify(result: &LookupResult, outcomes: &[VariantOutcome]) -> Self {
        if result.is_match() {
            return Self::Matched;
        }
        let errors = || outcomes.iter().filter_map(|o| o.result.as_ref().err());
        if errors().any(|e| matches!(e, RegistryError::Cancelled { .. })) {
            Self::Cancelled
        } else if errors().any(|e| matches!(e, RegistryError::Exhausted { .. })) {
            Self::FailedAfterRetry
        } else if errors().any(|e| matches!(e, RegistryError::Permanent { .. })) {
            Self::FailedPermanently
        } else {
            Self::NotFound
        }
    }
}

/// Picks the winning candidate for a row.
#[derive(Debug, Clone)]
pub struct MatchSelector {
    normalizer: NameNormalizer,
}

impl MatchSelector {
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    /// Builds the row result from the variants tried, in the order they were tried.
    ///
    /// The first variant with at least one candidate decides the row. Among its
    /// candidates, a name equal to the variant after folding wins (`Exact`);
    /// several exact names resolve to active before inactive, then the
    /// smallest identifier. Otherwise the registry's first candidate is taken.
    pub fn select(&self, query: &CompanyQuery, outcomes: &[VariantOutcome]) -> LookupResult {
        let retries: u32 = outcomes.iter().map(VariantOutcome::retries).sum();

        let winner = outcomes.iter().enumerate().find_map(|(i, o)| match &o.result {
            Ok(outcome) if !outcome.candidates.is_empty() => Some((i, o, &outcome.candidates)),
            _ => None,
        });

        let Some((index, outcome, candidates)) = winner else {
            return self.unmatched(query, outcomes, retries);
        };

        let wanted = self.normalizer.fold_key(&outcome.variant);
        let mut exact: Vec<&ApiCandidate> = candidates
            .iter()
            .filter(|c| self.normalizer.fold_key(&c.full_name) == wanted)
            .collect();

        let mut notes: Vec<String> = outcomes[..index]
            .iter()
            .filter(|o| o.result.is_err())
            .map(VariantOutcome::describe_failure)
            .collect();

        let (chosen, strategy) = if exact.is_empty() {
            (&candidates[0], MatchStrategy::FirstCandidate)
        } else {
            if exact.len() > 1 {
                notes.push(format!("{} exact matches", exact.len()));
            }
            exact.sort_by(|a, b| {
                b.is_active
                    .cmp(&a.is_active)
                    .then_with(|| a.identifier.cmp(&b.identifier))
            });
            (exact[0], MatchStrategy::Exact)
        };

        let identifier_type = if is_valid_ico(&chosen.identifier) {
            IdentifierType::PrimaryId
        } else {
            notes.push("identifier fails IČO checksum".to_string());
            IdentifierType::Other
        };
        if !chosen.is_active {
            notes.push(match chosen.terminated_on {
                Some(date) => format!("entity is no longer active (terminated {})", date),
                None => "entity is no longer active".to_string(),
            });
        }
        if retries > 0 {
            notes.push(format!("rate-limited/transient errors, retried {}×", retries));
        }

        let similarity = strsim::jaro_winkler(&wanted, &self.normalizer.fold_key(&chosen.full_name));

        LookupResult {
            clean_name: query.clean_name.clone(),
            used_variant: outcome.variant.clone(),
            identifier: Some(chosen.identifier.clone()),
            matched_full_name: Some(chosen.full_name.clone()),
            identifier_type,
            match_strategy: strategy,
            name_similarity: Some((similarity * 1000.0).round() / 1000.0),
            notes: notes.join("; "),
        }
    }

    fn unmatched(&self, query: &CompanyQuery, outcomes: &[VariantOutcome], retries: u32) -> LookupResult {
        if outcomes.is_empty() {
            return LookupResult::unmatched(&query.clean_name, "empty company name");
        }
        let all_empty = outcomes
            .iter()
            .all(|o| matches!(&o.result, Ok(outcome) if outcome.candidates.is_empty()));
        let mut notes = if all_empty {
            "no candidates for any variant".to_string()
        } else {
            outcomes
                .iter()
                .map(VariantOutcome::describe_failure)
                .collect::<Vec<_>>()
                .join("; ")
        };
        if retries > 0 {
            notes.push_str(&format!("; retried {}×", retries));
        }
        LookupResult::unmatched(&query.clean_name, notes)
    }
}

impl Default for MatchSelector {
    fn default() -> Self {
        Self::new(NameNormalizer::default())
    }
}
