//! Company-name normalization and query-variant generation.
//!
//! Turns a raw name from the input sheet into a [`CompanyQuery`]: a cleaned
//! display form with the legal-entity suffix removed, plus the ordered list of
//! search strings to try against the registry.

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::model::CompanyQuery;

/// Slovak legal-form suffixes, as regex fragments matched at the end of the name.
///
/// Dots and inner spaces are optional so `s.r.o.`, `s. r. o.` and `sro` all match.
pub const DEFAULT_LEGAL_SUFFIXES: &[&str] = &[
    r"spoločnosť\s+s\s+ručením\s+obmedzeným",
    r"verejná\s+obchodná\s+spoločnosť",
    r"komanditná\s+spoločnosť",
    r"nezisková\s+organizácia",
    r"občianske\s+združenie",
    r"akciová\s+spoločnosť",
    r"spol\.?\s*s\s*r\.?\s*o\.?",
    r"štátny\s+podnik",
    r"s\.?\s*r\.?\s*o\.?",
    r"v\.?\s*o\.?\s*s\.?",
    r"družstvo",
    r"a\.?\s*s\.?",
    r"k\.?\s*s\.?",
    r"n\.?\s*o\.?",
    r"o\.?\s*z\.?",
    r"š\.?\s*p\.?",
];

/// Quote characters spreadsheets like to leave around names.
const QUOTES: &[char] = &['"', '\'', '`', '„', '“', '”'];

/// Folds diacritics to their base Latin letters (`Žilina` -> `Zilina`).
pub fn fold_diacritics(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Trims and collapses runs of whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds [`CompanyQuery`] values using an ordered list of legal-suffix patterns.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    suffixes: Vec<Regex>,
}

impl NameNormalizer {
    /// Compiles the given suffix patterns.
    ///
    /// Each pattern is anchored to the end of the name and must be preceded by
    /// whitespace, a comma, or nothing at all, so `a.s.` never eats the tail
    /// of `Texas`. A diacritic-free copy of every pattern is added so ASCII
    /// input (`akciova spolocnost`) is stripped too. Patterns are ordered
    /// longest first.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let mut sources: Vec<String> = Vec::with_capacity(patterns.len() * 2);
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            for candidate in [pattern.to_string(), fold_diacritics(pattern)] {
                if !sources.contains(&candidate) {
                    sources.push(candidate);
                }
            }
        }
        sources.sort_by(|a, b| b.len().cmp(&a.len()));

        let suffixes = sources
            .iter()
            .map(|p| Regex::new(&format!(r"(?i)(?:^|[\s,]+)(?:{})[\s.,;-]*$", p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { suffixes })
    }

    /// Strips legal-entity suffixes and trailing punctuation.
    ///
    /// Every pattern gets one attempt; punctuation left dangling by a strip is
    /// removed with it. A name that consists only of a legal form is returned
    /// unchanged rather than emptied.
    pub fn strip_legal_suffix(&self, name: &str) -> String {
        let mut current = collapse_whitespace(name);
        for re in &self.suffixes {
            if let Some(m) = re.find(&current) {
                let stripped = trim_trailing_punctuation(&current[..m.start()]);
                if !stripped.is_empty() {
                    current = stripped.to_string();
                }
            }
        }
        current
    }

    /// Produces the cleaned name and ordered search variants for one input row.
    ///
    /// Variant order: suffix stripped with diacritics, suffix stripped and
    /// folded, then the trimmed input as given. Duplicates are dropped. Blank
    /// input yields a single empty variant.
    pub fn normalize(&self, raw_name: &str) -> CompanyQuery {
        let trimmed = raw_name.trim();
        let unquoted = collapse_whitespace(trim_quotes(trimmed));
        let clean_name = if unquoted.is_empty() {
            String::new()
        } else {
            let stripped = self.strip_legal_suffix(&unquoted);
            trim_quotes(&stripped).to_string()
        };

        let mut variants: Vec<String> = Vec::with_capacity(3);
        for variant in [
            clean_name.clone(),
            fold_diacritics(&clean_name),
            trimmed.to_string(),
        ] {
            if !variant.is_empty() && !variants.contains(&variant) {
                variants.push(variant);
            }
        }
        if variants.is_empty() {
            variants.push(trimmed.to_string());
        }

        CompanyQuery {
            raw_name: raw_name.to_string(),
            clean_name,
            variants,
        }
    }

    /// Comparison key for matching registry names against query strings:
    /// suffix stripped, diacritics folded, lowercased.
    pub fn fold_key(&self, name: &str) -> String {
        let stripped = self.strip_legal_suffix(trim_quotes(name));
        fold_diacritics(trim_quotes(&stripped)).to_lowercase()
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LEGAL_SUFFIXES).expect("built-in suffix patterns compile")
    }
}

/// Removes quotes that wrap the whole name, or a single unpaired quote at
/// either end. Quotes around an inner part of the name are kept.
fn trim_quotes(s: &str) -> &str {
    let s = s.trim();
    let inner = s.trim_matches(QUOTES);
    let leading = s.len() - s.trim_start_matches(QUOTES).len();
    let trailing = s.len() - s.trim_end_matches(QUOTES).len();
    if leading > 0 && trailing > 0 && !inner.contains(QUOTES) {
        return inner.trim();
    }
    let quote_count = s.chars().filter(|c| QUOTES.contains(c)).count();
    if quote_count % 2 == 0 {
        return s;
    }
    match (leading > 0, trailing > 0) {
        (true, false) => s.trim_start_matches(QUOTES).trim_start(),
        (false, true) => s.trim_end_matches(QUOTES).trim_end(),
        _ => s,
    }
}

fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ';' | '-'))
}
