use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `/search` response.
///
/// The registry wraps results as `{"results": [...]}`; some mirrors return the
/// bare array. Both shapes are accepted.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum SearchResponse {
    Records(Vec<RegistryRecord>),
    Wrapped {
        #[serde(default, deserialize_with = "null_as_default")]
        results: Vec<RegistryRecord>,
    },
}

impl SearchResponse {
    pub fn into_records(self) -> Vec<RegistryRecord> {
        match self {
            Self::Records(records) => records,
            Self::Wrapped { results } => results,
        }
    }
}

/// One legal entity as returned by the registry search.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub identifiers: Vec<Identifier>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_names: Vec<FullName>,
    #[serde(default)]
    pub establishment: Option<String>,
    #[serde(default)]
    pub termination: Option<String>,
    /// Explicit status flag; only some endpoints send it.
    #[serde(default, alias = "isActive")]
    pub active: Option<bool>,
}

/// A registry identifier (IČO or another number) with its code-list type.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<CodelistValue>,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_to: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CodelistValue {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// A historical or current registered name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FullName {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_to: Option<String>,
}

impl Identifier {
    /// The identifier type label, preferring the human value over the code.
    pub fn kind_label(&self) -> Option<&str> {
        let kind = self.kind.as_ref()?;
        kind.value.as_deref().or(kind.code.as_deref())
    }
}

impl RegistryRecord {
    /// The name currently in force: the last entry without `validTo`, falling
    /// back to the last non-empty entry.
    pub fn current_full_name(&self) -> Option<&str> {
        let named = || {
            self.full_names
                .iter()
                .filter_map(|n| n.value.as_deref().map(|v| (n, v.trim())))
                .filter(|(_, v)| !v.is_empty())
        };
        named()
            .filter(|(n, _)| n.valid_to.is_none())
            .last()
            .or_else(|| named().last())
            .map(|(_, v)| v)
    }

    /// Entities without a termination date are active unless the record says otherwise.
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or_else(|| {
            self.termination
                .as_deref()
                .map(str::trim)
                .map_or(true, str::is_empty)
        })
    }

    pub fn termination_date(&self) -> Option<NaiveDate> {
        self.termination
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
