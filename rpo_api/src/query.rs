//! Query builder for the `/search` endpoint.

use url::Url;

/// Parameters for a single registry name search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text company name, sent as `fullName`.
    pub full_name: String,
    /// Restrict results to entities that have not been terminated. Defaults to `true`.
    pub only_active: bool,
}

impl SearchQuery {
    pub fn new(full_name: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            only_active: true,
        }
    }

    pub fn with_only_active(mut self, only_active: bool) -> Self {
        self.only_active = only_active;
        self
    }

    /// Appends this query's parameters to the given URL, returning the modified URL.
    pub fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("fullName", &self.full_name)
            .append_pair("onlyActive", if self.only_active { "true" } else { "false" });
        url
    }
}
