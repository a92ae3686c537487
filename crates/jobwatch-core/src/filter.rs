//! Keyword filters applied to every scraped listing.
//!
//! Matching is **case-sensitive substring containment**: the term `"Staff"`
//! rejects `"Staff Engineer"` but not `"staff engineer"`. A missing or
//! empty keyword set places no constraint on its field.

use serde::{Deserialize, Serialize};

use crate::models::ListingRecord;

/// Per-site keyword rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_exclude: Option<Vec<String>>,
}

impl FilterRules {
    pub fn with_title_include<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.title_include = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_title_exclude<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.title_exclude = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_location_include<S: Into<String>>(
        mut self,
        terms: impl IntoIterator<Item = S>,
    ) -> Self {
        self.location_include = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_location_exclude<S: Into<String>>(
        mut self,
        terms: impl IntoIterator<Item = S>,
    ) -> Self {
        self.location_exclude = Some(terms.into_iter().map(Into::into).collect());
        self
    }

    pub fn passes(&self, record: &ListingRecord) -> bool {
        passes_filters(record, self)
    }
}

/// Evaluate the four gates in order: title include, title exclude,
/// location include, location exclude. Stops at the first rejecting gate.
pub fn passes_filters(record: &ListingRecord, rules: &FilterRules) -> bool {
    include_gate(&record.title, rules.title_include.as_deref())
        && exclude_gate(&record.title, rules.title_exclude.as_deref())
        && include_gate(&record.location, rules.location_include.as_deref())
        && exclude_gate(&record.location, rules.location_exclude.as_deref())
}

fn include_gate(field: &str, terms: Option<&[String]>) -> bool {
    match terms {
        Some(terms) if !terms.is_empty() => terms.iter().any(|t| field.contains(t.as_str())),
        _ => true,
    }
}

fn exclude_gate(field: &str, terms: Option<&[String]>) -> bool {
    match terms {
        Some(terms) => !terms.iter().any(|t| field.contains(t.as_str())),
        None => true,
    }
}
