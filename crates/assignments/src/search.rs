//! Name search over assignments: a term matches the assignment code or the
//! contact's display name.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use custody_core::DomainError;

pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Comparison applied between the search term and a candidate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchOperator {
    /// Case-insensitive substring.
    #[default]
    #[serde(rename = "ilike")]
    ILike,
    /// Case-sensitive substring.
    #[serde(rename = "like")]
    Like,
    /// Exact match.
    #[serde(rename = "=")]
    Equals,
    /// Case-insensitive exact match.
    #[serde(rename = "=ilike")]
    EqualsILike,
}

impl SearchOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchOperator::ILike => "ilike",
            SearchOperator::Like => "like",
            SearchOperator::Equals => "=",
            SearchOperator::EqualsILike => "=ilike",
        }
    }

    pub fn matches(self, term: &str, value: &str) -> bool {
        match self {
            SearchOperator::ILike => value.to_lowercase().contains(&term.to_lowercase()),
            SearchOperator::Like => value.contains(term),
            SearchOperator::Equals => value == term,
            SearchOperator::EqualsILike => value.to_lowercase() == term.to_lowercase(),
        }
    }
}

impl FromStr for SearchOperator {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ilike" => Ok(SearchOperator::ILike),
            "like" => Ok(SearchOperator::Like),
            "=" => Ok(SearchOperator::Equals),
            "=ilike" => Ok(SearchOperator::EqualsILike),
            other => Err(DomainError::validation(format!(
                "unsupported search operator '{other}'"
            ))),
        }
    }
}

/// One searchable record: its code, its contact's display name, and the value
/// returned when it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate<T> {
    pub code: String,
    pub contact_name: String,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSearch {
    pub term: String,
    pub operator: SearchOperator,
    /// `None` returns every match.
    pub limit: Option<usize>,
}

impl NameSearch {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            operator: SearchOperator::default(),
            limit: Some(DEFAULT_SEARCH_LIMIT),
        }
    }

    pub fn with_operator(mut self, operator: SearchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// An empty term matches everything.
    pub fn matches(&self, code: &str, contact_name: &str) -> bool {
        if self.term.is_empty() {
            return true;
        }
        self.operator.matches(&self.term, code) || self.operator.matches(&self.term, contact_name)
    }

    /// Filter, order by code, truncate to the limit.
    pub fn run<T>(&self, candidates: impl IntoIterator<Item = SearchCandidate<T>>) -> Vec<T> {
        let mut hits: Vec<SearchCandidate<T>> = candidates
            .into_iter()
            .filter(|c| self.matches(&c.code, &c.contact_name))
            .collect();
        hits.sort_by(|a, b| a.code.cmp(&b.code));

        let limit = self.limit.unwrap_or(usize::MAX);
        hits.into_iter().take(limit).map(|c| c.value).collect()
    }
}
