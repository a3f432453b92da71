//! Runtime configuration from environment variables.
//!
//! Unset variables take their defaults; unparsable values fall back to the
//! default with a warning.

use serde::{Deserialize, Serialize};

use custody_assignments::DEFAULT_SEARCH_LIMIT;

pub const SEQUENCE_PREFIX_VAR: &str = "CUSTODY_SEQUENCE_PREFIX";
pub const SEQUENCE_PADDING_VAR: &str = "CUSTODY_SEQUENCE_PADDING";
pub const SEARCH_LIMIT_VAR: &str = "CUSTODY_SEARCH_LIMIT";
pub const LOG_VAR: &str = "CUSTODY_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// Prefix of generated assignment codes.
    pub sequence_prefix: String,
    /// Zero-padding width of the sequence counter.
    pub sequence_padding: usize,
    /// Default limit of name searches.
    pub search_limit: usize,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            sequence_prefix: "ASG/".to_string(),
            sequence_padding: 5,
            search_limit: DEFAULT_SEARCH_LIMIT,
            log_filter: "info".to_string(),
        }
    }
}

impl CustodyConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let sequence_prefix = lookup(SEQUENCE_PREFIX_VAR).unwrap_or(defaults.sequence_prefix);
        let sequence_padding = parse_or(&lookup, SEQUENCE_PADDING_VAR, defaults.sequence_padding, |v| v <= 12);
        let search_limit = parse_or(&lookup, SEARCH_LIMIT_VAR, defaults.search_limit, |v| v > 0);
        let log_filter = lookup(LOG_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Self {
            sequence_prefix,
            sequence_padding,
            search_limit,
            log_filter,
        }
    }
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
    valid: impl Fn(usize) -> bool,
) -> usize {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if valid(value) => value,
        _ => {
            tracing::warn!(%key, value = %raw, fallback = default, "invalid configuration value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(CustodyConfig::from_lookup(lookup(&[])), CustodyConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = CustodyConfig::from_lookup(lookup(&[
            (SEQUENCE_PREFIX_VAR, "HR/ASG/"),
            (SEQUENCE_PADDING_VAR, "3"),
            (SEARCH_LIMIT_VAR, "20"),
            (LOG_VAR, "custody_infra=debug"),
        ]));
        assert_eq!(config.sequence_prefix, "HR/ASG/");
        assert_eq!(config.sequence_padding, 3);
        assert_eq!(config.search_limit, 20);
        assert_eq!(config.log_filter, "custody_infra=debug");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = CustodyConfig::from_lookup(lookup(&[
            (SEQUENCE_PADDING_VAR, "wide"),
            (SEARCH_LIMIT_VAR, "0"),
            (LOG_VAR, "  "),
        ]));
        assert_eq!(config.sequence_padding, 5);
        assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(config.log_filter, "info");
    }
}
