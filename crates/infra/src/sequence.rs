//! In-memory document sequences.

use std::collections::HashMap;
use std::sync::Mutex;

use custody_core::CompanyId;

use crate::config::CustodyConfig;
use crate::ports::SequenceGenerator;

/// Sequence code of assignment references.
pub const ASSIGNMENT_SEQUENCE: &str = "custody.assignment";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SequenceDef {
    prefix: String,
    padding: usize,
}

/// Prefix + zero-padded counter, one counter per (company, code).
///
/// Codes that were never defined yield nothing.
#[derive(Debug, Default)]
pub struct InMemorySequence {
    definitions: HashMap<String, SequenceDef>,
    counters: Mutex<HashMap<(CompanyId, String), u64>>,
}

impl InMemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences used by the workspace, formatted per configuration.
    pub fn from_config(config: &CustodyConfig) -> Self {
        Self::new().define(ASSIGNMENT_SEQUENCE, config.sequence_prefix.clone(), config.sequence_padding)
    }

    pub fn define(mut self, code: impl Into<String>, prefix: impl Into<String>, padding: usize) -> Self {
        self.definitions.insert(
            code.into(),
            SequenceDef {
                prefix: prefix.into(),
                padding,
            },
        );
        self
    }
}

impl SequenceGenerator for InMemorySequence {
    fn next_by_code(&self, company_id: CompanyId, code: &str) -> Option<String> {
        let def = self.definitions.get(code)?;
        let mut counters = self.counters.lock().ok()?;
        let counter = counters.entry((company_id, code.to_string())).or_insert(0);
        *counter += 1;
        Some(format!("{}{:0width$}", def.prefix, counter, width = def.padding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_company() {
        let seq = InMemorySequence::from_config(&CustodyConfig::default());
        let a = CompanyId::new();
        let b = CompanyId::new();

        assert_eq!(seq.next_by_code(a, ASSIGNMENT_SEQUENCE).as_deref(), Some("ASG/00001"));
        assert_eq!(seq.next_by_code(a, ASSIGNMENT_SEQUENCE).as_deref(), Some("ASG/00002"));
        assert_eq!(seq.next_by_code(b, ASSIGNMENT_SEQUENCE).as_deref(), Some("ASG/00001"));
    }

    #[test]
    fn undefined_code_yields_nothing() {
        let seq = InMemorySequence::new();
        assert_eq!(seq.next_by_code(CompanyId::new(), ASSIGNMENT_SEQUENCE), None);
    }

    #[test]
    fn padding_does_not_truncate() {
        let seq = InMemorySequence::new().define("x", "X-", 1);
        let company = CompanyId::new();
        for _ in 0..9 {
            seq.next_by_code(company, "x");
        }
        assert_eq!(seq.next_by_code(company, "x").as_deref(), Some("X-10"));
    }
}
