use std::collections::HashMap;
use std::sync::RwLock;

use custody_core::{AggregateId, CompanyId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    company_id: CompanyId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per (company, aggregate) stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    fn last(&self, company_id: CompanyId, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors
                .get(&CursorKey {
                    company_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    /// Whether `seq` is the next event of the stream.
    ///
    /// `Ok(false)` means it was already applied (replay). Gaps are errors once
    /// the stream has been seen.
    pub fn should_apply(
        &self,
        company_id: CompanyId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let last = self.last(company_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, company_id: CompanyId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    company_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    pub fn clear_company(&self, company_id: CompanyId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.company_id != company_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let company_id = CompanyId::new();
        let aggregate_id = AggregateId::new();

        assert!(cursors.should_apply(company_id, aggregate_id, 1).unwrap());
        cursors.advance(company_id, aggregate_id, 1);

        assert!(!cursors.should_apply(company_id, aggregate_id, 1).unwrap());
        assert!(cursors.should_apply(company_id, aggregate_id, 2).unwrap());
        assert!(matches!(
            cursors.should_apply(company_id, aggregate_id, 4),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        ));
        assert!(cursors.should_apply(company_id, aggregate_id, 0).is_err());

        cursors.clear_company(company_id);
        assert!(cursors.should_apply(company_id, aggregate_id, 1).unwrap());
    }
}
