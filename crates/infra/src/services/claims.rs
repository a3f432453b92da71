//! Per-assignment exclusion for writes.
//!
//! While a claim is held no other write lands on the assignment's stream.
//! Completion holds one from loading the assignment until its final append.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use custody_assignments::AssignmentId;
use custody_core::CompanyId;

use crate::command_dispatcher::DispatchError;

use super::ServiceError;

type Key = (CompanyId, AssignmentId);

#[derive(Debug, Default)]
pub(super) struct AssignmentClaims {
    held: Mutex<HashSet<Key>>,
}

impl AssignmentClaims {
    /// Claim the assignment, or fail fast with a concurrency conflict when
    /// another write already holds it.
    pub(super) fn claim(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<Claim<'_>, ServiceError> {
        let key = (company_id, assignment_id);
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key) {
            tracing::warn!(company = %company_id, assignment = %assignment_id, "assignment is busy");
            return Err(ServiceError::Dispatch(DispatchError::Concurrency(format!(
                "assignment {assignment_id} is being processed by another operation"
            ))));
        }
        Ok(Claim { claims: self, key })
    }
}

/// Released on drop.
#[derive(Debug)]
pub(super) struct Claim<'a> {
    claims: &'a AssignmentClaims,
    key: Key,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.claims
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
