use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use custody_assignments::{
    AssignmentEvent, AssignmentFilter, AssignmentId, AssignmentLine, AssignmentState, AttachmentId,
};
use custody_core::{CompanyId, Quantity, UserId};
use custody_events::EventEnvelope;
use custody_parties::ContactId;
use custody_products::{ProductId, TrackingMode};
use custody_stock::StockMoveId;

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::read_model::CompanyStore;

pub const ASSIGNMENT_AGGREGATE: &str = "assignments.assignment";

/// Line as listed, with the parent's state mirrored on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLineReadModel {
    pub line_no: u32,
    pub product_id: ProductId,
    pub tracking: TrackingMode,
    pub quantity: Quantity,
    pub serial_number: Option<String>,
    pub warranty_serial: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub assignment_state: AssignmentState,
}

impl AssignmentLineReadModel {
    fn from_line(line: AssignmentLine, assignment_state: AssignmentState) -> Self {
        Self {
            line_no: line.line_no,
            product_id: line.product_id,
            tracking: line.tracking,
            quantity: line.quantity,
            serial_number: line.serial_number,
            warranty_serial: line.warranty_serial,
            purchase_date: line.purchase_date,
            assignment_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReadModel {
    pub assignment_id: AssignmentId,
    pub code: String,
    pub contact_id: ContactId,
    pub assignment_date: Option<NaiveDate>,
    pub state: AssignmentState,
    pub lines: Vec<AssignmentLineReadModel>,
    pub stock_moves: Vec<StockMoveId>,
    pub notes: Option<String>,
    pub attachments: Vec<AttachmentId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssignmentReadModel {
    fn set_state(&mut self, state: AssignmentState) {
        self.state = state;
        for line in &mut self.lines {
            line.assignment_state = state;
        }
    }

    fn upsert_line(&mut self, line: AssignmentLine) {
        let rm = AssignmentLineReadModel::from_line(line, self.state);
        match self.lines.iter_mut().find(|l| l.line_no == rm.line_no) {
            Some(existing) => *existing = rm,
            None => self.lines.push(rm),
        }
    }
}

/// Assignment listing; deleted assignments are removed.
#[derive(Debug)]
pub struct AssignmentsProjection<S>
where
    S: CompanyStore<AssignmentId, AssignmentReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> AssignmentsProjection<S>
where
    S: CompanyStore<AssignmentId, AssignmentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, company_id: CompanyId, assignment_id: &AssignmentId) -> Option<AssignmentReadModel> {
        self.store.get(company_id, assignment_id)
    }

    /// All assignments of the company, ordered by code.
    pub fn list(&self, company_id: CompanyId) -> Vec<AssignmentReadModel> {
        let mut all = self.store.list(company_id);
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    pub fn list_filtered(&self, company_id: CompanyId, filter: &AssignmentFilter) -> Vec<AssignmentReadModel> {
        self.list(company_id)
            .into_iter()
            .filter(|a| filter.matches(company_id, a.contact_id, a.state))
            .collect()
    }

    pub fn count_for_contact(&self, company_id: CompanyId, contact_id: ContactId) -> usize {
        self.store
            .list(company_id)
            .iter()
            .filter(|a| a.contact_id == contact_id)
            .count()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ASSIGNMENT_AGGREGATE {
            return Ok(());
        }

        let company_id = envelope.company_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(company_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: AssignmentEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.company_id() != company_id {
            return Err(ProjectionError::CompanyIsolation(
                "event company_id does not match envelope company_id".to_string(),
            ));
        }
        let assignment_id = ev.assignment_id();
        if assignment_id.0 != aggregate_id {
            return Err(ProjectionError::CompanyIsolation(
                "event assignment_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            AssignmentEvent::AssignmentCreated(e) => {
                let lines = e
                    .lines
                    .into_iter()
                    .map(|l| AssignmentLineReadModel::from_line(l, AssignmentState::Draft))
                    .collect();
                self.store.upsert(
                    company_id,
                    assignment_id,
                    AssignmentReadModel {
                        assignment_id,
                        code: e.code,
                        contact_id: e.contact_id,
                        assignment_date: None,
                        state: AssignmentState::Draft,
                        lines,
                        stock_moves: vec![],
                        notes: e.notes,
                        attachments: vec![],
                        created_by: e.created_by,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            AssignmentEvent::AssignmentDeleted(_) => {
                self.store.remove(company_id, &assignment_id);
            }
            other => {
                if let Some(mut rm) = self.store.get(company_id, &assignment_id) {
                    rm.updated_at = custody_events::Event::occurred_at(&other);
                    apply_change(&mut rm, other);
                    self.store.upsert(company_id, assignment_id, rm);
                }
            }
        }

        self.cursors.advance(company_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild(
        &self,
        company_id: CompanyId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear_company(company_id);
        self.cursors.clear_company(company_id);

        let mut envs: Vec<_> = envelopes
            .into_iter()
            .filter(|e| e.company_id() == company_id)
            .collect();
        envs.sort_by_key(|e| (e.aggregate_id().as_uuid().as_u128(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

fn apply_change(rm: &mut AssignmentReadModel, ev: AssignmentEvent) {
    match ev {
        AssignmentEvent::LineAdded(e) => rm.upsert_line(e.line),
        AssignmentEvent::LineUpdated(e) => rm.upsert_line(e.line),
        AssignmentEvent::LineRemoved(e) => rm.lines.retain(|l| l.line_no != e.line_no),
        AssignmentEvent::NotesUpdated(e) => rm.notes = e.notes,
        AssignmentEvent::AttachmentAdded(e) => rm.attachments.push(e.attachment_id),
        AssignmentEvent::AttachmentRemoved(e) => rm.attachments.retain(|a| *a != e.attachment_id),
        AssignmentEvent::AssignmentAssigned(e) => {
            rm.assignment_date = Some(e.assignment_date);
            rm.set_state(AssignmentState::Assigned);
        }
        AssignmentEvent::AssignmentCompleted(e) => {
            rm.stock_moves = e.stock_moves;
            rm.set_state(AssignmentState::Done);
        }
        AssignmentEvent::AssignmentCancelled(_) => rm.set_state(AssignmentState::Cancel),
        AssignmentEvent::AssignmentResetToDraft(_) => rm.set_state(AssignmentState::Draft),
        AssignmentEvent::AssignmentCreated(_) | AssignmentEvent::AssignmentDeleted(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use custody_assignments::{AssignmentAssigned, AssignmentCreated, AssignmentDeleted};
    use uuid::Uuid;

    use crate::read_model::InMemoryCompanyStore;

    fn envelope(company_id: CompanyId, id: AssignmentId, seq: u64, ev: &AssignmentEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            company_id,
            id.0,
            ASSIGNMENT_AGGREGATE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn created(company_id: CompanyId, assignment_id: AssignmentId, contact_id: ContactId, code: &str) -> AssignmentEvent {
        AssignmentEvent::AssignmentCreated(AssignmentCreated {
            company_id,
            assignment_id,
            code: code.to_string(),
            contact_id,
            created_by: UserId::new(),
            lines: vec![AssignmentLine {
                line_no: 1,
                product_id: ProductId::generate(),
                tracking: TrackingMode::None,
                quantity: Quantity::from(2),
                serial_number: None,
                warranty_serial: None,
                purchase_date: None,
            }],
            notes: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn state_is_mirrored_on_lines() {
        let projection = AssignmentsProjection::new(InMemoryCompanyStore::new());
        let company_id = CompanyId::new();
        let id = AssignmentId::generate();
        let today = Utc::now().date_naive();

        projection
            .apply_envelope(&envelope(company_id, id, 1, &created(company_id, id, ContactId::generate(), "ASG/00001")))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                company_id,
                id,
                2,
                &AssignmentEvent::AssignmentAssigned(AssignmentAssigned {
                    company_id,
                    assignment_id: id,
                    assignment_date: today,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let rm = projection.get(company_id, &id).unwrap();
        assert_eq!(rm.state, AssignmentState::Assigned);
        assert_eq!(rm.assignment_date, Some(today));
        assert!(rm.lines.iter().all(|l| l.assignment_state == AssignmentState::Assigned));
    }

    #[test]
    fn deleted_assignments_leave_the_listing() {
        let projection = AssignmentsProjection::new(InMemoryCompanyStore::new());
        let company_id = CompanyId::new();
        let contact_id = ContactId::generate();
        let (a, b) = (AssignmentId::generate(), AssignmentId::generate());

        projection
            .apply_envelope(&envelope(company_id, b, 1, &created(company_id, b, contact_id, "ASG/00002")))
            .unwrap();
        projection
            .apply_envelope(&envelope(company_id, a, 1, &created(company_id, a, contact_id, "ASG/00001")))
            .unwrap();

        let codes: Vec<_> = projection.list(company_id).into_iter().map(|a| a.code).collect();
        assert_eq!(codes, vec!["ASG/00001", "ASG/00002"]);
        assert_eq!(projection.count_for_contact(company_id, contact_id), 2);

        projection
            .apply_envelope(&envelope(
                company_id,
                b,
                2,
                &AssignmentEvent::AssignmentDeleted(AssignmentDeleted {
                    company_id,
                    assignment_id: b,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.get(company_id, &b).is_none());
        assert_eq!(projection.count_for_contact(company_id, contact_id), 1);
        let filter = AssignmentFilter::for_contact(company_id, contact_id);
        assert_eq!(projection.list_filtered(company_id, &filter).len(), 1);
    }

    #[test]
    fn gap_in_a_stream_is_rejected() {
        let projection = AssignmentsProjection::new(InMemoryCompanyStore::new());
        let company_id = CompanyId::new();
        let id = AssignmentId::generate();

        projection
            .apply_envelope(&envelope(company_id, id, 1, &created(company_id, id, ContactId::generate(), "ASG/00001")))
            .unwrap();
        let deleted = AssignmentEvent::AssignmentDeleted(AssignmentDeleted {
            company_id,
            assignment_id: id,
            occurred_at: Utc::now(),
        });

        let err = projection.apply_envelope(&envelope(company_id, id, 3, &deleted)).unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 }));
        assert!(projection.get(company_id, &id).is_some());
    }
}
