use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use custody_core::CompanyId;
use custody_events::EventEnvelope;
use custody_parties::{ContactEvent, ContactId, ContactInfo};
use custody_stock::LocationId;

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::ports::ContactDirectory;
use crate::read_model::CompanyStore;

pub const CONTACT_AGGREGATE: &str = "parties.contact";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactReadModel {
    pub contact_id: ContactId,
    pub name: String,
    pub info: ContactInfo,
    /// Where stock handed to the contact ends up.
    pub outbound_location: Option<LocationId>,
}

/// Contact directory (read side of the contact aggregate).
#[derive(Debug)]
pub struct ContactDirectoryProjection<S>
where
    S: CompanyStore<ContactId, ContactReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ContactDirectoryProjection<S>
where
    S: CompanyStore<ContactId, ContactReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, company_id: CompanyId, contact_id: &ContactId) -> Option<ContactReadModel> {
        self.store.get(company_id, contact_id)
    }

    pub fn list(&self, company_id: CompanyId) -> Vec<ContactReadModel> {
        self.store.list(company_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != CONTACT_AGGREGATE {
            return Ok(());
        }

        let company_id = envelope.company_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(company_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ContactEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.company_id() != company_id {
            return Err(ProjectionError::CompanyIsolation(
                "event company_id does not match envelope company_id".to_string(),
            ));
        }
        if ev.contact_id().0 != aggregate_id {
            return Err(ProjectionError::CompanyIsolation(
                "event contact_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ContactEvent::ContactRegistered(e) => {
                self.store.upsert(
                    company_id,
                    e.contact_id,
                    ContactReadModel {
                        contact_id: e.contact_id,
                        name: e.name,
                        info: e.info,
                        outbound_location: e.outbound_location,
                    },
                );
            }
            ContactEvent::ContactUpdated(e) => {
                if let Some(mut rm) = self.store.get(company_id, &e.contact_id) {
                    rm.name = e.name;
                    rm.info = e.info;
                    self.store.upsert(company_id, e.contact_id, rm);
                }
            }
            ContactEvent::OutboundLocationSet(e) => {
                if let Some(mut rm) = self.store.get(company_id, &e.contact_id) {
                    rm.outbound_location = e.location;
                    self.store.upsert(company_id, e.contact_id, rm);
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

impl<S> ContactDirectory for ContactDirectoryProjection<S>
where
    S: CompanyStore<ContactId, ContactReadModel>,
{
    fn contact(&self, company_id: CompanyId, contact_id: ContactId) -> Option<ContactReadModel> {
        self.get(company_id, &contact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use custody_parties::{ContactRegistered, OutboundLocationSet};
    use uuid::Uuid;

    use crate::read_model::InMemoryCompanyStore;

    fn envelope(company_id: CompanyId, contact_id: ContactId, seq: u64, ev: &ContactEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            company_id,
            contact_id.0,
            CONTACT_AGGREGATE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn outbound_location_follows_contact_events() {
        let directory = ContactDirectoryProjection::new(InMemoryCompanyStore::new());
        let company_id = CompanyId::new();
        let contact_id = ContactId::generate();
        let location = LocationId::generate();

        let registered = ContactEvent::ContactRegistered(ContactRegistered {
            company_id,
            contact_id,
            name: "Jane Cooper".to_string(),
            info: ContactInfo::default(),
            outbound_location: None,
            occurred_at: Utc::now(),
        });
        let located = ContactEvent::OutboundLocationSet(OutboundLocationSet {
            company_id,
            contact_id,
            location: Some(location),
            occurred_at: Utc::now(),
        });

        directory.apply_envelope(&envelope(company_id, contact_id, 1, &registered)).unwrap();
        directory.apply_envelope(&envelope(company_id, contact_id, 2, &located)).unwrap();

        let rm = directory.contact(company_id, contact_id).unwrap();
        assert_eq!(rm.name, "Jane Cooper");
        assert_eq!(rm.outbound_location, Some(location));

        directory
            .rebuild(company_id, vec![envelope(company_id, contact_id, 1, &registered)])
            .unwrap();
        assert_eq!(directory.contact(company_id, contact_id).unwrap().outbound_location, None);
        assert_eq!(directory.list(company_id).len(), 1);
    }
}
