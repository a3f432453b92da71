use std::collections::HashMap;
use std::sync::RwLock;

use custody_core::{AggregateId, CompanyId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    company_id: CompanyId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Every stored event of a company, stream by stream (rebuild support).
    pub fn company_events(&self, company_id: CompanyId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut events: Vec<StoredEvent> = streams
            .iter()
            .filter(|(k, _)| k.company_id == company_id)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();
        events.sort_by_key(|e| (e.occurred_at, e.aggregate_id.as_uuid().as_u128(), e.sequence_number));
        Ok(events)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same company + aggregate stream.
        let company_id = events[0].company_id;
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.company_id != company_id {
                return Err(EventStoreError::CompanyIsolation(format!(
                    "batch contains multiple company_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            company_id,
            aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                company_id: e.company_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        company_id: CompanyId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            company_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(company_id: CompanyId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            company_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "assignments.assignment.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let company_id = CompanyId::new();
        let aggregate_id = AggregateId::new();

        let first = store
            .append(
                vec![
                    event(company_id, aggregate_id, "assignments.assignment"),
                    event(company_id, aggregate_id, "assignments.assignment"),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        let second = store
            .append(
                vec![event(company_id, aggregate_id, "assignments.assignment")],
                ExpectedVersion::Exact(2),
            )
            .unwrap();

        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second[0].sequence_number, 3);
        assert_eq!(store.load_stream(company_id, aggregate_id).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let company_id = CompanyId::new();
        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![event(company_id, aggregate_id, "assignments.assignment")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let err = store
            .append(
                vec![event(company_id, aggregate_id, "assignments.assignment")],
                ExpectedVersion::Exact(0),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn streams_are_company_scoped() {
        let store = InMemoryEventStore::new();
        let company_id = CompanyId::new();
        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![event(company_id, aggregate_id, "products.product")],
                ExpectedVersion::Any,
            )
            .unwrap();

        assert!(store.load_stream(CompanyId::new(), aggregate_id).unwrap().is_empty());

        let mixed = vec![
            event(company_id, aggregate_id, "products.product"),
            event(CompanyId::new(), aggregate_id, "products.product"),
        ];
        assert!(matches!(
            store.append(mixed, ExpectedVersion::Any),
            Err(EventStoreError::CompanyIsolation(_))
        ));
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let company_id = CompanyId::new();
        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![event(company_id, aggregate_id, "products.product")],
                ExpectedVersion::Any,
            )
            .unwrap();

        let err = store
            .append(
                vec![event(company_id, aggregate_id, "parties.contact")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
