use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use shopledger_core::{AggregateId, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// A single write lock covers a whole batch, which makes multi-stream appends
/// atomic and serializes commits. Intended for tests/dev.
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
}

/// Check that every event of one stream append targets the same stream.
fn validate_append(append: &StreamAppend) -> Result<Option<(StreamKey, String)>, EventStoreError> {
    let Some(first) = append.events.first() else {
        return Ok(None);
    };
    let tenant_id = first.tenant_id;
    let aggregate_id = first.aggregate_id;
    let aggregate_type = first.aggregate_type.clone();

    for (idx, e) in append.events.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "append contains multiple tenant_ids (index {idx})"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "append contains multiple aggregate_ids (index {idx})"
            )));
        }
        if e.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "append contains multiple aggregate_types (index {idx})"
            )));
        }
    }

    Ok(Some((
        StreamKey {
            tenant_id,
            aggregate_id,
        },
        aggregate_type,
    )))
}

impl EventStore for InMemoryEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut keyed = Vec::with_capacity(batch.len());
        let mut seen = HashSet::new();
        let mut batch_tenant = None;
        for append in batch {
            let Some((key, aggregate_type)) = validate_append(&append)? else {
                continue;
            };
            if *batch_tenant.get_or_insert(key.tenant_id) != key.tenant_id {
                return Err(EventStoreError::TenantIsolation(
                    "batch spans multiple tenants".to_string(),
                ));
            }
            if !seen.insert(key) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one batch",
                    key.aggregate_id
                )));
            }
            keyed.push((key, aggregate_type, append));
        }
        if keyed.is_empty() {
            return Ok(vec![]);
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        // Check every stream before touching any of them.
        for (key, aggregate_type, append) in &keyed {
            let stream = streams.get(key).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    key.aggregate_id, append.expected_version
                )));
            }
            if let Some(existing) = stream.first() {
                if &existing.aggregate_type != aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, aggregate_type
                    )));
                }
            }
        }

        let mut committed = Vec::new();
        for (key, _, append) in keyed {
            let stream = streams.entry(key).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    tenant_id: e.tenant_id,
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
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
