//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! begin(tenant) → UnitOfWork
//!   load:    events from store → validate → rehydrate (remember version)
//!   execute: handle → apply, stage serialized events
//!   commit:  append_batch (Exact version per stream) → publish
//! ```
//!
//! A business operation that touches several documents (a goods receipt
//! moves stock, advances its purchase order and records itself) stages every
//! stream in one unit of work, so the store commits all of it or none of it.
//! The event store is the source of truth; publishing happens only after a
//! successful append and never undoes it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use shopledger_core::{Aggregate, AggregateId, DomainError, TenantId};
use shopledger_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic domain failure (validation, transition, business rule).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure: a stream moved since it was loaded.
    #[error("concurrent update: {0}")]
    Concurrency(String),

    /// Tenant isolation violation (cross-tenant or cross-aggregate stream mixing).
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Historical payloads could not be read back into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),
}

impl DispatchError {
    /// Whether re-running the operation on fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run on the in-memory
/// implementations and a durable backend can be swapped in without touching
/// domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Open a unit of work scoped to `tenant_id`.
    pub fn begin(&self, tenant_id: TenantId) -> UnitOfWork<'_, S, B> {
        UnitOfWork::new(self, tenant_id)
    }

    /// Rehydrate `aggregate` from its stream. Returns it with the stream version.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        mut aggregate: A,
    ) -> Result<(A, u64), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let version = stream_version(&history);
        apply_history(&mut aggregate, &history)?;
        Ok((aggregate, version))
    }

    /// Single-aggregate shortcut: load, handle one command, commit.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: &A::Command,
        aggregate: A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: shopledger_events::Event + Serialize + DeserializeOwned,
    {
        let mut uow = self.begin(tenant_id);
        let mut tracked = uow.load(aggregate_id, aggregate_type, aggregate)?;
        uow.execute(&mut tracked, command)?;
        uow.commit()
    }

    /// Append a staged batch atomically, then publish what was committed.
    ///
    /// Once the append succeeds the operation has happened: a publish failure
    /// is logged and the committed events are still returned.
    pub(crate) fn commit_batch(
        &self,
        batch: Vec<crate::event_store::StreamAppend>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let streams = batch.len();
        let committed = self.store.append_batch(batch)?;
        tracing::debug!(streams, events = committed.len(), "committed unit of work");

        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::error!(
                    event_id = %stored.event_id,
                    event_type = %stored.event_type,
                    error = ?e,
                    "event committed but not published"
                );
            }
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce tenant isolation even if a buggy backend returns cross-tenant data.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use shopledger_accounting::Money;
    use shopledger_core::AggregateRoot;
    use shopledger_events::InMemoryEventBus;
    use shopledger_inventory::{Product, ProductCommand, ProductId, RegisterProduct};

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn register(tenant_id: TenantId, product_id: ProductId) -> ProductCommand {
        ProductCommand::Register(RegisterProduct {
            tenant_id,
            product_id,
            sku: "SKU-9".to_string(),
            name: "Sugar 1kg".to_string(),
            cost_price: Money::from_minor(55),
            opening_stock: 3,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_then_publishes() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), bus);
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();

        let committed = dispatcher
            .dispatch(
                tenant_id,
                product_id.0,
                "inventory.product",
                &register(tenant_id, product_id),
                Product::empty(product_id),
            )
            .unwrap();
        assert_eq!(committed.len(), 1);

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type(), "inventory.product.registered");
        assert_eq!(published[0].position(), 1);
        assert_eq!(published[0].stream(), "inventory.product");
        assert_eq!(published[0].document_id(), product_id.0);
        assert!(published[0].payload().get("Registered").is_some());

        let (product, version) = dispatcher
            .load(tenant_id, product_id.0, Product::empty(product_id))
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(product.version(), 1);
        assert_eq!(product.stock(), 3);
    }

    #[test]
    fn domain_failure_writes_nothing() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), bus);
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();
        let cmd = register(tenant_id, product_id);

        dispatcher
            .dispatch(tenant_id, product_id.0, "inventory.product", &cmd, Product::empty(product_id))
            .unwrap();
        let err = dispatcher
            .dispatch(tenant_id, product_id.0, "inventory.product", &cmd, Product::empty(product_id))
            .unwrap_err();

        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
        assert!(!err.is_retryable());
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn store_concurrency_maps_to_retryable_error() {
        let err = DispatchError::from(EventStoreError::Concurrency("moved".to_string()));
        assert!(err.is_retryable());
        let err = DispatchError::from(EventStoreError::Unavailable("down".to_string()));
        assert!(matches!(err, DispatchError::Store(_)));
    }
}
