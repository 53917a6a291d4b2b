use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopledger_core::{AggregateId, TenantId};

/// A committed event as bus subscribers see it.
///
/// `stream` names the document kind (`purchasing.order`, `payables.bill`, ...)
/// and `position` is the event's 1-based place in that document's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    stream: String,
    document_id: AggregateId,
    position: u64,
    event_type: String,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        stream: impl Into<String>,
        document_id: AggregateId,
        position: u64,
        event_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            stream: stream.into(),
            document_id,
            position,
            event_type: event_type.into(),
            payload,
        }
    }

    /// Stable across redeliveries; subscribers dedupe on it.
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn document_id(&self) -> AggregateId {
        self.document_id
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
