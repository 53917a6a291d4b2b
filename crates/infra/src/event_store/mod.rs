//! Append-only event store boundary.
//!
//! Tenant-scoped event streams, one per document or product, with an atomic
//! multi-stream append so a single business operation commits all-or-nothing.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
