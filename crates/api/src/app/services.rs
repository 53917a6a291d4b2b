use std::sync::Arc;

use serde_json::Value as JsonValue;

use shopledger_events::{EventBus, EventEnvelope, InMemoryEventBus};
use shopledger_infra::{
    CommandDispatcher, InMemoryDocumentNumbers, InMemoryEventStore, InMemorySupplierDirectory,
    LifecycleConfig, PurchaseLifecycle,
};

pub type ApiEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Lifecycle = PurchaseLifecycle<InMemoryEventStore, ApiEventBus>;

/// Process-wide services shared by every handler.
pub struct AppServices {
    lifecycle: Lifecycle,
}

impl AppServices {
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

/// Wire the in-memory store, bus, numbering and supplier catalog.
pub fn build_services(engine: LifecycleConfig) -> AppServices {
    let bus: ApiEventBus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), bus.clone());
    let lifecycle = PurchaseLifecycle::new(
        dispatcher,
        Arc::new(InMemoryDocumentNumbers::new()),
        Arc::new(InMemorySupplierDirectory::new()),
        engine,
    );

    spawn_event_log(&bus);

    AppServices { lifecycle }
}

// Background subscriber: committed events -> debug log. Ends once the bus is dropped.
fn spawn_event_log(bus: &ApiEventBus) {
    let sub = bus.subscribe();
    let spawned = std::thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || {
            while let Ok(env) = sub.recv() {
                tracing::debug!(
                    event_id = %env.event_id(),
                    tenant = %env.tenant_id(),
                    stream = env.stream(),
                    document = %env.document_id(),
                    position = env.position(),
                    event_type = env.event_type(),
                    "event committed"
                );
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("event log subscriber not started: {e}");
    }
}
