//! Infrastructure layer: event store, command dispatch, document numbering,
//! supplier lookup and the purchase lifecycle orchestrator.

pub mod command_dispatcher;
pub mod event_store;
pub mod lifecycle;
pub mod numbering;
pub mod suppliers;
pub mod unit_of_work;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, StreamAppend, UncommittedEvent};
pub use lifecycle::{
    LifecycleConfig, NewBill, NewGoodsReceipt, NewPayment, NewProduct, NewPurchaseOrder,
    NewPurchaseReturn, PurchaseLifecycle,
};
pub use numbering::{DocumentKind, DocumentNumbers, InMemoryDocumentNumbers};
pub use suppliers::{InMemorySupplierDirectory, NewSupplier, Supplier, SupplierDirectory};
pub use unit_of_work::{Tracked, UnitOfWork};
