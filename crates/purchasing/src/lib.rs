//! Purchasing domain module (event-sourced).
//!
//! Purchase orders and the goods receipts (GRNs) recorded against them,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). Stock effects of a receipt are staged by the orchestrator in the
//! same unit of work.

pub mod order;
pub mod receipt;

use shopledger_core::typed_id;

typed_id!(
    /// Supplier identifier, resolved through the supplier directory.
    SupplierId
);

pub use order::{
    AmendPurchaseOrder, ApplyReceipt, CancelPurchaseOrder, ConfirmPurchaseOrder,
    CreatePurchaseOrder, LineReceipt, NewOrderLine, OrderLine, PurchaseOrder,
    PurchaseOrderAmended, PurchaseOrderCancelled, PurchaseOrderCommand, PurchaseOrderConfirmed,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus,
    ReceiptApplied, ReceivedQuantity,
};
pub use receipt::{
    GoodsReceipt, GoodsReceiptCommand, GoodsReceiptEvent, GoodsReceiptId, GoodsReceiptLine,
    GoodsReceiptRecorded, RecordGoodsReceipt,
};
