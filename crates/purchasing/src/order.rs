use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_accounting::Money;
use shopledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_id};
use shopledger_events::Event;
use shopledger_inventory::ProductId;

use crate::SupplierId;
use crate::receipt::GoodsReceiptId;

typed_id!(
    /// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    PurchaseOrderId
);

/// Purchase order status lifecycle.
///
/// `Draft → Confirmed → PartiallyReceived → Complete`; anything not terminal
/// may be cancelled. `Complete` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Confirmed,
    PartiallyReceived,
    Complete,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Confirmed => "confirmed",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Complete => "complete",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Complete | PurchaseOrderStatus::Cancelled
        )
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested line on create/amend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub qty_ordered: i64,
    pub unit_cost: Money,
}

/// Purchase order line: ordered vs received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub qty_ordered: i64,
    pub qty_received: i64,
    pub unit_cost: Money,
}

impl OrderLine {
    pub fn remaining(&self) -> i64 {
        self.qty_ordered - self.qty_received
    }

    pub fn is_fully_received(&self) -> bool {
        self.qty_received == self.qty_ordered
    }
}

/// Quantity of one product carried by a goods receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedQuantity {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Portion of a receipt allocated to one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub line_no: u32,
    pub quantity: i64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    po_number: String,
    supplier_id: Option<SupplierId>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    receipts: Vec<GoodsReceiptId>,
    ordered_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            po_number: String::new(),
            supplier_id: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            receipts: Vec::new(),
            ordered_at: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Goods receipts applied to this order, in application order.
    pub fn receipts(&self) -> &[GoodsReceiptId] {
        &self.receipts
    }

    pub fn ordered_at(&self) -> Option<DateTime<Utc>> {
        self.ordered_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn has_applied(&self, receipt_id: GoodsReceiptId) -> bool {
        self.receipts.contains(&receipt_id)
    }

    /// Open quantity for `product_id` across all of its lines.
    pub fn remaining_for(&self, product_id: ProductId) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(OrderLine::remaining)
            .sum()
    }

    /// Whether `cmd` describes the order already created here (a resubmission).
    ///
    /// The PO number is not compared: it may have been assigned on the first
    /// attempt.
    pub fn is_replay_of(&self, cmd: &CreatePurchaseOrder) -> bool {
        self.created
            && self.supplier_id == Some(cmd.supplier_id)
            && self.lines.len() == cmd.lines.len()
            && self.lines.iter().zip(&cmd.lines).all(|(have, want)| {
                have.product_id == want.product_id
                    && have.qty_ordered == want.qty_ordered
                    && have.unit_cost == want.unit_cost
            })
    }

    /// `Σ qty_ordered × unit_cost`.
    pub fn order_value(&self) -> Result<Money, DomainError> {
        self.lines.iter().try_fold(Money::ZERO, |acc, l| {
            acc.checked_add(l.unit_cost.checked_times(l.qty_ordered)?)
        })
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub supplier_id: SupplierId,
    pub lines: Vec<NewOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendPurchaseOrder (replace all lines; only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendPurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub lines: Vec<NewOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyReceipt.
///
/// Issued by the orchestrator alongside `RecordGoodsReceipt` so both commit
/// in one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReceipt {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub receipt_id: GoodsReceiptId,
    pub supplier_id: SupplierId,
    pub quantities: Vec<ReceivedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    Create(CreatePurchaseOrder),
    Amend(AmendPurchaseOrder),
    Confirm(ConfirmPurchaseOrder),
    Cancel(CancelPurchaseOrder),
    ApplyReceipt(ApplyReceipt),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub supplier_id: SupplierId,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderAmended {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceiptApplied.
///
/// Carries the per-line allocation and the resulting status, so replay never
/// has to re-run the allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptApplied {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub receipt_id: GoodsReceiptId,
    pub allocations: Vec<LineReceipt>,
    pub status: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    Created(PurchaseOrderCreated),
    Amended(PurchaseOrderAmended),
    Confirmed(PurchaseOrderConfirmed),
    Cancelled(PurchaseOrderCancelled),
    ReceiptApplied(ReceiptApplied),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::Created(_) => "purchasing.order.created",
            PurchaseOrderEvent::Amended(_) => "purchasing.order.amended",
            PurchaseOrderEvent::Confirmed(_) => "purchasing.order.confirmed",
            PurchaseOrderEvent::Cancelled(_) => "purchasing.order.cancelled",
            PurchaseOrderEvent::ReceiptApplied(_) => "purchasing.order.receipt_applied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::Created(e) => e.occurred_at,
            PurchaseOrderEvent::Amended(e) => e.occurred_at,
            PurchaseOrderEvent::Confirmed(e) => e.occurred_at,
            PurchaseOrderEvent::Cancelled(e) => e.occurred_at,
            PurchaseOrderEvent::ReceiptApplied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::Created(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.po_number = e.po_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.status = PurchaseOrderStatus::Draft;
                self.lines = e.lines.clone();
                self.ordered_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseOrderEvent::Amended(e) => {
                self.lines = e.lines.clone();
            }
            PurchaseOrderEvent::Confirmed(_) => {
                self.status = PurchaseOrderStatus::Confirmed;
            }
            PurchaseOrderEvent::Cancelled(e) => {
                self.status = PurchaseOrderStatus::Cancelled;
                self.cancel_reason = e.reason.clone();
            }
            PurchaseOrderEvent::ReceiptApplied(e) => {
                for allocation in &e.allocations {
                    if let Some(line) = self
                        .lines
                        .iter_mut()
                        .find(|l| l.line_no == allocation.line_no)
                    {
                        line.qty_received += allocation.quantity;
                    }
                }
                self.receipts.push(e.receipt_id);
                self.status = e.status;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::Amend(cmd) => self.handle_amend(cmd),
            PurchaseOrderCommand::Confirm(cmd) => self.handle_confirm(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            PurchaseOrderCommand::ApplyReceipt(cmd) => self.handle_apply_receipt(cmd),
        }
    }
}

fn build_lines(lines: &[NewOrderLine]) -> Result<Vec<OrderLine>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "purchase order needs at least one line",
        ));
    }

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line_no = (idx as u32) + 1;
            if line.qty_ordered <= 0 {
                return Err(DomainError::validation(format!(
                    "line {line_no}: qty_ordered must be positive"
                )));
            }
            if line.unit_cost.is_negative() {
                return Err(DomainError::validation(format!(
                    "line {line_no}: unit_cost cannot be negative"
                )));
            }
            Ok(OrderLine {
                line_no,
                product_id: line.product_id,
                qty_ordered: line.qty_ordered,
                qty_received: 0,
                unit_cost: line.unit_cost,
            })
        })
        .collect()
}

impl PurchaseOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("purchase order {order_id}")));
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_order_id(order_id)
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "purchase order {} already exists",
                self.po_number
            )));
        }
        if cmd.po_number.trim().is_empty() {
            return Err(DomainError::validation("po_number cannot be empty"));
        }
        let lines = build_lines(&cmd.lines)?;

        Ok(vec![PurchaseOrderEvent::Created(PurchaseOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            po_number: cmd.po_number.trim().to_string(),
            supplier_id: cmd.supplier_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_transition(self.status, "amend"));
        }
        let lines = build_lines(&cmd.lines)?;

        Ok(vec![PurchaseOrderEvent::Amended(PurchaseOrderAmended {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(
        &self,
        cmd: &ConfirmPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_transition(self.status, "confirm"));
        }

        Ok(vec![PurchaseOrderEvent::Confirmed(PurchaseOrderConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(self.status, "cancel"));
        }

        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        // Receipts already applied stay; only the open quantity becomes moot.
        Ok(vec![PurchaseOrderEvent::Cancelled(PurchaseOrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_receipt(
        &self,
        cmd: &ApplyReceipt,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.has_applied(cmd.receipt_id) {
            return Ok(Vec::new());
        }

        match self.status {
            PurchaseOrderStatus::Complete => {
                return Err(DomainError::AlreadyComplete(self.po_number.clone()));
            }
            PurchaseOrderStatus::Cancelled => {
                return Err(DomainError::invalid_state(format!(
                    "purchase order {} is cancelled",
                    self.po_number
                )));
            }
            PurchaseOrderStatus::Draft
            | PurchaseOrderStatus::Confirmed
            | PurchaseOrderStatus::PartiallyReceived => {}
        }

        if self.supplier_id != Some(cmd.supplier_id) {
            return Err(DomainError::validation(format!(
                "supplier {} does not match purchase order {}",
                cmd.supplier_id, self.po_number
            )));
        }
        if cmd.quantities.is_empty() {
            return Err(DomainError::validation("receipt has no lines"));
        }

        let mut requested: BTreeMap<ProductId, i64> = BTreeMap::new();
        for q in &cmd.quantities {
            if q.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "received quantity for product {} must be positive",
                    q.product_id
                )));
            }
            let total = requested.entry(q.product_id).or_insert(0);
            *total = total
                .checked_add(q.quantity)
                .ok_or_else(|| DomainError::invariant("quantity overflow"))?;
        }

        // Strict: a product over its open quantity fails the whole receipt.
        for (product_id, quantity) in &requested {
            let remaining = self.remaining_for(*product_id);
            if *quantity > remaining {
                return Err(DomainError::OverReceipt {
                    product: product_id.to_string(),
                    requested: *quantity,
                    remaining,
                });
            }
        }

        let mut allocations = Vec::new();
        let mut lines = self.lines.clone();
        for line in &mut lines {
            let Some(left) = requested.get_mut(&line.product_id) else {
                continue;
            };
            let take = (*left).min(line.remaining());
            if take > 0 {
                line.qty_received += take;
                *left -= take;
                allocations.push(LineReceipt {
                    line_no: line.line_no,
                    quantity: take,
                });
            }
        }

        let status = if lines.iter().all(OrderLine::is_fully_received) {
            PurchaseOrderStatus::Complete
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };

        Ok(vec![PurchaseOrderEvent::ReceiptApplied(ReceiptApplied {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            receipt_id: cmd.receipt_id,
            allocations,
            status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shopledger_events::execute;

    struct Fixture {
        tenant_id: TenantId,
        supplier_id: SupplierId,
        order: PurchaseOrder,
    }

    fn line(product_id: ProductId, qty: i64, cost: i64) -> NewOrderLine {
        NewOrderLine {
            product_id,
            qty_ordered: qty,
            unit_cost: Money::from_minor(cost),
        }
    }

    fn created(lines: Vec<NewOrderLine>) -> Fixture {
        let tenant_id = TenantId::new();
        let supplier_id = SupplierId::generate();
        let order_id = PurchaseOrderId::generate();
        let mut order = PurchaseOrder::empty(order_id);
        execute(
            &mut order,
            &PurchaseOrderCommand::Create(CreatePurchaseOrder {
                tenant_id,
                order_id,
                po_number: "PO-000001".to_string(),
                supplier_id,
                lines,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        Fixture {
            tenant_id,
            supplier_id,
            order,
        }
    }

    impl Fixture {
        fn confirm(&self) -> PurchaseOrderCommand {
            PurchaseOrderCommand::Confirm(ConfirmPurchaseOrder {
                tenant_id: self.tenant_id,
                order_id: self.order.id_typed(),
                occurred_at: Utc::now(),
            })
        }

        fn cancel(&self) -> PurchaseOrderCommand {
            PurchaseOrderCommand::Cancel(CancelPurchaseOrder {
                tenant_id: self.tenant_id,
                order_id: self.order.id_typed(),
                reason: Some("supplier out of stock".to_string()),
                occurred_at: Utc::now(),
            })
        }

        fn receive(&self, quantities: &[(ProductId, i64)]) -> PurchaseOrderCommand {
            PurchaseOrderCommand::ApplyReceipt(ApplyReceipt {
                tenant_id: self.tenant_id,
                order_id: self.order.id_typed(),
                receipt_id: GoodsReceiptId::generate(),
                supplier_id: self.supplier_id,
                quantities: quantities
                    .iter()
                    .map(|(product_id, quantity)| ReceivedQuantity {
                        product_id: *product_id,
                        quantity: *quantity,
                    })
                    .collect(),
                occurred_at: Utc::now(),
            })
        }
    }

    #[test]
    fn create_requires_lines_with_positive_quantities() {
        let order = PurchaseOrder::empty(PurchaseOrderId::generate());
        let base = CreatePurchaseOrder {
            tenant_id: TenantId::new(),
            order_id: order.id_typed(),
            po_number: "PO-000001".to_string(),
            supplier_id: SupplierId::generate(),
            lines: vec![],
            occurred_at: Utc::now(),
        };

        let empty = PurchaseOrderCommand::Create(base.clone());
        assert!(matches!(order.handle(&empty), Err(DomainError::Validation(_))));

        let zero_qty = PurchaseOrderCommand::Create(CreatePurchaseOrder {
            lines: vec![line(ProductId::generate(), 0, 10)],
            ..base.clone()
        });
        assert!(matches!(order.handle(&zero_qty), Err(DomainError::Validation(_))));

        let negative_cost = PurchaseOrderCommand::Create(CreatePurchaseOrder {
            lines: vec![line(ProductId::generate(), 1, -1)],
            ..base
        });
        assert!(matches!(
            order.handle(&negative_cost),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn new_order_is_draft_with_nothing_received() {
        let product = ProductId::generate();
        let f = created(vec![line(product, 10, 250), line(product, 2, 300)]);

        assert_eq!(f.order.status(), PurchaseOrderStatus::Draft);
        assert!(f.order.lines().iter().all(|l| l.qty_received == 0));
        assert_eq!(f.order.order_value().unwrap(), Money::from_minor(3100));
        assert_eq!(f.order.version(), 1);
    }

    #[test]
    fn confirm_only_from_draft() {
        let mut f = created(vec![line(ProductId::generate(), 1, 1)]);
        let cmd = f.confirm();
        execute(&mut f.order, &cmd).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::Confirmed);

        let err = f.order.handle(&f.confirm()).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("confirmed", "confirm"));
    }

    #[test]
    fn amend_only_in_draft() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 1, 1)]);
        let amend = PurchaseOrderCommand::Amend(AmendPurchaseOrder {
            tenant_id: f.tenant_id,
            order_id: f.order.id_typed(),
            lines: vec![line(product, 4, 100)],
            occurred_at: Utc::now(),
        });
        execute(&mut f.order, &amend).unwrap();
        assert_eq!(f.order.lines()[0].qty_ordered, 4);

        let cmd = f.confirm();
        execute(&mut f.order, &cmd).unwrap();
        assert!(matches!(
            f.order.handle(&amend),
            Err(DomainError::InvalidTransition { action: "amend", .. })
        ));
    }

    #[test]
    fn partial_then_full_receipt_completes_order() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 10, 100)]);
        let cmd = f.confirm();
        execute(&mut f.order, &cmd).unwrap();

        let cmd = f.receive(&[(product, 6)]);
        execute(&mut f.order, &cmd).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(f.order.lines()[0].qty_received, 6);

        let cmd = f.receive(&[(product, 4)]);
        execute(&mut f.order, &cmd).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::Complete);

        let err = f.order.handle(&f.receive(&[(product, 1)])).unwrap_err();
        assert_eq!(err, DomainError::AlreadyComplete("PO-000001".to_string()));
    }

    #[test]
    fn over_receipt_is_rejected_with_magnitudes() {
        let product = ProductId::generate();
        let f = created(vec![line(product, 5, 100)]);

        let err = f.order.handle(&f.receive(&[(product, 6)])).unwrap_err();
        assert_eq!(
            err,
            DomainError::OverReceipt {
                product: product.to_string(),
                requested: 6,
                remaining: 5,
            }
        );
        assert_eq!(f.order.lines()[0].qty_received, 0);
    }

    #[test]
    fn product_not_on_order_has_no_capacity() {
        let f = created(vec![line(ProductId::generate(), 5, 100)]);
        let stranger = ProductId::generate();

        let err = f.order.handle(&f.receive(&[(stranger, 1)])).unwrap_err();
        assert!(matches!(err, DomainError::OverReceipt { remaining: 0, .. }));
    }

    #[test]
    fn receipt_is_allocated_across_lines_in_order() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 3, 100), line(product, 5, 90)]);

        // Split across two receipt lines for the same product.
        let cmd = f.receive(&[(product, 2), (product, 3)]);
        let events = execute(&mut f.order, &cmd).unwrap();
        match &events[0] {
            PurchaseOrderEvent::ReceiptApplied(e) => assert_eq!(
                e.allocations,
                vec![
                    LineReceipt { line_no: 1, quantity: 3 },
                    LineReceipt { line_no: 2, quantity: 2 },
                ]
            ),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(f.order.remaining_for(product), 3);
    }

    #[test]
    fn supplier_mismatch_is_a_validation_error() {
        let product = ProductId::generate();
        let f = created(vec![line(product, 5, 100)]);
        let cmd = match f.receive(&[(product, 1)]) {
            PurchaseOrderCommand::ApplyReceipt(mut c) => {
                c.supplier_id = SupplierId::generate();
                PurchaseOrderCommand::ApplyReceipt(c)
            }
            _ => unreachable!(),
        };
        assert!(matches!(f.order.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn cancelled_order_rejects_receipts_and_keeps_history() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 10, 100)]);
        let cmd = f.receive(&[(product, 3)]);
        execute(&mut f.order, &cmd).unwrap();
        let cmd = f.cancel();
        execute(&mut f.order, &cmd).unwrap();

        assert_eq!(f.order.status(), PurchaseOrderStatus::Cancelled);
        assert_eq!(f.order.lines()[0].qty_received, 3);
        assert_eq!(f.order.cancel_reason(), Some("supplier out of stock"));
        assert!(matches!(
            f.order.handle(&f.receive(&[(product, 1)])),
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(
            f.order.handle(&f.cancel()),
            Err(DomainError::InvalidTransition { action: "cancel", .. })
        ));
    }

    #[test]
    fn complete_order_cannot_be_cancelled() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 2, 100)]);
        let cmd = f.receive(&[(product, 2)]);
        execute(&mut f.order, &cmd).unwrap();

        let err = f.order.handle(&f.cancel()).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("complete", "cancel"));
    }

    #[test]
    fn reapplying_the_same_receipt_is_a_no_op() {
        let product = ProductId::generate();
        let mut f = created(vec![line(product, 10, 100)]);
        let cmd = f.receive(&[(product, 4)]);
        execute(&mut f.order, &cmd).unwrap();

        assert!(execute(&mut f.order, &cmd).unwrap().is_empty());
        assert_eq!(f.order.lines()[0].qty_received, 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of receipts, accepted or not, every line
        /// keeps `0 <= qty_received <= qty_ordered`, received quantities never
        /// decrease, and the order is complete exactly when all lines are.
        #[test]
        fn no_over_receipt(
            ordered in prop::collection::vec(1i64..20, 1..4),
            receipts in prop::collection::vec(prop::collection::vec((0usize..4, 1i64..10), 1..3), 0..20),
        ) {
            let products: Vec<ProductId> = (0..4).map(|_| ProductId::generate()).collect();
            let lines = ordered
                .iter()
                .enumerate()
                .map(|(i, q)| line(products[i], *q, 100))
                .collect();
            let mut f = created(lines);

            for receipt in receipts {
                let quantities: Vec<(ProductId, i64)> =
                    receipt.iter().map(|(p, q)| (products[*p], *q)).collect();
                let before: Vec<i64> = f.order.lines().iter().map(|l| l.qty_received).collect();
                let cmd = f.receive(&quantities);
                let _ = execute(&mut f.order, &cmd);

                for (line, prev) in f.order.lines().iter().zip(before) {
                    prop_assert!(line.qty_received >= prev);
                    prop_assert!(line.qty_received <= line.qty_ordered);
                }
                let all_done = f.order.lines().iter().all(OrderLine::is_fully_received);
                prop_assert_eq!(all_done, f.order.status() == PurchaseOrderStatus::Complete);
            }
        }
    }
}
