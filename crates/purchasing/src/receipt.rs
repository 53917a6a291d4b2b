use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_accounting::Money;
use shopledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_id};
use shopledger_events::Event;
use shopledger_inventory::ProductId;

use crate::SupplierId;
use crate::order::{PurchaseOrderId, ReceivedQuantity};

typed_id!(
    /// Goods receipt (GRN) identifier.
    GoodsReceiptId
);

/// One received line: a snapshot of what physically arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    pub product_id: ProductId,
    pub batch_no: Option<String>,
    pub received_qty: i64,
    pub unit_cost: Money,
}

/// Aggregate root: GoodsReceipt.
///
/// Immutable once recorded; a correction is a new receipt or a return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceipt {
    id: GoodsReceiptId,
    tenant_id: Option<TenantId>,
    grn_number: String,
    order_id: Option<PurchaseOrderId>,
    supplier_id: Option<SupplierId>,
    lines: Vec<GoodsReceiptLine>,
    received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl GoodsReceipt {
    pub fn empty(id: GoodsReceiptId) -> Self {
        Self {
            id,
            tenant_id: None,
            grn_number: String::new(),
            order_id: None,
            supplier_id: None,
            lines: Vec::new(),
            received_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GoodsReceiptId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn grn_number(&self) -> &str {
        &self.grn_number
    }

    /// The purchase order this receipt was recorded against, if any.
    pub fn order_id(&self) -> Option<PurchaseOrderId> {
        self.order_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn lines(&self) -> &[GoodsReceiptLine] {
        &self.lines
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Received quantities in line order, as applied to a purchase order.
    pub fn received_quantities(&self) -> Vec<ReceivedQuantity> {
        self.lines
            .iter()
            .map(|l| ReceivedQuantity {
                product_id: l.product_id,
                quantity: l.received_qty,
            })
            .collect()
    }

    /// Whether `cmd` describes the receipt already recorded here (a resubmission).
    ///
    /// The GRN number is not compared: it may have been assigned on the first
    /// attempt.
    pub fn is_replay_of(&self, cmd: &RecordGoodsReceipt) -> bool {
        self.created
            && self.order_id == cmd.order_id
            && self.supplier_id == Some(cmd.supplier_id)
            && self.lines == normalize_lines(&cmd.lines)
    }
}

impl AggregateRoot for GoodsReceipt {
    type Id = GoodsReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordGoodsReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordGoodsReceipt {
    pub tenant_id: TenantId,
    pub receipt_id: GoodsReceiptId,
    pub grn_number: String,
    pub order_id: Option<PurchaseOrderId>,
    pub supplier_id: SupplierId,
    pub lines: Vec<GoodsReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsReceiptCommand {
    Record(RecordGoodsReceipt),
}

/// Event: GoodsReceiptRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptRecorded {
    pub tenant_id: TenantId,
    pub receipt_id: GoodsReceiptId,
    pub grn_number: String,
    pub order_id: Option<PurchaseOrderId>,
    pub supplier_id: SupplierId,
    pub lines: Vec<GoodsReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsReceiptEvent {
    Recorded(GoodsReceiptRecorded),
}

impl Event for GoodsReceiptEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GoodsReceiptEvent::Recorded(_) => "purchasing.goods_receipt.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GoodsReceiptEvent::Recorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for GoodsReceipt {
    type Command = GoodsReceiptCommand;
    type Event = GoodsReceiptEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GoodsReceiptEvent::Recorded(e) => {
                self.id = e.receipt_id;
                self.tenant_id = Some(e.tenant_id);
                self.grn_number = e.grn_number.clone();
                self.order_id = e.order_id;
                self.supplier_id = Some(e.supplier_id);
                self.lines = e.lines.clone();
                self.received_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GoodsReceiptCommand::Record(cmd) => self.handle_record(cmd),
        }
    }
}

fn normalize_lines(lines: &[GoodsReceiptLine]) -> Vec<GoodsReceiptLine> {
    lines
        .iter()
        .map(|l| GoodsReceiptLine {
            batch_no: l
                .batch_no
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            ..l.clone()
        })
        .collect()
}

impl GoodsReceipt {
    fn handle_record(&self, cmd: &RecordGoodsReceipt) -> Result<Vec<GoodsReceiptEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "goods receipt {} already recorded",
                self.grn_number
            )));
        }
        if cmd.grn_number.trim().is_empty() {
            return Err(DomainError::validation("grn_number cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("goods receipt needs at least one line"));
        }
        for (idx, line) in cmd.lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.received_qty <= 0 {
                return Err(DomainError::validation(format!(
                    "line {line_no}: received_qty must be positive"
                )));
            }
            if line.unit_cost.is_negative() {
                return Err(DomainError::validation(format!(
                    "line {line_no}: unit_cost cannot be negative"
                )));
            }
        }

        Ok(vec![GoodsReceiptEvent::Recorded(GoodsReceiptRecorded {
            tenant_id: cmd.tenant_id,
            receipt_id: cmd.receipt_id,
            grn_number: cmd.grn_number.trim().to_string(),
            order_id: cmd.order_id,
            supplier_id: cmd.supplier_id,
            lines: normalize_lines(&cmd.lines),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopledger_events::execute;

    fn record(lines: Vec<GoodsReceiptLine>) -> RecordGoodsReceipt {
        RecordGoodsReceipt {
            tenant_id: TenantId::new(),
            receipt_id: GoodsReceiptId::generate(),
            grn_number: "GRN-000001".to_string(),
            order_id: None,
            supplier_id: SupplierId::generate(),
            lines,
            occurred_at: Utc::now(),
        }
    }

    fn grn_line(qty: i64, batch: Option<&str>) -> GoodsReceiptLine {
        GoodsReceiptLine {
            product_id: ProductId::generate(),
            batch_no: batch.map(str::to_string),
            received_qty: qty,
            unit_cost: Money::from_minor(120),
        }
    }

    #[test]
    fn standalone_receipt_is_recorded() {
        let cmd = record(vec![grn_line(4, Some(" B-17 ")), grn_line(1, Some(""))]);
        let mut grn = GoodsReceipt::empty(cmd.receipt_id);
        execute(&mut grn, &GoodsReceiptCommand::Record(cmd.clone())).unwrap();

        assert!(grn.exists());
        assert_eq!(grn.order_id(), None);
        assert_eq!(grn.lines()[0].batch_no.as_deref(), Some("B-17"));
        assert_eq!(grn.lines()[1].batch_no, None);
        assert_eq!(grn.received_quantities()[0].quantity, 4);
        assert!(grn.is_replay_of(&cmd));
    }

    #[test]
    fn lines_must_receive_something() {
        let grn = GoodsReceipt::empty(GoodsReceiptId::generate());
        for cmd in [record(vec![]), record(vec![grn_line(0, None)])] {
            assert!(matches!(
                grn.handle(&GoodsReceiptCommand::Record(cmd)),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn recorded_receipt_is_immutable() {
        let cmd = record(vec![grn_line(2, None)]);
        let mut grn = GoodsReceipt::empty(cmd.receipt_id);
        execute(&mut grn, &GoodsReceiptCommand::Record(cmd.clone())).unwrap();

        let again = grn.handle(&GoodsReceiptCommand::Record(cmd));
        assert!(matches!(again, Err(DomainError::Conflict(_))));
        assert_eq!(grn.version(), 1);
    }

    #[test]
    fn different_payload_is_not_a_replay() {
        let cmd = record(vec![grn_line(2, None)]);
        let mut grn = GoodsReceipt::empty(cmd.receipt_id);
        execute(&mut grn, &GoodsReceiptCommand::Record(cmd.clone())).unwrap();

        let mut changed = cmd;
        changed.lines[0].received_qty = 3;
        assert!(!grn.is_replay_of(&changed));
    }
}
