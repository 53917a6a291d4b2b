use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_accounting::{DocumentTotals, Money, Priced, TaxPercent};
use shopledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_id};
use shopledger_events::Event;
use shopledger_inventory::ProductId;
use shopledger_purchasing::{GoodsReceiptId, SupplierId};

use crate::bill::PurchaseBillId;
use crate::check_priced_lines;

typed_id!(
    /// Purchase return (debit note) identifier.
    PurchaseReturnId
);

/// Returned line snapshot, priced like a bill line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub rate: Money,
    pub tax_percent: TaxPercent,
}

impl Priced for ReturnLine {
    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn rate(&self) -> Money {
        self.rate
    }

    fn tax_percent(&self) -> TaxPercent {
        self.tax_percent
    }
}

/// Aggregate root: PurchaseReturn.
///
/// Immutable once recorded; undoing a return means receiving the goods again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReturn {
    id: PurchaseReturnId,
    tenant_id: Option<TenantId>,
    return_no: String,
    supplier_id: Option<SupplierId>,
    bill_id: Option<PurchaseBillId>,
    receipt_id: Option<GoodsReceiptId>,
    lines: Vec<ReturnLine>,
    totals: DocumentTotals,
    reason: Option<String>,
    returned_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseReturn {
    pub fn empty(id: PurchaseReturnId) -> Self {
        Self {
            id,
            tenant_id: None,
            return_no: String::new(),
            supplier_id: None,
            bill_id: None,
            receipt_id: None,
            lines: Vec::new(),
            totals: DocumentTotals::default(),
            reason: None,
            returned_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseReturnId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn return_no(&self) -> &str {
        &self.return_no
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn bill_id(&self) -> Option<PurchaseBillId> {
        self.bill_id
    }

    pub fn receipt_id(&self) -> Option<GoodsReceiptId> {
        self.receipt_id
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }

    pub fn totals(&self) -> DocumentTotals {
        self.totals
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn is_replay_of(&self, cmd: &RecordPurchaseReturn) -> bool {
        self.created
            && self.supplier_id == Some(cmd.supplier_id)
            && self.bill_id == cmd.bill_id
            && self.receipt_id == cmd.receipt_id
            && self.lines == cmd.lines
    }
}

impl AggregateRoot for PurchaseReturn {
    type Id = PurchaseReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPurchaseReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchaseReturn {
    pub tenant_id: TenantId,
    pub return_id: PurchaseReturnId,
    pub return_no: String,
    pub supplier_id: SupplierId,
    pub bill_id: Option<PurchaseBillId>,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<ReturnLine>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseReturnCommand {
    Record(RecordPurchaseReturn),
}

/// Event: PurchaseReturnRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReturnRecorded {
    pub tenant_id: TenantId,
    pub return_id: PurchaseReturnId,
    pub return_no: String,
    pub supplier_id: SupplierId,
    pub bill_id: Option<PurchaseBillId>,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<ReturnLine>,
    pub totals: DocumentTotals,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseReturnEvent {
    Recorded(PurchaseReturnRecorded),
}

impl Event for PurchaseReturnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseReturnEvent::Recorded(_) => "payables.purchase_return.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseReturnEvent::Recorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseReturn {
    type Command = PurchaseReturnCommand;
    type Event = PurchaseReturnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseReturnEvent::Recorded(e) => {
                self.id = e.return_id;
                self.tenant_id = Some(e.tenant_id);
                self.return_no = e.return_no.clone();
                self.supplier_id = Some(e.supplier_id);
                self.bill_id = e.bill_id;
                self.receipt_id = e.receipt_id;
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.reason = e.reason.clone();
                self.returned_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseReturnCommand::Record(cmd) => self.handle_record(cmd),
        }
    }
}

impl PurchaseReturn {
    fn handle_record(
        &self,
        cmd: &RecordPurchaseReturn,
    ) -> Result<Vec<PurchaseReturnEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "purchase return {} already recorded",
                self.return_no
            )));
        }
        if cmd.return_no.trim().is_empty() {
            return Err(DomainError::validation("return_no cannot be empty"));
        }
        check_priced_lines(&cmd.lines, "purchase return")?;

        let totals = DocumentTotals::compute(&cmd.lines)?;
        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(vec![PurchaseReturnEvent::Recorded(PurchaseReturnRecorded {
            tenant_id: cmd.tenant_id,
            return_id: cmd.return_id,
            return_no: cmd.return_no.trim().to_string(),
            supplier_id: cmd.supplier_id,
            bill_id: cmd.bill_id,
            receipt_id: cmd.receipt_id,
            lines: cmd.lines.clone(),
            totals,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shopledger_events::execute;

    fn record(lines: Vec<ReturnLine>) -> RecordPurchaseReturn {
        RecordPurchaseReturn {
            tenant_id: TenantId::new(),
            return_id: PurchaseReturnId::generate(),
            return_no: "DN-000001".to_string(),
            supplier_id: SupplierId::generate(),
            bill_id: Some(PurchaseBillId::generate()),
            receipt_id: None,
            lines,
            reason: Some("  damaged in transit ".to_string()),
            occurred_at: Utc::now(),
        }
    }

    fn return_line(quantity: i64, rate: i64) -> ReturnLine {
        ReturnLine {
            product_id: ProductId::generate(),
            quantity,
            rate: Money::from_minor(rate),
            tax_percent: TaxPercent::new(dec!(5)).unwrap(),
        }
    }

    #[test]
    fn return_total_is_computed_like_a_bill() {
        let cmd = record(vec![return_line(2, 100)]);
        let mut ret = PurchaseReturn::empty(cmd.return_id);
        execute(&mut ret, &PurchaseReturnCommand::Record(cmd.clone())).unwrap();

        assert_eq!(ret.totals().subtotal, Money::from_minor(200));
        assert_eq!(ret.totals().tax_total, Money::from_minor(10));
        assert_eq!(ret.totals().total_amount, Money::from_minor(210));
        assert_eq!(ret.reason(), Some("damaged in transit"));
        assert!(ret.is_replay_of(&cmd));
    }

    #[test]
    fn quantities_must_be_positive() {
        let ret = PurchaseReturn::empty(PurchaseReturnId::generate());
        let cmd = record(vec![return_line(0, 100)]);
        assert!(matches!(
            ret.handle(&PurchaseReturnCommand::Record(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn recorded_return_is_immutable() {
        let cmd = record(vec![return_line(1, 100)]);
        let mut ret = PurchaseReturn::empty(cmd.return_id);
        execute(&mut ret, &PurchaseReturnCommand::Record(cmd.clone())).unwrap();

        assert!(matches!(
            ret.handle(&PurchaseReturnCommand::Record(cmd)),
            Err(DomainError::Conflict(_))
        ));
    }
}
