use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_accounting::{DocumentTotals, Money, Priced, Settlement, TaxPercent};
use shopledger_core::{Aggregate, AggregateRoot, DomainError, TenantId, typed_id};
use shopledger_events::Event;
use shopledger_inventory::ProductId;
use shopledger_purchasing::{GoodsReceiptId, SupplierId};

use crate::check_priced_lines;
use crate::debit_note::PurchaseReturnId;

typed_id!(
    /// Purchase bill (supplier invoice) identifier.
    PurchaseBillId
);

typed_id!(
    /// Caller-chosen payment identifier; a repeated id is recorded once.
    PaymentId
);

/// Bill line snapshot (rate and tax as invoiced by the supplier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub rate: Money,
    pub tax_percent: TaxPercent,
}

impl Priced for BillLine {
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

/// Payment status derived from the settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    /// Returns pushed the due amount below zero; the supplier owes us.
    CreditBalance,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::CreditBalance => "credit_balance",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: PurchaseBill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseBill {
    id: PurchaseBillId,
    tenant_id: Option<TenantId>,
    bill_no: String,
    supplier_id: Option<SupplierId>,
    receipt_id: Option<GoodsReceiptId>,
    lines: Vec<BillLine>,
    totals: DocumentTotals,
    paid_amount: Money,
    initial_paid: Option<Money>,
    returned_amount: Money,
    settlement: Settlement,
    payments: Vec<PaymentId>,
    debit_notes: Vec<PurchaseReturnId>,
    billed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseBill {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseBillId) -> Self {
        Self {
            id,
            tenant_id: None,
            bill_no: String::new(),
            supplier_id: None,
            receipt_id: None,
            lines: Vec::new(),
            totals: DocumentTotals::default(),
            paid_amount: Money::ZERO,
            initial_paid: None,
            returned_amount: Money::ZERO,
            settlement: Settlement::default(),
            payments: Vec::new(),
            debit_notes: Vec::new(),
            billed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseBillId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn bill_no(&self) -> &str {
        &self.bill_no
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    /// The goods receipt this bill was raised against, if any.
    pub fn receipt_id(&self) -> Option<GoodsReceiptId> {
        self.receipt_id
    }

    pub fn lines(&self) -> &[BillLine] {
        &self.lines
    }

    pub fn totals(&self) -> DocumentTotals {
        self.totals
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    /// Sum of debit notes applied against this bill.
    pub fn returned_amount(&self) -> Money {
        self.returned_amount
    }

    pub fn settlement(&self) -> Settlement {
        self.settlement
    }

    pub fn due_amount(&self) -> Money {
        self.settlement.due_amount
    }

    pub fn credit_balance(&self) -> Money {
        self.settlement.credit_balance
    }

    pub fn billed_at(&self) -> Option<DateTime<Utc>> {
        self.billed_at
    }

    pub fn payments(&self) -> &[PaymentId] {
        &self.payments
    }

    pub fn debit_notes(&self) -> &[PurchaseReturnId] {
        &self.debit_notes
    }

    pub fn payment_status(&self) -> PaymentStatus {
        if self.settlement.has_credit() {
            PaymentStatus::CreditBalance
        } else if self.settlement.due_amount.is_zero() {
            PaymentStatus::Paid
        } else if self.paid_amount.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }

    /// Whether `cmd` describes the bill already created here (a resubmission).
    pub fn is_replay_of(&self, cmd: &CreateBill) -> bool {
        self.created
            && self.supplier_id == Some(cmd.supplier_id)
            && self.receipt_id == cmd.receipt_id
            && self.lines == cmd.lines
            && self.initial_paid == Some(cmd.paid_amount)
    }
}

impl AggregateRoot for PurchaseBill {
    type Id = PurchaseBillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBill {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub bill_no: String,
    pub supplier_id: SupplierId,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<BillLine>,
    /// Amount already paid when the bill is entered.
    pub paid_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseBillLines (only before any payment or debit note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseBillLines {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub lines: Vec<BillLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyDebitNote.
///
/// Issued by the orchestrator in the same unit of work as the return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDebitNote {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub return_id: PurchaseReturnId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseBillCommand {
    Create(CreateBill),
    ReviseLines(ReviseBillLines),
    RecordPayment(RecordPayment),
    ApplyDebitNote(ApplyDebitNote),
}

/// Event: BillCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillCreated {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub bill_no: String,
    pub supplier_id: SupplierId,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<BillLine>,
    pub totals: DocumentTotals,
    pub paid_amount: Money,
    pub settlement: Settlement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillLinesRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLinesRevised {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub lines: Vec<BillLine>,
    pub totals: DocumentTotals,
    pub settlement: Settlement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub new_paid_amount: Money,
    pub settlement: Settlement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DebitNoteApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitNoteApplied {
    pub tenant_id: TenantId,
    pub bill_id: PurchaseBillId,
    pub return_id: PurchaseReturnId,
    pub amount: Money,
    pub new_returned_amount: Money,
    pub settlement: Settlement,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseBillEvent {
    Created(BillCreated),
    LinesRevised(BillLinesRevised),
    PaymentRecorded(PaymentRecorded),
    DebitNoteApplied(DebitNoteApplied),
}

impl Event for PurchaseBillEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseBillEvent::Created(_) => "payables.bill.created",
            PurchaseBillEvent::LinesRevised(_) => "payables.bill.lines_revised",
            PurchaseBillEvent::PaymentRecorded(_) => "payables.bill.payment_recorded",
            PurchaseBillEvent::DebitNoteApplied(_) => "payables.bill.debit_note_applied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseBillEvent::Created(e) => e.occurred_at,
            PurchaseBillEvent::LinesRevised(e) => e.occurred_at,
            PurchaseBillEvent::PaymentRecorded(e) => e.occurred_at,
            PurchaseBillEvent::DebitNoteApplied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseBill {
    type Command = PurchaseBillCommand;
    type Event = PurchaseBillEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseBillEvent::Created(e) => {
                self.id = e.bill_id;
                self.tenant_id = Some(e.tenant_id);
                self.bill_no = e.bill_no.clone();
                self.supplier_id = Some(e.supplier_id);
                self.receipt_id = e.receipt_id;
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.paid_amount = e.paid_amount;
                self.initial_paid = Some(e.paid_amount);
                self.returned_amount = Money::ZERO;
                self.settlement = e.settlement;
                self.billed_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseBillEvent::LinesRevised(e) => {
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.settlement = e.settlement;
            }
            PurchaseBillEvent::PaymentRecorded(e) => {
                self.paid_amount = e.new_paid_amount;
                self.settlement = e.settlement;
                self.payments.push(e.payment_id);
            }
            PurchaseBillEvent::DebitNoteApplied(e) => {
                self.returned_amount = e.new_returned_amount;
                self.settlement = e.settlement;
                self.debit_notes.push(e.return_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseBillCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseBillCommand::ReviseLines(cmd) => self.handle_revise(cmd),
            PurchaseBillCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            PurchaseBillCommand::ApplyDebitNote(cmd) => self.handle_apply_debit_note(cmd),
        }
    }
}

impl PurchaseBill {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_bill_id(&self, bill_id: PurchaseBillId) -> Result<(), DomainError> {
        if self.id != bill_id {
            return Err(DomainError::invariant("bill_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, bill_id: PurchaseBillId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("purchase bill {bill_id}")));
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_bill_id(bill_id)
    }

    fn handle_create(&self, cmd: &CreateBill) -> Result<Vec<PurchaseBillEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "purchase bill {} already exists",
                self.bill_no
            )));
        }
        if cmd.bill_no.trim().is_empty() {
            return Err(DomainError::validation("bill_no cannot be empty"));
        }
        check_priced_lines(&cmd.lines, "purchase bill")?;
        if cmd.paid_amount.is_negative() {
            return Err(DomainError::validation("paid_amount cannot be negative"));
        }

        let totals = DocumentTotals::compute(&cmd.lines)?;
        if cmd.paid_amount > totals.total_amount {
            return Err(DomainError::OverPayment {
                requested: cmd.paid_amount.amount(),
                allowed: totals.total_amount.amount(),
            });
        }
        let settlement = Settlement::of(totals.total_amount, Money::ZERO, cmd.paid_amount)?;

        Ok(vec![PurchaseBillEvent::Created(BillCreated {
            tenant_id: cmd.tenant_id,
            bill_id: cmd.bill_id,
            bill_no: cmd.bill_no.trim().to_string(),
            supplier_id: cmd.supplier_id,
            receipt_id: cmd.receipt_id,
            lines: cmd.lines.clone(),
            totals,
            paid_amount: cmd.paid_amount,
            settlement,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseBillLines) -> Result<Vec<PurchaseBillEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.bill_id)?;

        if !self.paid_amount.is_zero() {
            return Err(DomainError::invalid_transition(
                self.payment_status(),
                "revise lines",
            ));
        }
        if !self.debit_notes.is_empty() {
            return Err(DomainError::invalid_transition("debit_noted", "revise lines"));
        }
        check_priced_lines(&cmd.lines, "purchase bill")?;

        let totals = DocumentTotals::compute(&cmd.lines)?;
        let settlement = Settlement::of(totals.total_amount, Money::ZERO, Money::ZERO)?;

        Ok(vec![PurchaseBillEvent::LinesRevised(BillLinesRevised {
            tenant_id: cmd.tenant_id,
            bill_id: cmd.bill_id,
            lines: cmd.lines.clone(),
            totals,
            settlement,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<PurchaseBillEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.bill_id)?;

        if self.payments.contains(&cmd.payment_id) {
            return Ok(Vec::new());
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let allowed = self.settlement.payable();
        if cmd.amount > allowed {
            return Err(DomainError::OverPayment {
                requested: cmd.amount.amount(),
                allowed: allowed.amount(),
            });
        }

        let new_paid_amount = self.paid_amount.checked_add(cmd.amount)?;
        let settlement = Settlement::of(
            self.totals.total_amount,
            self.returned_amount,
            new_paid_amount,
        )?;

        Ok(vec![PurchaseBillEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            bill_id: cmd.bill_id,
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            new_paid_amount,
            settlement,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_debit_note(
        &self,
        cmd: &ApplyDebitNote,
    ) -> Result<Vec<PurchaseBillEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.bill_id)?;

        if self.debit_notes.contains(&cmd.return_id) {
            return Ok(Vec::new());
        }
        if self.supplier_id != Some(cmd.supplier_id) {
            return Err(DomainError::validation(format!(
                "supplier {} does not match purchase bill {}",
                cmd.supplier_id, self.bill_no
            )));
        }
        if cmd.amount.is_negative() {
            return Err(DomainError::validation("debit note amount cannot be negative"));
        }

        // Reduces what is owed, never what was paid; an overpaid bill shows a credit.
        let new_returned_amount = self.returned_amount.checked_add(cmd.amount)?;
        let settlement = Settlement::of(
            self.totals.total_amount,
            new_returned_amount,
            self.paid_amount,
        )?;

        Ok(vec![PurchaseBillEvent::DebitNoteApplied(DebitNoteApplied {
            tenant_id: cmd.tenant_id,
            bill_id: cmd.bill_id,
            return_id: cmd.return_id,
            amount: cmd.amount,
            new_returned_amount,
            settlement,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use shopledger_events::execute;

    fn bill_line(quantity: i64, rate: i64) -> BillLine {
        BillLine {
            product_id: ProductId::generate(),
            quantity,
            rate: Money::from_minor(rate),
            tax_percent: TaxPercent::ZERO,
        }
    }

    fn create(lines: Vec<BillLine>, paid: i64) -> CreateBill {
        CreateBill {
            tenant_id: TenantId::new(),
            bill_id: PurchaseBillId::generate(),
            bill_no: "PB-000001".to_string(),
            supplier_id: SupplierId::generate(),
            receipt_id: None,
            lines,
            paid_amount: Money::from_minor(paid),
            occurred_at: Utc::now(),
        }
    }

    fn created(total: i64, paid: i64) -> PurchaseBill {
        let cmd = create(vec![bill_line(1, total)], paid);
        let mut bill = PurchaseBill::empty(cmd.bill_id);
        execute(&mut bill, &PurchaseBillCommand::Create(cmd)).unwrap();
        bill
    }

    fn pay(bill: &PurchaseBill, amount: i64) -> PurchaseBillCommand {
        PurchaseBillCommand::RecordPayment(RecordPayment {
            tenant_id: bill.tenant_id().unwrap(),
            bill_id: bill.id_typed(),
            payment_id: PaymentId::generate(),
            amount: Money::from_minor(amount),
            occurred_at: Utc::now(),
        })
    }

    fn debit(bill: &PurchaseBill, amount: i64) -> PurchaseBillCommand {
        PurchaseBillCommand::ApplyDebitNote(ApplyDebitNote {
            tenant_id: bill.tenant_id().unwrap(),
            bill_id: bill.id_typed(),
            return_id: PurchaseReturnId::generate(),
            supplier_id: bill.supplier_id().unwrap(),
            amount: Money::from_minor(amount),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn totals_include_tax() {
        let lines = vec![
            BillLine {
                tax_percent: TaxPercent::new(dec!(18)).unwrap(),
                ..bill_line(2, 250)
            },
            bill_line(1, 500),
        ];
        let cmd = create(lines, 90);
        let mut bill = PurchaseBill::empty(cmd.bill_id);
        execute(&mut bill, &PurchaseBillCommand::Create(cmd.clone())).unwrap();

        assert_eq!(bill.totals().subtotal, Money::from_minor(1000));
        assert_eq!(bill.totals().tax_total, Money::from_minor(90));
        assert_eq!(bill.totals().total_amount, Money::from_minor(1090));
        assert_eq!(bill.due_amount(), Money::from_minor(1000));
        assert_eq!(bill.payment_status(), PaymentStatus::PartiallyPaid);
        assert!(bill.is_replay_of(&cmd));
    }

    #[test]
    fn initial_payment_cannot_exceed_total() {
        let cmd = create(vec![bill_line(1, 100)], 101);
        let bill = PurchaseBill::empty(cmd.bill_id);
        let err = bill.handle(&PurchaseBillCommand::Create(cmd)).unwrap_err();
        assert_eq!(
            err,
            DomainError::OverPayment {
                requested: dec!(101),
                allowed: dec!(100),
            }
        );
    }

    #[test]
    fn payments_reduce_due_until_over_payment() {
        let mut bill = created(1000, 0);
        assert_eq!(bill.due_amount(), Money::from_minor(1000));

        let cmd = pay(&bill, 400);
        execute(&mut bill, &cmd).unwrap();
        assert_eq!(bill.paid_amount(), Money::from_minor(400));
        assert_eq!(bill.due_amount(), Money::from_minor(600));

        let before = bill.clone();
        let err = bill.handle(&pay(&bill, 700)).unwrap_err();
        assert_eq!(
            err,
            DomainError::OverPayment {
                requested: dec!(700),
                allowed: dec!(600),
            }
        );
        assert_eq!(bill, before);
    }

    #[test]
    fn payment_must_be_positive() {
        let bill = created(1000, 0);
        assert!(matches!(
            bill.handle(&pay(&bill, 0)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_payment_id_is_recorded_once() {
        let mut bill = created(1000, 0);
        let cmd = pay(&bill, 300);
        execute(&mut bill, &cmd).unwrap();
        assert!(execute(&mut bill, &cmd).unwrap().is_empty());
        assert_eq!(bill.paid_amount(), Money::from_minor(300));
    }

    #[test]
    fn return_on_paid_bill_surfaces_credit_balance() {
        let mut bill = created(1000, 1000);
        assert_eq!(bill.payment_status(), PaymentStatus::Paid);

        let cmd = debit(&bill, 200);
        execute(&mut bill, &cmd).unwrap();

        assert_eq!(bill.paid_amount(), Money::from_minor(1000));
        assert_eq!(bill.due_amount(), Money::from_minor(-200));
        assert_eq!(bill.credit_balance(), Money::from_minor(200));
        assert_eq!(bill.payment_status(), PaymentStatus::CreditBalance);
        assert!(matches!(
            bill.handle(&pay(&bill, 1)),
            Err(DomainError::OverPayment { .. })
        ));
    }

    #[test]
    fn debit_note_from_other_supplier_is_rejected() {
        let bill = created(1000, 0);
        let cmd = match debit(&bill, 100) {
            PurchaseBillCommand::ApplyDebitNote(mut c) => {
                c.supplier_id = SupplierId::generate();
                PurchaseBillCommand::ApplyDebitNote(c)
            }
            _ => unreachable!(),
        };
        assert!(matches!(bill.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn lines_are_frozen_after_payment_or_return() {
        let mut bill = created(1000, 0);
        let revise = PurchaseBillCommand::ReviseLines(ReviseBillLines {
            tenant_id: bill.tenant_id().unwrap(),
            bill_id: bill.id_typed(),
            lines: vec![bill_line(2, 300)],
            occurred_at: Utc::now(),
        });
        execute(&mut bill, &revise).unwrap();
        assert_eq!(bill.due_amount(), Money::from_minor(600));

        let mut paid = bill.clone();
        let cmd = pay(&paid, 100);
        execute(&mut paid, &cmd).unwrap();
        assert!(matches!(
            paid.handle(&revise),
            Err(DomainError::InvalidTransition { .. })
        ));

        let mut returned = bill;
        let cmd = debit(&returned, 100);
        execute(&mut returned, &cmd).unwrap();
        assert!(matches!(
            returned.handle(&revise),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: after any mix of payments and debit notes,
        /// `due == total − returned − paid` and paid never decreases.
        #[test]
        fn due_stays_consistent(
            total in 1i64..100_000,
            ops in prop::collection::vec((any::<bool>(), 1i64..50_000), 0..30),
        ) {
            let mut bill = created(total, 0);
            for (is_payment, amount) in ops {
                let paid_before = bill.paid_amount();
                let cmd = if is_payment { pay(&bill, amount) } else { debit(&bill, amount) };
                let _ = execute(&mut bill, &cmd);

                prop_assert!(bill.paid_amount() >= paid_before);
                prop_assert_eq!(
                    bill.due_amount(),
                    bill.totals().total_amount - bill.returned_amount() - bill.paid_amount()
                );
                prop_assert_eq!(bill.due_amount().is_negative(), bill.credit_balance().is_positive());
            }
        }
    }
}
