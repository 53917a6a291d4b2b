//! Payables domain module (event-sourced).
//!
//! Supplier bills with their payments, and purchase returns (debit notes)
//! that reduce what a bill still owes. Totals come from the ledger
//! arithmetic in `shopledger-accounting`; nothing here rounds.

pub mod bill;
pub mod debit_note;

use shopledger_accounting::Priced;
use shopledger_core::DomainError;

pub use bill::{
    ApplyDebitNote, BillCreated, BillLine, BillLinesRevised, CreateBill, DebitNoteApplied,
    PaymentId, PaymentRecorded, PaymentStatus, PurchaseBill, PurchaseBillCommand,
    PurchaseBillEvent, PurchaseBillId, RecordPayment, ReviseBillLines,
};
pub use debit_note::{
    PurchaseReturn, PurchaseReturnCommand, PurchaseReturnEvent, PurchaseReturnId,
    PurchaseReturnRecorded, RecordPurchaseReturn, ReturnLine,
};

/// Common checks for priced document lines.
fn check_priced_lines<L: Priced>(lines: &[L], document: &str) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation(format!(
            "{document} needs at least one line"
        )));
    }
    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.quantity() <= 0 {
            return Err(DomainError::validation(format!(
                "line {line_no}: quantity must be positive"
            )));
        }
        if line.rate().is_negative() {
            return Err(DomainError::validation(format!(
                "line {line_no}: rate cannot be negative"
            )));
        }
    }
    Ok(())
}
