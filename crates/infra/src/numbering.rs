//! Document numbering (`PO-000001`, `GRN-000001`, ...).
//!
//! Numbers are unique per tenant and document kind. The generator is an
//! external collaborator of the lifecycle; the in-memory implementation is
//! what tests and the dev binary use.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use shopledger_core::{DomainError, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    PurchaseOrder,
    GoodsReceipt,
    PurchaseBill,
    PurchaseReturn,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::GoodsReceipt => "GRN",
            DocumentKind::PurchaseBill => "PB",
            DocumentKind::PurchaseReturn => "DN",
        }
    }

    fn format(self, n: u64) -> String {
        format!("{}-{:06}", self.prefix(), n)
    }
}

/// Sequence generator for human-facing document numbers.
pub trait DocumentNumbers: Send + Sync {
    /// Reserve a number. `requested` is a caller-supplied number; `None`
    /// issues the next one in sequence.
    fn assign(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        requested: Option<&str>,
    ) -> Result<String, DomainError>;

    /// Give back a number whose document was never recorded.
    fn release(&self, tenant_id: TenantId, kind: DocumentKind, number: &str);
}

impl<N> DocumentNumbers for Arc<N>
where
    N: DocumentNumbers + ?Sized,
{
    fn assign(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        requested: Option<&str>,
    ) -> Result<String, DomainError> {
        (**self).assign(tenant_id, kind, requested)
    }

    fn release(&self, tenant_id: TenantId, kind: DocumentKind, number: &str) {
        (**self).release(tenant_id, kind, number)
    }
}

#[derive(Debug, Default)]
struct Sequence {
    next: u64,
    issued: HashSet<String>,
    /// Released auto-numbers, reused lowest first.
    free: BTreeSet<u64>,
}

impl Sequence {
    fn next_number(&mut self, kind: DocumentKind) -> String {
        loop {
            let n = match self.free.pop_first() {
                Some(n) => n,
                None => {
                    self.next += 1;
                    self.next
                }
            };
            let number = kind.format(n);
            // A caller may have claimed this number explicitly.
            if self.issued.insert(number.clone()) {
                return number;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentNumbers {
    sequences: Mutex<HashMap<(TenantId, DocumentKind), Sequence>>,
}

impl InMemoryDocumentNumbers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentNumbers for InMemoryDocumentNumbers {
    fn assign(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        requested: Option<&str>,
    ) -> Result<String, DomainError> {
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| DomainError::invariant("numbering lock poisoned"))?;
        let seq = sequences.entry((tenant_id, kind)).or_default();

        match requested {
            Some(raw) => {
                let number = raw.trim();
                if number.is_empty() {
                    return Err(DomainError::validation(format!(
                        "{} number cannot be empty",
                        kind.prefix()
                    )));
                }
                if !seq.issued.insert(number.to_string()) {
                    return Err(DomainError::conflict(format!(
                        "document number {number} already in use"
                    )));
                }
                Ok(number.to_string())
            }
            None => Ok(seq.next_number(kind)),
        }
    }

    fn release(&self, tenant_id: TenantId, kind: DocumentKind, number: &str) {
        let Ok(mut sequences) = self.sequences.lock() else {
            return;
        };
        let Some(seq) = sequences.get_mut(&(tenant_id, kind)) else {
            return;
        };
        if !seq.issued.remove(number) {
            return;
        }

        let auto = number
            .strip_prefix(kind.prefix())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|digits| digits.parse::<u64>().ok())
            .filter(|n| *n <= seq.next && kind.format(*n) == number);
        if let Some(n) = auto {
            seq.free.insert(n);
        }
    }
}
