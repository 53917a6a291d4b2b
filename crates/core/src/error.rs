//! Domain error model.
//!
//! Business-rule violations carry the attempted and allowed magnitudes so a
//! caller can correct the request instead of guessing.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, missing field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state-machine rule was violated (e.g. confirming a confirmed order).
    #[error("invalid transition: cannot {action} from {from}")]
    InvalidTransition { from: String, action: &'static str },

    /// Receiving more units than remain open on a purchase order.
    #[error("over-receipt of product {product}: requested {requested}, only {remaining} remaining")]
    OverReceipt {
        product: String,
        requested: i64,
        remaining: i64,
    },

    /// The purchase order is complete and accepts no further receipts.
    #[error("purchase order {0} is already complete")]
    AlreadyComplete(String),

    /// The referenced document is in a state that does not allow the operation.
    #[error("invalid document state: {0}")]
    InvalidState(String),

    /// Paying more than the outstanding amount (amounts in minor units).
    #[error("over-payment: requested {requested}, only {allowed} due")]
    OverPayment { requested: Decimal, allowed: Decimal },

    /// Stock would go negative.
    #[error("insufficient stock for product {product}: requested {requested}, only {available} available")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced document, product or supplier does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (duplicate document, reused number, ...).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(from: impl core::fmt::Display, action: &'static str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action,
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the error is a business-rule violation (as opposed to bad input,
    /// a missing reference or a conflict).
    pub fn is_business_violation(&self) -> bool {
        matches!(
            self,
            Self::OverReceipt { .. }
                | Self::AlreadyComplete(_)
                | Self::InvalidState(_)
                | Self::OverPayment { .. }
                | Self::InsufficientStock { .. }
                | Self::InvariantViolation(_)
        )
    }
}
