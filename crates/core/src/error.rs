//! Domain error model.

use thiserror::Error;

use crate::id::{AlertId, LocationId, MovementId, ProductId, TransferId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error category callers branch on.
///
/// - `Validation`: rejected before any mutation; safe to retry after fixing input.
/// - `Conflict`: a business rule blocked the operation given current state.
/// - `NotFound`: terminal for the request.
/// - `Concurrency`: retryable with backoff.
/// - `Internal`: infrastructure failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Concurrency,
    Internal,
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Quantity must be strictly positive.
    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    /// One or more required input fields were absent.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    /// Source and destination of a transfer are the same location.
    #[error("transfer source and destination must differ")]
    SameLocationTransfer,

    /// Inbound/outbound movements must carry a positive unit cost.
    #[error("unit cost must be greater than zero for this movement type")]
    UnitCostRequired,

    /// A price, cost or rate was negative or otherwise unusable.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The movement would drive the balance below zero.
    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: u64, requested: u64 },

    /// A status transition is not allowed from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("location not found: {0}")]
    LocationNotFound(LocationId),

    #[error("transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("movement not found: {0}")]
    MovementNotFound(MovementId),

    #[error("alert not found: {0}")]
    AlertNotFound(AlertId),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingRequiredFields(fields.into_iter().map(Into::into).collect())
    }

    pub fn invalid_price(msg: impl Into<String>) -> Self {
        Self::InvalidPrice(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_transition(from: impl core::fmt::Display, to: impl core::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidQuantity
            | DomainError::MissingRequiredFields(_)
            | DomainError::SameLocationTransfer
            | DomainError::UnitCostRequired
            | DomainError::InvalidPrice(_)
            | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::InsufficientStock { .. } | DomainError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            DomainError::ProductNotFound(_)
            | DomainError::LocationNotFound(_)
            | DomainError::TransferNotFound(_)
            | DomainError::MovementNotFound(_)
            | DomainError::AlertNotFound(_) => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Concurrency,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidQuantity => "INVALID_QUANTITY",
            DomainError::MissingRequiredFields(_) => "MISSING_REQUIRED_FIELDS",
            DomainError::SameLocationTransfer => "SAME_LOCATION_TRANSFER",
            DomainError::UnitCostRequired => "UNIT_COST_REQUIRED",
            DomainError::InvalidPrice(_) => "INVALID_PRICE",
            DomainError::InvalidId(_) => "INVALID_ID",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            DomainError::LocationNotFound(_) => "LOCATION_NOT_FOUND",
            DomainError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            DomainError::MovementNotFound(_) => "MOVEMENT_NOT_FOUND",
            DomainError::AlertNotFound(_) => "ALERT_NOT_FOUND",
            DomainError::Conflict(_) => "VERSION_CONFLICT",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_carries_context_in_message() {
        let err = DomainError::InsufficientStock {
            available: 10,
            requested: 15,
        };
        assert_eq!(err.to_string(), "insufficient stock (available: 10, requested: 15)");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = DomainError::missing_fields(["product_id", "to_location_id"]);
        assert_eq!(err.to_string(), "missing required fields: product_id, to_location_id");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn version_conflicts_are_retryable() {
        assert!(DomainError::conflict("stale").is_retryable());
        assert_eq!(
            DomainError::TransferNotFound(TransferId::generate()).kind(),
            ErrorKind::NotFound
        );
    }
}
