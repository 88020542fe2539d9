//! Engine-level error: domain failures plus the infrastructure ones the engine adds.

use thiserror::Error;

use stockledger_core::{DomainError, ErrorKind, MovementId};

use crate::alerts::AlertStoreError;
use crate::event_store::EventStoreError;
use crate::ledger::LedgerStoreError;
use crate::locks::LockTimeout;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A balance or transfer lock was not acquired in time. Retryable.
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    #[error("ledger store failure: {0}")]
    Ledger(#[from] LedgerStoreError),

    #[error("alert store failure: {0}")]
    Alerts(#[from] AlertStoreError),

    #[error("event store failure: {0}")]
    EventStore(EventStoreError),

    /// Stored transfer events could not be decoded.
    #[error("failed to decode stored events: {0}")]
    Deserialize(String),

    /// A transfer leg was applied but neither its transition nor its reversal
    /// could be recorded. The movement stays applied and needs manual repair.
    #[error("movement {movement_id} could not be compensated: {reason}")]
    CompensationFailed {
        movement_id: MovementId,
        reason: String,
    },
}

impl From<EventStoreError> for EngineError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => EngineError::Domain(DomainError::conflict(msg)),
            other => EngineError::EventStore(other),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Domain(e) => e.kind(),
            EngineError::LockTimeout(_) => ErrorKind::Concurrency,
            EngineError::Ledger(_)
            | EngineError::Alerts(_)
            | EngineError::EventStore(_)
            | EngineError::Deserialize(_)
            | EngineError::CompensationFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Domain(e) => e.code(),
            EngineError::LockTimeout(_) => "LOCK_TIMEOUT",
            EngineError::Ledger(_) => "LEDGER_STORE_FAILURE",
            EngineError::Alerts(_) => "ALERT_STORE_FAILURE",
            EngineError::EventStore(_) => "EVENT_STORE_FAILURE",
            EngineError::Deserialize(_) => "EVENT_DECODE_FAILURE",
            EngineError::CompensationFailed { .. } => "COMPENSATION_FAILED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }

    /// The domain error behind this failure, if any.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            EngineError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_retryable_and_distinct_from_stock() {
        let timeout = EngineError::from(LockTimeout {
            resource: "balance".to_string(),
            waited_ms: 2000,
        });
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code(), "LOCK_TIMEOUT");

        let stock = EngineError::from(DomainError::InsufficientStock {
            available: 1,
            requested: 2,
        });
        assert!(!stock.is_retryable());
        assert_eq!(stock.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn store_version_conflicts_surface_as_concurrency() {
        let err = EngineError::from(EventStoreError::Concurrency("stale".to_string()));
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert!(err.is_retryable());
    }

    #[test]
    fn compensation_failure_is_internal_and_not_retryable() {
        let movement_id = MovementId::new();
        let err = EngineError::CompensationFailed {
            movement_id,
            reason: "insufficient stock".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code(), "COMPENSATION_FAILED");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains(&movement_id.to_string()));
    }
}
