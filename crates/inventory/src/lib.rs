//! Stock ledger domain module.
//!
//! Business rules for balances, movements, transfers, alerts and pricing,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod alert;
pub mod balance;
pub mod events;
pub mod movement;
pub mod pricing;
pub mod transfer;

pub use alert::{
    Alert, AlertIntent, AlertRule, AlertSeverity, AlertStatus, AlertType, Batch, evaluate_expiry,
    evaluate_stock,
};
pub use balance::{BalanceKey, StockBalance};
pub use events::{AlertRaised, MovementRecorded, StockEvent};
pub use movement::{
    Movement, MovementEffect, MovementInput, MovementStatus, MovementType, StockCheck,
};
pub use pricing::{PriceBreakdown, PricingInput, TaxBreakdown};
pub use transfer::{
    CancelTransfer, CreateTransfer, ReceiveTransfer, ShipTransfer, Transfer, TransferCancelled,
    TransferCommand, TransferCreated, TransferEvent, TransferReceived, TransferShipped,
    TransferStatus,
};
