//! Infrastructure layer: ledger storage, locking, processors, orchestration,
//! alerting, background jobs and configuration.
//!
//! Everything here is synchronous and thread-based; `StockEngine` is the facade the
//! HTTP layer drives.

pub mod alerts;
pub mod catalog;
pub mod command_dispatcher;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_store;
pub mod jobs;
pub mod ledger;
pub mod locks;
pub mod movements;
pub mod notifications;
pub mod read_model;
pub mod transfers;

pub use config::EngineConfig;
pub use engine::{EnginePorts, StockEngine};
pub use error::{EngineError, EngineResult};
