//! HTTP API: server wiring, routing, and request/response mapping over the
//! stock engine.

pub mod app;
pub mod context;
pub mod middleware;
