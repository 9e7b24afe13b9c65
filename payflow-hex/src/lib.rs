//! # Payflow Hex
//!
//! Application core and HTTP adapter for the payflow transaction engine.
//!
//! ## Architecture
//!
//! - `methods` - Payment method store (create, update, validate)
//! - `engine` - Transaction engine (Pending → Reserved → Completed/Failed)
//! - `audit` - Append-only audit trail writer
//! - `service` - Facade the inbound adapter talks to
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! Everything is generic over `R: LedgerRepository`, allowing
//! different repository implementations to be injected.

pub mod audit;
pub mod engine;
pub mod inbound;
pub mod methods;
pub mod openapi;
pub mod service;

#[cfg(test)]
mod engine_tests;

pub use audit::AuditTrail;
pub use engine::{EngineConfig, TransactionEngine};
pub use methods::PaymentMethodStore;
pub use service::PaymentService;
