//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod audit;
mod repository;

pub use audit::AuditSink;
pub use repository::{LedgerRepository, LedgerUnit};
