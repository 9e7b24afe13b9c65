//! # Payflow Types
//!
//! Domain types and port traits for the payflow transaction engine.
//! This crate has no IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate is the innermost core of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Payer, Payee, PaymentMethod, Transaction, AuditLogEntry)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    AccountId, AuditAction, AuditLogEntry, AuditLogId, MethodDetails, MethodFields, MethodStatus,
    MethodType, Money, PartyRole, PartyStatus, Payee, Payer, PaymentDetails, PaymentMethod,
    PaymentMethodId, Transaction, TransactionId, TransactionStatus, TransactionType,
};
pub use dto::*;
pub use error::{AppError, DomainError, ErrorKind, RepoError};
pub use ports::{AuditSink, LedgerRepository, LedgerUnit};
