//! Append-only audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuditLogId, TransactionId};

/// Labels written by the transaction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    TransactionCreated,
    TransactionFailed,
    ReservationRolledBack,
    TransactionRefunded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TransactionCreated => "Transaction Created",
            AuditAction::TransactionFailed => "Transaction Process Failed",
            AuditAction::ReservationRolledBack => "Reservation Rolled Back",
            AuditAction::TransactionRefunded => "Transaction Refunded",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of an attempted state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub transaction_id: TransactionId,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(transaction_id: TransactionId, action: AuditAction, details: impl Into<String>) -> Self {
        Self {
            id: AuditLogId::new(),
            transaction_id,
            action: action.as_str().to_string(),
            details: details.into(),
            created_at: Utc::now(),
        }
    }
}
