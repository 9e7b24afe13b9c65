//! Error types for the payflow engine.
//!
//! Three layers, innermost first: [`DomainError`] for rule violations,
//! [`RepoError`] for data access, [`AppError`] for what callers see.
//! Every variant that reaches a caller carries a stable `reason` string.

use rust_decimal::Decimal;

use crate::domain::{AccountId, PaymentMethodId, TransactionId, TransactionStatus};

/// Broad category of a failure, used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// Payer, payee, payment method or transaction absent.
    NotFound,
    /// Duplicate method, duplicate transaction id, refund amount mismatch.
    Conflict,
    /// Inactive method, detail mismatch, insufficient funds.
    State,
    /// Atomic-unit failure or connectivity.
    Storage,
}

/// Domain-level errors (business rule violations).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("payer and payee cannot be the same")]
    SelfPayment,

    #[error("invalid transaction payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Validation(String),

    #[error("payer not found: {0}")]
    PayerNotFound(AccountId),

    #[error("payee not found: {0}")]
    PayeeNotFound(AccountId),

    #[error("payment method not found: {0}")]
    PaymentMethodNotFound(PaymentMethodId),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("no valid payment method found")]
    NoValidPaymentMethod,

    #[error("payment method already exists")]
    DuplicateMethod,

    #[error("transaction already exists: {0}")]
    DuplicateTransaction(TransactionId),

    #[error("refund amount {got} does not match original amount {expected}")]
    RefundAmountMismatch { expected: Decimal, got: Decimal },

    #[error("transaction already refunded: {0}")]
    AlreadyRefunded(TransactionId),

    #[error("payment method is not active")]
    InactiveMethod,

    #[error("payment details do not match stored {0}")]
    MethodMismatch(&'static str),

    #[error("insufficient funds")]
    InsufficientFunds { available: Decimal, requested: Decimal },

    #[error("insufficient funds in payee account for refund")]
    InsufficientRefundFunds,

    #[error("transaction {id} is {status} and cannot be refunded")]
    NotRefundable {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("cannot move transaction from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

impl DomainError {
    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::NegativeAmount => "negative_amount",
            DomainError::NonPositiveAmount => "invalid_amount",
            DomainError::BalanceOverflow => "balance_overflow",
            DomainError::SelfPayment => "self_payment",
            DomainError::InvalidPayload(_) => "invalid_payload",
            DomainError::Validation(_) => "validation_error",
            DomainError::PayerNotFound(_) => "payer_not_found",
            DomainError::PayeeNotFound(_) => "payee_not_found",
            DomainError::PaymentMethodNotFound(_) => "payment_method_not_found",
            DomainError::TransactionNotFound(_) => "transaction_not_found",
            DomainError::NoValidPaymentMethod => "no_valid_payment_method",
            DomainError::DuplicateMethod => "duplicate_method",
            DomainError::DuplicateTransaction(_) => "duplicate_transaction",
            DomainError::RefundAmountMismatch { .. } => "refund_amount_mismatch",
            DomainError::AlreadyRefunded(_) => "already_refunded",
            DomainError::InactiveMethod => "inactive_method",
            DomainError::MethodMismatch(_) => "method_mismatch",
            DomainError::InsufficientFunds { .. } => "insufficient_funds",
            DomainError::InsufficientRefundFunds => "insufficient_refund_funds",
            DomainError::NotRefundable { .. } => "not_refundable",
            DomainError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NegativeAmount
            | DomainError::NonPositiveAmount
            | DomainError::SelfPayment
            | DomainError::InvalidPayload(_)
            | DomainError::Validation(_) => ErrorKind::Validation,

            DomainError::PayerNotFound(_)
            | DomainError::PayeeNotFound(_)
            | DomainError::PaymentMethodNotFound(_)
            | DomainError::TransactionNotFound(_)
            | DomainError::NoValidPaymentMethod => ErrorKind::NotFound,

            DomainError::DuplicateMethod
            | DomainError::DuplicateTransaction(_)
            | DomainError::RefundAmountMismatch { .. }
            | DomainError::AlreadyRefunded(_) => ErrorKind::Conflict,

            DomainError::BalanceOverflow
            | DomainError::InactiveMethod
            | DomainError::MethodMismatch(_)
            | DomainError::InsufficientFunds { .. }
            | DomainError::InsufficientRefundFunds
            | DomainError::NotRefundable { .. }
            | DomainError::InvalidTransition { .. } => ErrorKind::State,
        }
    }
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors returned by the service layer.
///
/// Maps one-to-one onto [`ErrorKind`] so the HTTP boundary can pick a status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        reason: &'static str,
        message: String,
    },

    #[error("{message}")]
    NotFound {
        reason: &'static str,
        message: String,
    },

    #[error("{message}")]
    Conflict {
        reason: &'static str,
        message: String,
    },

    #[error("{message}")]
    State {
        reason: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Shorthand for a validation failure with the generic reason.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            reason: "validation_error",
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::State { .. } => ErrorKind::State,
            AppError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation { reason, .. }
            | AppError::NotFound { reason, .. }
            | AppError::Conflict { reason, .. }
            | AppError::State { reason, .. } => *reason,
            AppError::Storage(_) => "storage_error",
        }
    }

    fn of_kind(kind: ErrorKind, reason: &'static str, message: String) -> Self {
        match kind {
            ErrorKind::Validation => AppError::Validation { reason, message },
            ErrorKind::NotFound => AppError::NotFound { reason, message },
            ErrorKind::Conflict => AppError::Conflict { reason, message },
            ErrorKind::State => AppError::State { reason, message },
            ErrorKind::Storage => AppError::Storage(message),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::of_kind(err.kind(), err.reason(), err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound {
                reason: "not_found",
                message: "Resource not found".into(),
            },
            RepoError::Conflict(message) => AppError::Conflict {
                reason: "conflict",
                message,
            },
            RepoError::Database(e) => AppError::Storage(e),
            RepoError::Transaction(e) => AppError::Storage(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_maps_to_matching_kind() {
        let err: AppError = DomainError::InsufficientFunds {
            available: Decimal::new(10, 0),
            requested: Decimal::new(50, 0),
        }
        .into();
        assert!(matches!(
            err,
            AppError::State {
                reason: "insufficient_funds",
                ..
            }
        ));
        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn test_repo_domain_error_is_unwrapped() {
        let err: AppError = RepoError::Domain(DomainError::DuplicateMethod).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.reason(), "duplicate_method");
    }

    #[test]
    fn test_database_error_is_storage() {
        let err: AppError = RepoError::Database("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.reason(), "storage_error");
    }
}
