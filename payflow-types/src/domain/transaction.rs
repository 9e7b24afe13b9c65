//! Transaction domain model and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{AccountId, PaymentMethodId, TransactionId};
use super::money::Money;
use crate::error::DomainError;

/// The direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionType {
    /// Payer pays payee; the payer's funds are reserved first.
    Debit,
    /// Payee is credited; the payer balance is not touched.
    Credit,
    /// Reverses a completed transaction: payee pays the payer back.
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "Debit",
            TransactionType::Credit => "Credit",
            TransactionType::Refund => "Refund",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive.
impl std::str::FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            "refund" => Ok(TransactionType::Refund),
            _ => Err(DomainError::InvalidPayload(
                "invalid transaction type".into(),
            )),
        }
    }
}

/// Lifecycle status.
///
/// `Pending → Reserved → Completed`, `Pending|Reserved → Failed`,
/// and `Completed → Refunded` when a refund settles against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionStatus {
    Pending,
    Reserved,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Reserved => "Reserved",
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Refunded => "Refunded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Refunded
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TransactionStatus::Pending),
            "Reserved" => Ok(TransactionStatus::Reserved),
            "Completed" => Ok(TransactionStatus::Completed),
            "Failed" => Ok(TransactionStatus::Failed),
            "Refunded" => Ok(TransactionStatus::Refunded),
            other => Err(DomainError::Validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// A money movement between a payer and a payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub amount: Money,
    /// Funds held from the payer between reserve and settlement.
    pub reserved_amount: Money,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub payment_method_id: PaymentMethodId,
    /// Set on refunds: the transaction being reversed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a `Pending` transaction.
    ///
    /// # Validation
    /// - Amount must be greater than zero
    /// - Payer and payee must differ
    pub fn pending(
        id: TransactionId,
        payer_id: AccountId,
        payee_id: AccountId,
        amount: Money,
        transaction_type: TransactionType,
        payment_method_id: PaymentMethodId,
        original_transaction_id: Option<TransactionId>,
    ) -> Result<Self, DomainError> {
        if amount.is_zero() {
            return Err(DomainError::NonPositiveAmount);
        }
        if payer_id == payee_id {
            return Err(DomainError::SelfPayment);
        }

        let now = Utc::now();
        Ok(Self {
            id,
            payer_id,
            payee_id,
            amount,
            reserved_amount: Money::ZERO,
            transaction_type,
            status: TransactionStatus::Pending,
            payment_method_id,
            original_transaction_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs a transaction from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransactionId,
        payer_id: AccountId,
        payee_id: AccountId,
        amount: Money,
        reserved_amount: Money,
        transaction_type: TransactionType,
        status: TransactionStatus,
        payment_method_id: PaymentMethodId,
        original_transaction_id: Option<TransactionId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payer_id,
            payee_id,
            amount,
            reserved_amount,
            transaction_type,
            status,
            payment_method_id,
            original_transaction_id,
            created_at,
            updated_at,
        }
    }

    fn transition(&mut self, to: TransactionStatus) {
        self.status = to;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, to: TransactionStatus) -> DomainError {
        DomainError::InvalidTransition {
            from: self.status,
            to,
        }
    }

    /// `Pending → Reserved`, holding the full amount.
    pub fn reserve(&mut self) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Pending {
            return Err(self.invalid(TransactionStatus::Reserved));
        }
        self.reserved_amount = self.amount;
        self.transition(TransactionStatus::Reserved);
        Ok(())
    }

    /// `Pending|Reserved → Completed`, releasing the hold.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Reserved
        ) {
            return Err(self.invalid(TransactionStatus::Completed));
        }
        self.reserved_amount = Money::ZERO;
        self.transition(TransactionStatus::Completed);
        Ok(())
    }

    /// `Pending|Reserved → Failed`. Returns the amount that was held so the
    /// caller can hand it back to the payer.
    pub fn fail(&mut self) -> Result<Money, DomainError> {
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Reserved
        ) {
            return Err(self.invalid(TransactionStatus::Failed));
        }
        let released = self.reserved_amount;
        self.reserved_amount = Money::ZERO;
        self.transition(TransactionStatus::Failed);
        Ok(released)
    }

    /// Checks that this transaction can be reversed by a refund.
    pub fn ensure_refundable(&self) -> Result<(), DomainError> {
        match self.status {
            TransactionStatus::Completed if self.transaction_type != TransactionType::Refund => {
                Ok(())
            }
            TransactionStatus::Completed => Err(DomainError::InvalidPayload(
                "a refund cannot be refunded".into(),
            )),
            TransactionStatus::Refunded => Err(DomainError::AlreadyRefunded(self.id)),
            status => Err(DomainError::NotRefundable {
                id: self.id,
                status,
            }),
        }
    }

    /// `Completed → Refunded`.
    pub fn mark_refunded(&mut self) -> Result<(), DomainError> {
        self.ensure_refundable()?;
        self.transition(TransactionStatus::Refunded);
        Ok(())
    }
}
