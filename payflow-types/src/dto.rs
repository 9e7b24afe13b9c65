//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    AccountId, AuditLogEntry, AuditLogId, MethodFields, MethodStatus, MethodType, PartyRole,
    PartyStatus, PaymentDetails, PaymentMethod, PaymentMethodId, Payee, Payer, Transaction,
    TransactionId, TransactionStatus, TransactionType,
};

// ─────────────────────────────────────────────────────────────────────────────
// Account DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a user as payer, payee, or both.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterAccountRequest {
    #[schema(example = "Alice")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[serde(default = "default_true")]
    pub as_payer: bool,
    #[serde(default)]
    pub as_payee: bool,
}

fn default_true() -> bool {
    true
}

/// A user's ledger view: one id, up to two balances.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: AccountId,
    #[schema(example = "Alice")]
    pub name: String,
    pub email: String,
    pub status: PartyStatus,
    /// Present when the user is registered as a payer
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "100.00")]
    pub payer_balance: Option<Decimal>,
    /// Present when the user is registered as a payee
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "0")]
    pub payee_balance: Option<Decimal>,
}

impl AccountResponse {
    /// Merges whichever party rows exist for one user.
    pub fn from_parties(payer: Option<&Payer>, payee: Option<&Payee>) -> Option<Self> {
        let (id, name, email, status) = match (payer, payee) {
            (Some(p), _) => (p.id, p.name.clone(), p.email.clone(), p.status),
            (None, Some(p)) => (p.id, p.name.clone(), p.email.clone(), p.status),
            (None, None) => return None,
        };
        Some(Self {
            id,
            name,
            email,
            status,
            payer_balance: payer.map(|p| p.balance.amount()),
            payee_balance: payee.map(|p| p.balance.amount()),
        })
    }
}

/// Request to change the caller's name and/or email. Omitted fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Alicia")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "alicia@example.com")]
    pub email: Option<String>,
}

/// Request to overwrite one of the caller's balances.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetBalanceRequest {
    pub role: PartyRole,
    #[schema(value_type = String, example = "100.00")]
    pub balance: Decimal,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment Method DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a payment method for the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentMethodRequest {
    /// One of card, bank_transfer, upi, wallet, cheque
    #[schema(example = "card")]
    pub method_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "4111111111111111")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "12/27")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    /// UPI id, wallet id, or cheque number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CreatePaymentMethodRequest {
    pub fn fields(&self) -> MethodFields {
        MethodFields {
            card_number: self.card_number.clone(),
            expiry_date: self.expiry_date.clone(),
            account_number: self.account_number.clone(),
            details: self.details.clone(),
        }
    }
}

/// Partial update of a payment method. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentMethodRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MethodStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodResponse {
    pub id: PaymentMethodId,
    pub payer_id: AccountId,
    pub method_type: MethodType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: MethodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentMethod> for PaymentMethodResponse {
    fn from(method: PaymentMethod) -> Self {
        let fields = method.details.to_fields();
        Self {
            id: method.id,
            payer_id: method.payer_id,
            method_type: method.method_type(),
            card_number: fields.card_number,
            expiry_date: fields.expiry_date,
            account_number: fields.account_number,
            details: fields.details,
            status: method.status,
            created_at: method.created_at,
            updated_at: method.updated_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Wire request for a new transaction.
///
/// `payer_id` and `status` are accepted for compatibility and ignored: the
/// payer is the authenticated caller and every transaction starts `Pending`.
/// For a refund, `transaction_id` names the transaction being reversed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<AccountId>,
    pub payee_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[schema(value_type = String, example = "40.00")]
    pub amount: Decimal,
    /// debit, credit or refund (any case)
    #[schema(example = "debit")]
    pub transaction_type: String,
    pub payment_method_id: PaymentMethodId,
    #[serde(default)]
    pub payment_details: PaymentDetails,
}

impl CreateTransactionRequest {
    /// Binds the request to the authenticated payer.
    pub fn into_command(self, payer_id: AccountId) -> InitializeTransaction {
        InitializeTransaction {
            transaction_id: self.transaction_id,
            payer_id,
            payee_id: self.payee_id,
            amount: self.amount,
            transaction_type: self.transaction_type,
            payment_method_id: self.payment_method_id,
            payment_details: self.payment_details,
        }
    }
}

/// Engine input for one transaction attempt.
#[derive(Debug, Clone)]
pub struct InitializeTransaction {
    /// Client-chosen id for debit/credit; the original transaction for a refund.
    pub transaction_id: Option<TransactionId>,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    pub amount: Decimal,
    pub transaction_type: String,
    pub payment_method_id: PaymentMethodId,
    pub payment_details: PaymentDetails,
}

/// Response after a successful transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    #[schema(example = "Transaction Completed Successfully.")]
    pub message: String,
}

impl TransactionResponse {
    pub fn completed(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            status: tx.status,
            message: "Transaction Completed Successfully.".into(),
        }
    }
}

/// Full transaction record as returned by lookups and listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionView {
    pub id: TransactionId,
    pub payer_id: AccountId,
    pub payee_id: AccountId,
    #[schema(value_type = String, example = "40.00")]
    pub amount: Decimal,
    #[schema(value_type = String, example = "0")]
    pub reserved_amount: Decimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub payment_method_id: PaymentMethodId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            payer_id: tx.payer_id,
            payee_id: tx.payee_id,
            amount: tx.amount.amount(),
            reserved_amount: tx.reserved_amount.amount(),
            transaction_type: tx.transaction_type,
            status: tx.status,
            payment_method_id: tx.payment_method_id,
            original_transaction_id: tx.original_transaction_id,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryView {
    pub id: AuditLogId,
    pub transaction_id: TransactionId,
    #[schema(example = "Transaction Created")]
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogEntry> for AuditEntryView {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            transaction_id: entry.transaction_id,
            action: entry.action,
            details: entry.details,
            created_at: entry.created_at,
        }
    }
}
