//! Repository port traits.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory) implement both traits.

use crate::domain::{
    AccountId, AuditLogEntry, MethodType, Money, PaymentMethod, PaymentMethodId, Payee, Payer,
    Transaction, TransactionId,
};
use crate::error::RepoError;

/// Plain CRUD over the ledger tables plus the atomic-unit primitive.
///
/// Methods on this trait each run on their own. Anything that moves money
/// goes through a [`LedgerUnit`] obtained from [`LedgerRepository::begin`].
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Payer / Payee Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_payer(&self, id: AccountId) -> Result<Option<Payer>, RepoError>;

    async fn get_payee(&self, id: AccountId) -> Result<Option<Payee>, RepoError>;

    /// Overwrites a payer balance. `RepoError::NotFound` if the payer is missing.
    async fn set_payer_balance(&self, id: AccountId, balance: Money) -> Result<(), RepoError>;

    /// Overwrites a payee balance. `RepoError::NotFound` if the payee is missing.
    async fn set_payee_balance(&self, id: AccountId, balance: Money) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Method Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a method. An active method with the same payer, type and
    /// identifying field yields `RepoError::Conflict`.
    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<(), RepoError>;

    async fn get_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepoError>;

    /// Finds an active method for `payer_id` whose identifying field equals `fingerprint`.
    async fn find_active_payment_method(
        &self,
        payer_id: AccountId,
        method_type: MethodType,
        fingerprint: &str,
    ) -> Result<Option<PaymentMethod>, RepoError>;

    async fn list_payment_methods(
        &self,
        payer_id: AccountId,
    ) -> Result<Vec<PaymentMethod>, RepoError>;

    /// Persists status, details and `updated_at`. Same conflict rule as insert.
    async fn update_payment_method(&self, method: &PaymentMethod) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a new row. A reused id yields `RepoError::Conflict`.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), RepoError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    /// Transactions where the user is payer or payee, newest first.
    async fn list_transactions_for_party(
        &self,
        id: AccountId,
    ) -> Result<Vec<Transaction>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Audit & Atomic Units
    // ─────────────────────────────────────────────────────────────────────────────

    /// Audit entries for one transaction, oldest first.
    async fn list_audit_entries(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AuditLogEntry>, RepoError>;

    /// Opens a serializable atomic unit.
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, RepoError>;
}

/// One atomic, serializable unit of work.
///
/// Reads lock the rows they return until the unit ends. Nothing is visible
/// to other units before [`LedgerUnit::commit`]; dropping an uncommitted
/// unit rolls it back.
#[async_trait::async_trait]
pub trait LedgerUnit: Send {
    /// Inserts a new payer row. An existing id yields `RepoError::Conflict`.
    async fn insert_payer(&mut self, payer: &Payer) -> Result<(), RepoError>;

    /// Inserts a new payee row. An existing id yields `RepoError::Conflict`.
    async fn insert_payee(&mut self, payee: &Payee) -> Result<(), RepoError>;

    async fn payer_for_update(&mut self, id: AccountId) -> Result<Option<Payer>, RepoError>;

    async fn payee_for_update(&mut self, id: AccountId) -> Result<Option<Payee>, RepoError>;

    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepoError>;

    /// Persists name, email, balance, status and `updated_at`.
    async fn save_payer(&mut self, payer: &Payer) -> Result<(), RepoError>;

    async fn save_payee(&mut self, payee: &Payee) -> Result<(), RepoError>;

    async fn save_transaction(&mut self, tx: &Transaction) -> Result<(), RepoError>;

    /// Makes every write in the unit visible at once. The unit is spent afterwards.
    async fn commit(&mut self) -> Result<(), RepoError>;
}
