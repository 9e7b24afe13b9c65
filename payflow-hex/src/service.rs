//! Payment Application Service
//!
//! Facade over the payment method store, the transaction engine and plain
//! ledger reads. Contains NO infrastructure logic - pure business orchestration.

use std::sync::Arc;

use payflow_types::{
    AccountId, AccountResponse, AppError, AuditLogEntry, AuditSink, CreatePaymentMethodRequest,
    DomainError, InitializeTransaction, LedgerRepository, Money, PartyRole, Payee, Payer,
    PaymentMethod, PaymentMethodId, RegisterAccountRequest, RepoError, SetBalanceRequest,
    Transaction, TransactionId, UpdateAccountRequest, UpdatePaymentMethodRequest,
};

use crate::audit::AuditTrail;
use crate::engine::{EngineConfig, TransactionEngine};
use crate::methods::PaymentMethodStore;

/// Application service for payment operations.
///
/// Generic over `R: LedgerRepository` - the adapter is injected at compile time.
/// The audit sink is a trait object so it can be swapped independently.
pub struct PaymentService<R: LedgerRepository> {
    repo: Arc<R>,
    methods: PaymentMethodStore<R>,
    engine: TransactionEngine<R>,
}

fn account_not_found(id: AccountId) -> AppError {
    AppError::NotFound {
        reason: "account_not_found",
        message: format!("account not found: {id}"),
    }
}

impl<R: LedgerRepository> PaymentService<R> {
    /// Creates a service with the default engine configuration.
    pub fn new(repo: Arc<R>, audit: Arc<dyn AuditSink>) -> Self {
        Self::with_config(repo, audit, EngineConfig::default())
    }

    pub fn with_config(repo: Arc<R>, audit: Arc<dyn AuditSink>, config: EngineConfig) -> Self {
        Self {
            methods: PaymentMethodStore::new(repo.clone()),
            engine: TransactionEngine::new(repo.clone(), AuditTrail::new(audit), config),
            repo,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Account Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registers a user as payer, payee or both under one fresh id.
    #[tracing::instrument(skip(self, req), fields(as_payer = req.as_payer, as_payee = req.as_payee))]
    pub async fn register_account(
        &self,
        req: RegisterAccountRequest,
    ) -> Result<AccountResponse, AppError> {
        if !req.as_payer && !req.as_payee {
            return Err(AppError::validation(
                "at least one of as_payer or as_payee is required",
            ));
        }

        let id = AccountId::new();
        let payer = req
            .as_payer
            .then(|| Payer::new(id, req.name.clone(), req.email.clone()))
            .transpose()?;
        let payee = req
            .as_payee
            .then(|| Payee::new(id, req.name.clone(), req.email.clone()))
            .transpose()?;

        let mut unit = self.repo.begin().await?;
        if let Some(payer) = &payer {
            unit.insert_payer(payer).await?;
        }
        if let Some(payee) = &payee {
            unit.insert_payee(payee).await?;
        }
        unit.commit().await?;

        tracing::info!(account_id = %id, "account registered");
        AccountResponse::from_parties(payer.as_ref(), payee.as_ref())
            .ok_or_else(|| account_not_found(id))
    }

    /// Merged payer/payee view of one user.
    pub async fn get_account(&self, id: AccountId) -> Result<AccountResponse, AppError> {
        let payer = self.repo.get_payer(id).await?;
        let payee = self.repo.get_payee(id).await?;
        AccountResponse::from_parties(payer.as_ref(), payee.as_ref())
            .ok_or_else(|| account_not_found(id))
    }

    pub async fn get_payer(&self, id: AccountId) -> Result<Payer, AppError> {
        self.repo
            .get_payer(id)
            .await?
            .ok_or_else(|| DomainError::PayerNotFound(id).into())
    }

    pub async fn get_payee(&self, id: AccountId) -> Result<Payee, AppError> {
        self.repo
            .get_payee(id)
            .await?
            .ok_or_else(|| DomainError::PayeeNotFound(id).into())
    }

    /// Changes name and/or email on every party row the user has.
    #[tracing::instrument(skip(self, req), fields(account_id = %id))]
    pub async fn update_account(
        &self,
        id: AccountId,
        req: UpdateAccountRequest,
    ) -> Result<AccountResponse, AppError> {
        if req.name.is_none() && req.email.is_none() {
            return Err(AppError::validation("nothing to update"));
        }

        let mut unit = self.repo.begin().await?;
        let mut payer = unit.payer_for_update(id).await?;
        let mut payee = unit.payee_for_update(id).await?;
        if payer.is_none() && payee.is_none() {
            return Err(account_not_found(id));
        }

        if let Some(payer) = payer.as_mut() {
            payer.update_profile(req.name.clone(), req.email.clone())?;
            unit.save_payer(payer).await?;
        }
        if let Some(payee) = payee.as_mut() {
            payee.update_profile(req.name.clone(), req.email.clone())?;
            unit.save_payee(payee).await?;
        }
        unit.commit().await?;

        tracing::info!(account_id = %id, "account updated");
        AccountResponse::from_parties(payer.as_ref(), payee.as_ref())
            .ok_or_else(|| account_not_found(id))
    }

    /// Overwrites one of the user's balances.
    #[tracing::instrument(skip(self, req), fields(account_id = %id, role = ?req.role))]
    pub async fn set_balance(
        &self,
        id: AccountId,
        req: SetBalanceRequest,
    ) -> Result<AccountResponse, AppError> {
        let balance = Money::new(req.balance)?;

        let result = match req.role {
            PartyRole::Payer => self.repo.set_payer_balance(id, balance).await,
            PartyRole::Payee => self.repo.set_payee_balance(id, balance).await,
        };
        match result {
            Err(RepoError::NotFound) => {
                return Err(match req.role {
                    PartyRole::Payer => DomainError::PayerNotFound(id),
                    PartyRole::Payee => DomainError::PayeeNotFound(id),
                }
                .into());
            }
            other => other?,
        }

        self.get_account(id).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Method Operations
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn create_payment_method(
        &self,
        payer_id: AccountId,
        req: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, AppError> {
        self.methods.create(payer_id, req).await
    }

    pub async fn list_payment_methods(
        &self,
        payer_id: AccountId,
    ) -> Result<Vec<PaymentMethod>, AppError> {
        self.methods.list(payer_id).await
    }

    pub async fn get_payment_method(
        &self,
        payer_id: AccountId,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, AppError> {
        self.methods.get(payer_id, id).await
    }

    pub async fn update_payment_method(
        &self,
        payer_id: AccountId,
        id: PaymentMethodId,
        req: UpdatePaymentMethodRequest,
    ) -> Result<PaymentMethod, AppError> {
        self.methods.update(payer_id, id, req).await
    }

    pub async fn validate_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, AppError> {
        self.methods.validate(id).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction Operations
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn initialize_transaction(
        &self,
        cmd: InitializeTransaction,
    ) -> Result<Transaction, AppError> {
        self.engine.initialize(cmd).await
    }

    pub async fn rollback_reservation(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.engine.rollback_reservation(id).await
    }

    /// Gets a transaction the user took part in, as payer or payee.
    pub async fn get_transaction(
        &self,
        user: AccountId,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        match self.repo.get_transaction(id).await? {
            Some(tx) if tx.payer_id == user || tx.payee_id == user => Ok(tx),
            _ => Err(DomainError::TransactionNotFound(id).into()),
        }
    }

    /// Transactions where the user is payer or payee, newest first.
    pub async fn list_transactions(&self, user: AccountId) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions_for_party(user).await?)
    }

    /// Audit trail of one of the user's transactions, oldest first.
    pub async fn list_audit_entries(
        &self,
        user: AccountId,
        id: TransactionId,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        self.get_transaction(user, id).await?;
        Ok(self.repo.list_audit_entries(id).await?)
    }
}
