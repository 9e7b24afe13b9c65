//! Transaction engine.
//!
//! One call to [`TransactionEngine::initialize`] takes a transaction from
//! validation through `Pending`, an optional `Reserved` step for debits, and
//! on to `Completed` or `Failed`. Balance changes happen only inside ledger
//! units, one per phase, and every phase runs under a deadline. Any failure
//! after the `Pending` row exists is compensated by
//! [`TransactionEngine::rollback_reservation`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use payflow_types::{
    AppError, AuditAction, DomainError, ErrorKind, InitializeTransaction, LedgerRepository,
    Money, RepoError, Transaction, TransactionId, TransactionStatus, TransactionType,
};

use crate::audit::AuditTrail;

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Deadline for each atomic phase (reserve, process, rollback).
    pub phase_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(5),
        }
    }
}

pub struct TransactionEngine<R: LedgerRepository> {
    repo: Arc<R>,
    audit: AuditTrail,
    config: EngineConfig,
}

fn log_failure(err: &AppError) {
    match err.kind() {
        ErrorKind::Storage => tracing::error!(reason = err.reason(), error = %err, "transaction failed"),
        _ => tracing::warn!(reason = err.reason(), error = %err, "transaction rejected"),
    }
}

impl<R: LedgerRepository> TransactionEngine<R> {
    pub fn new(repo: Arc<R>, audit: AuditTrail, config: EngineConfig) -> Self {
        Self {
            repo,
            audit,
            config,
        }
    }

    /// Validates, persists and settles one transaction.
    ///
    /// Returns the `Completed` transaction. On failure the stored row, if one
    /// was written, ends `Failed` with no funds left reserved.
    #[tracing::instrument(
        skip(self, cmd),
        fields(
            payer_id = %cmd.payer_id,
            payee_id = %cmd.payee_id,
            amount = %cmd.amount,
            transaction_type = %cmd.transaction_type,
            transaction_id = tracing::field::Empty,
        )
    )]
    pub async fn initialize(&self, cmd: InitializeTransaction) -> Result<Transaction, AppError> {
        let tx = self.prepare(&cmd).await.inspect_err(log_failure)?;
        tracing::Span::current().record("transaction_id", tracing::field::display(tx.id));

        match self.settle(&tx).await {
            Ok(done) => {
                self.audit
                    .record(
                        done.id,
                        AuditAction::TransactionCreated,
                        format!(
                            "{} of {} from payer {} to payee {} completed",
                            done.transaction_type, done.amount, done.payer_id, done.payee_id
                        ),
                    )
                    .await;

                if let Some(original) = done.original_transaction_id {
                    self.audit
                        .record(
                            original,
                            AuditAction::TransactionRefunded,
                            format!("refunded by transaction {}", done.id),
                        )
                        .await;
                }

                tracing::info!(status = %done.status, "transaction completed");
                Ok(done)
            }
            Err(err) => {
                log_failure(&err);

                if let Err(rollback_err) = self
                    .within_deadline("rollback", self.rollback_reservation(tx.id))
                    .await
                {
                    tracing::error!(error = %rollback_err, "rollback after failure did not complete");
                }

                self.audit
                    .record(
                        tx.id,
                        AuditAction::TransactionFailed,
                        format!("{}: {}", err.reason(), err),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Returns a `Failed` transaction to a consistent state. Idempotent.
    ///
    /// - `Reserved`: the reserved amount goes back to the payer, status `Failed`
    /// - `Pending`: status `Failed`
    /// - anything terminal: left unchanged
    #[tracing::instrument(skip(self), fields(transaction_id = %id))]
    pub async fn rollback_reservation(&self, id: TransactionId) -> Result<Transaction, AppError> {
        // Payer id is needed up front to lock payer before transaction.
        let snapshot = self
            .repo
            .get_transaction(id)
            .await?
            .ok_or(DomainError::TransactionNotFound(id))?;
        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }

        let mut unit = self.repo.begin().await?;
        let mut payer = unit
            .payer_for_update(snapshot.payer_id)
            .await?
            .ok_or(DomainError::PayerNotFound(snapshot.payer_id))?;
        let mut tx = unit
            .transaction_for_update(id)
            .await?
            .ok_or(DomainError::TransactionNotFound(id))?;

        let was_reserved = match tx.status {
            TransactionStatus::Reserved => true,
            TransactionStatus::Pending => false,
            _ => return Ok(tx),
        };

        let released = tx.fail()?;
        if was_reserved {
            payer.credit(released)?;
            unit.save_payer(&payer).await?;
        }
        unit.save_transaction(&tx).await?;
        unit.commit().await?;

        if was_reserved {
            self.audit
                .record(
                    id,
                    AuditAction::ReservationRolledBack,
                    format!("released {released} back to payer {}", tx.payer_id),
                )
                .await;
        }
        tracing::info!(released = %released, "reservation rolled back");
        Ok(tx)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Validation and the Pending row
    // ─────────────────────────────────────────────────────────────────────────────

    async fn prepare(&self, cmd: &InitializeTransaction) -> Result<Transaction, AppError> {
        if cmd.payer_id == cmd.payee_id {
            return Err(DomainError::SelfPayment.into());
        }

        let payer = self
            .repo
            .get_payer(cmd.payer_id)
            .await?
            .ok_or(DomainError::PayerNotFound(cmd.payer_id))?;
        let payee = self
            .repo
            .get_payee(cmd.payee_id)
            .await?
            .ok_or(DomainError::PayeeNotFound(cmd.payee_id))?;

        let is_refund =
            cmd.transaction_type.parse::<TransactionType>().ok() == Some(TransactionType::Refund);

        // Refunds stay honorable against a method deactivated since.
        let method = self
            .repo
            .get_payment_method(cmd.payment_method_id)
            .await?
            .filter(|m| m.payer_id == payer.id && (is_refund || m.is_active()))
            .ok_or(DomainError::NoValidPaymentMethod)?;
        method.match_details(&cmd.payment_details)?;

        let transaction_type: TransactionType = cmd.transaction_type.parse()?;
        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount.into());
        }
        let amount = Money::new(cmd.amount)?;

        let (id, original) = match transaction_type {
            TransactionType::Refund => {
                let original = self.refundable_original(cmd, amount).await?;
                (TransactionId::new(), Some(original.id))
            }
            TransactionType::Debit | TransactionType::Credit => {
                let id = cmd.transaction_id.unwrap_or_default();
                if self.repo.get_transaction(id).await?.is_some() {
                    return Err(DomainError::DuplicateTransaction(id).into());
                }
                (id, None)
            }
        };

        let tx = Transaction::pending(
            id,
            payer.id,
            payee.id,
            amount,
            transaction_type,
            method.id,
            original,
        )?;

        self.repo.insert_transaction(&tx).await.map_err(|e| match e {
            RepoError::Conflict(_) => DomainError::DuplicateTransaction(id).into(),
            other => AppError::from(other),
        })?;

        tracing::debug!(transaction_id = %tx.id, "pending transaction stored");
        Ok(tx)
    }

    /// Loads and checks the transaction a refund request points at.
    async fn refundable_original(
        &self,
        cmd: &InitializeTransaction,
        amount: Money,
    ) -> Result<Transaction, AppError> {
        let original_id = cmd.transaction_id.ok_or_else(|| {
            DomainError::InvalidPayload("refund requires the original transaction_id".into())
        })?;
        let original = self
            .repo
            .get_transaction(original_id)
            .await?
            .ok_or(DomainError::TransactionNotFound(original_id))?;

        original.ensure_refundable()?;

        if original.payer_id != cmd.payer_id || original.payee_id != cmd.payee_id {
            return Err(DomainError::Validation(
                "refund payer and payee must match the original transaction".into(),
            )
            .into());
        }
        if original.amount != amount {
            return Err(DomainError::RefundAmountMismatch {
                expected: original.amount.amount(),
                got: amount.amount(),
            }
            .into());
        }
        Ok(original)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Settlement phases
    // ─────────────────────────────────────────────────────────────────────────────

    async fn within_deadline<T>(
        &self,
        phase: &'static str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.config.phase_timeout, fut)
            .await
            .map_err(|_| {
                AppError::Storage(format!(
                    "{phase} phase exceeded {}ms",
                    self.config.phase_timeout.as_millis()
                ))
            })?
    }

    async fn settle(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        if tx.transaction_type == TransactionType::Debit {
            self.check_balance(tx).await?;
            self.within_deadline("reserve", self.reserve_funds(tx)).await?;
        }
        self.within_deadline("process", self.process_payment(tx)).await
    }

    /// Early rejection before taking any lock. The reserve unit checks again.
    async fn check_balance(&self, tx: &Transaction) -> Result<(), AppError> {
        let payer = self
            .repo
            .get_payer(tx.payer_id)
            .await?
            .ok_or(DomainError::PayerNotFound(tx.payer_id))?;

        if !payer.has_sufficient_funds(&tx.amount) {
            return Err(DomainError::InsufficientFunds {
                available: payer.balance.amount(),
                requested: tx.amount.amount(),
            }
            .into());
        }
        Ok(())
    }

    async fn reserve_funds(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        let mut unit = self.repo.begin().await?;

        let mut payer = unit
            .payer_for_update(tx.payer_id)
            .await?
            .ok_or(DomainError::PayerNotFound(tx.payer_id))?;
        let mut locked = unit
            .transaction_for_update(tx.id)
            .await?
            .ok_or(DomainError::TransactionNotFound(tx.id))?;

        payer.debit(locked.amount)?;
        locked.reserve()?;

        unit.save_payer(&payer).await?;
        unit.save_transaction(&locked).await?;
        unit.commit().await?;

        tracing::debug!(reserved = %locked.reserved_amount, "funds reserved");
        Ok(locked)
    }

    async fn process_payment(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        let mut unit = self.repo.begin().await?;

        match tx.transaction_type {
            TransactionType::Debit | TransactionType::Credit => {
                let mut payee = unit
                    .payee_for_update(tx.payee_id)
                    .await?
                    .ok_or(DomainError::PayeeNotFound(tx.payee_id))?;
                payee.credit(tx.amount)?;
                unit.save_payee(&payee).await?;
            }
            TransactionType::Refund => {
                let original_id = tx.original_transaction_id.ok_or_else(|| {
                    DomainError::InvalidPayload("refund has no original transaction".into())
                })?;

                let mut payer = unit
                    .payer_for_update(tx.payer_id)
                    .await?
                    .ok_or(DomainError::PayerNotFound(tx.payer_id))?;
                let mut payee = unit
                    .payee_for_update(tx.payee_id)
                    .await?
                    .ok_or(DomainError::PayeeNotFound(tx.payee_id))?;
                let mut original = unit
                    .transaction_for_update(original_id)
                    .await?
                    .ok_or(DomainError::TransactionNotFound(original_id))?;

                original.ensure_refundable()?;
                if !payee.has_sufficient_funds(&original.amount) {
                    return Err(DomainError::InsufficientRefundFunds.into());
                }

                payee.debit(original.amount)?;
                payer.credit(original.amount)?;
                original.mark_refunded()?;

                unit.save_payer(&payer).await?;
                unit.save_payee(&payee).await?;
                unit.save_transaction(&original).await?;
            }
        }

        let mut done = unit
            .transaction_for_update(tx.id)
            .await?
            .ok_or(DomainError::TransactionNotFound(tx.id))?;
        done.complete()?;
        unit.save_transaction(&done).await?;
        unit.commit().await?;

        Ok(done)
    }
}
