//! Payment method store: creation, lookup, updates and validation of
//! stored payment instruments.

use std::sync::Arc;

use chrono::Utc;

use payflow_types::{
    AccountId, AppError, CreatePaymentMethodRequest, DomainError, LedgerRepository,
    MethodDetails, MethodFields, MethodStatus, MethodType, PaymentMethod, PaymentMethodId,
    RepoError, UpdatePaymentMethodRequest,
};

/// Payment method operations over the ledger repository.
pub struct PaymentMethodStore<R: LedgerRepository> {
    repo: Arc<R>,
}

/// Maps a write failure, reading a storage conflict as a duplicate method.
fn duplicate_on_conflict(err: RepoError) -> AppError {
    match err {
        RepoError::Conflict(_) => DomainError::DuplicateMethod.into(),
        other => other.into(),
    }
}

/// Rejects fields that have no meaning for `method_type`.
fn reject_foreign_fields(
    method_type: MethodType,
    req: &UpdatePaymentMethodRequest,
) -> Result<(), DomainError> {
    let supplied = [
        ("card_number", req.card_number.is_some()),
        ("expiry_date", req.expiry_date.is_some()),
        ("account_number", req.account_number.is_some()),
        ("details", req.details.is_some()),
    ];
    let allowed: &[&str] = match method_type {
        MethodType::Card => &["card_number", "expiry_date"],
        MethodType::BankTransfer => &["account_number"],
        MethodType::Upi | MethodType::Wallet | MethodType::Cheque => &["details"],
    };

    for (field, present) in supplied {
        if present && !allowed.contains(&field) {
            return Err(DomainError::Validation(format!(
                "{field} does not apply to {method_type} payment methods"
            )));
        }
    }
    Ok(())
}

fn merge(mut base: MethodFields, req: &UpdatePaymentMethodRequest) -> MethodFields {
    if let Some(v) = &req.card_number {
        base.card_number = Some(v.clone());
    }
    if let Some(v) = &req.expiry_date {
        base.expiry_date = Some(v.clone());
    }
    if let Some(v) = &req.account_number {
        base.account_number = Some(v.clone());
    }
    if let Some(v) = &req.details {
        base.details = Some(v.clone());
    }
    base
}

impl<R: LedgerRepository> PaymentMethodStore<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Registers a payment method for `payer_id`.
    ///
    /// The check for an existing active method with the same identifier is
    /// backed by a unique index, so a racing insert still fails as a duplicate.
    #[tracing::instrument(skip(self, req), fields(payer_id = %payer_id, method_type = %req.method_type))]
    pub async fn create(
        &self,
        payer_id: AccountId,
        req: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, AppError> {
        if self.repo.get_payer(payer_id).await?.is_none() {
            return Err(DomainError::PayerNotFound(payer_id).into());
        }

        let method_type: MethodType = req.method_type.parse()?;
        let details = MethodDetails::from_fields(method_type, req.fields())?;

        if self
            .repo
            .find_active_payment_method(payer_id, method_type, details.fingerprint())
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateMethod.into());
        }

        let method = PaymentMethod::new(payer_id, details);
        self.repo
            .insert_payment_method(&method)
            .await
            .map_err(duplicate_on_conflict)?;

        tracing::info!(method_id = %method.id, "payment method created");
        Ok(method)
    }

    pub async fn list(&self, payer_id: AccountId) -> Result<Vec<PaymentMethod>, AppError> {
        Ok(self.repo.list_payment_methods(payer_id).await?)
    }

    /// Fetches a method owned by `payer_id`. Methods of other payers are
    /// reported as not found.
    pub async fn get(
        &self,
        payer_id: AccountId,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, AppError> {
        match self.repo.get_payment_method(id).await? {
            Some(method) if method.payer_id == payer_id => Ok(method),
            _ => Err(DomainError::PaymentMethodNotFound(id).into()),
        }
    }

    /// Applies a partial update and re-validates the merged details.
    #[tracing::instrument(skip(self, req), fields(payer_id = %payer_id, method_id = %id))]
    pub async fn update(
        &self,
        payer_id: AccountId,
        id: PaymentMethodId,
        req: UpdatePaymentMethodRequest,
    ) -> Result<PaymentMethod, AppError> {
        let mut method = self.get(payer_id, id).await?;
        let method_type = method.method_type();

        reject_foreign_fields(method_type, &req)?;
        let details = MethodDetails::from_fields(method_type, merge(method.details.to_fields(), &req))?;

        let status = req.status.unwrap_or(method.status);
        let rekeyed = details.fingerprint() != method.details.fingerprint();
        let reactivated = status == MethodStatus::Active && !method.is_active();

        if status == MethodStatus::Active && (rekeyed || reactivated) {
            let clash = self
                .repo
                .find_active_payment_method(payer_id, method_type, details.fingerprint())
                .await?;
            if clash.is_some_and(|other| other.id != id) {
                return Err(DomainError::DuplicateMethod.into());
            }
        }

        method.details = details;
        method.status = status;
        method.updated_at = Utc::now();

        self.repo
            .update_payment_method(&method)
            .await
            .map_err(duplicate_on_conflict)?;
        Ok(method)
    }

    /// Returns the method if it exists and is active.
    pub async fn validate(&self, id: PaymentMethodId) -> Result<PaymentMethod, AppError> {
        let method = self
            .repo
            .get_payment_method(id)
            .await?
            .ok_or(DomainError::PaymentMethodNotFound(id))?;
        method.ensure_active()?;
        Ok(method)
    }
}
