//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use payflow_types::{
    AccountId, AppError, AuditEntryView, CreatePaymentMethodRequest, CreateTransactionRequest,
    ErrorKind, LedgerRepository, PaymentMethodId, PaymentMethodResponse, RegisterAccountRequest,
    SetBalanceRequest, TransactionId, TransactionResponse, TransactionView, UpdateAccountRequest,
    UpdatePaymentMethodRequest,
};

use crate::PaymentService;

/// Application state shared across handlers.
pub struct AppState<R: LedgerRepository> {
    pub service: PaymentService<R>,
}

/// Authenticated caller, inserted by the identity middleware.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub AccountId);

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::State => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "reason": self.0.reason(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| AppError::validation(format!("invalid {what} id")).into())
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(as_payer = req.as_payer, as_payee = req.as_payee))]
pub async fn register_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<RegisterAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.register_account(req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// The caller's merged payer/payee view.
#[tracing::instrument(skip(state), fields(user_id = %user))]
pub async fn get_me<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.get_account(user).await?;
    Ok(Json(account))
}

#[tracing::instrument(skip(state, req), fields(user_id = %user))]
pub async fn update_me<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.update_account(user, req).await?;
    Ok(Json(account))
}

#[tracing::instrument(skip(state, req), fields(user_id = %user, role = ?req.role))]
pub async fn set_my_balance<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Json(req): Json<SetBalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.set_balance(user, req).await?;
    Ok(Json(account))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment Methods
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a successful validation.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ValidationResponse {
    #[schema(example = "Payment method is valid")]
    pub message: String,
    pub payment_method: PaymentMethodResponse,
}

#[tracing::instrument(skip(state, req), fields(user_id = %user, method_type = %req.method_type))]
pub async fn create_payment_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Json(req): Json<CreatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state.service.create_payment_method(user, req).await?;
    Ok((StatusCode::CREATED, Json(PaymentMethodResponse::from(method))))
}

#[tracing::instrument(skip(state), fields(user_id = %user))]
pub async fn list_payment_methods<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state.service.list_payment_methods(user).await?;
    let body: Vec<PaymentMethodResponse> = methods.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[tracing::instrument(skip(state), fields(user_id = %user, method_id = %id))]
pub async fn get_payment_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: PaymentMethodId = parse_id(&id, "payment method")?;
    let method = state.service.get_payment_method(user, id).await?;
    Ok(Json(PaymentMethodResponse::from(method)))
}

#[tracing::instrument(skip(state, req), fields(user_id = %user, method_id = %id))]
pub async fn update_payment_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id: PaymentMethodId = parse_id(&id, "payment method")?;
    let method = state.service.update_payment_method(user, id, req).await?;
    Ok(Json(PaymentMethodResponse::from(method)))
}

#[tracing::instrument(skip(state), fields(method_id = %id))]
pub async fn validate_payment_method<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: PaymentMethodId = parse_id(&id, "payment method")?;
    let method = state.service.validate_payment_method(id).await?;
    Ok(Json(ValidationResponse {
        message: "Payment method is valid".into(),
        payment_method: method.into(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// Runs one transaction on a detached task so a dropped connection can't
/// cancel it between phases.
#[tracing::instrument(
    skip(state, req),
    fields(user_id = %user, payee_id = %req.payee_id, amount = %req.amount)
)]
pub async fn create_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = req.into_command(user);
    let task_state = state.clone();
    let tx = tokio::spawn(async move { task_state.service.initialize_transaction(cmd).await })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "transaction task aborted");
            AppError::Storage("transaction task aborted".into())
        })??;

    Ok((StatusCode::CREATED, Json(TransactionResponse::completed(&tx))))
}

#[tracing::instrument(skip(state), fields(user_id = %user))]
pub async fn list_transactions<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = state.service.list_transactions(user).await?;
    let body: Vec<TransactionView> = transactions.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[tracing::instrument(skip(state), fields(user_id = %user, transaction_id = %id))]
pub async fn get_transaction<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    let tx = state.service.get_transaction(user, id).await?;
    Ok(Json(TransactionView::from(tx)))
}

#[tracing::instrument(skip(state), fields(user_id = %user, transaction_id = %id))]
pub async fn list_audit_entries<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(CallerId(user)): Extension<CallerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: TransactionId = parse_id(&id, "transaction")?;
    let entries = state.service.list_audit_entries(user, id).await?;
    let body: Vec<AuditEntryView> = entries.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_status() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::State),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let result: Result<TransactionId, ApiError> = parse_id("nope", "transaction");
        let err = result.err().map(|e| e.0);
        assert!(matches!(err, Some(AppError::Validation { .. })));
    }
}
