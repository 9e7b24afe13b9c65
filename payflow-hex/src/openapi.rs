//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payflow_types::domain::{
    AccountId, MethodStatus, MethodType, PartyRole, PartyStatus, PaymentDetails, PaymentMethodId,
    TransactionId, TransactionStatus, TransactionType,
};
use payflow_types::dto::{
    AccountResponse, AuditEntryView, CreatePaymentMethodRequest, CreateTransactionRequest,
    PaymentMethodResponse, RegisterAccountRequest, SetBalanceRequest, TransactionResponse,
    TransactionView, UpdateAccountRequest, UpdatePaymentMethodRequest,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::inbound::ValidationResponse;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Register a user as payer, payee or both
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "accounts",
    request_body = RegisterAccountRequest,
    responses(
        (status = 201, description = "Account registered", body = AccountResponse),
        (status = 400, description = "Invalid request")
    )
)]
async fn register_account() {}

/// The caller's account
#[utoipa::path(
    get,
    path = "/api/accounts/me",
    tag = "accounts",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Account details", body = AccountResponse),
        (status = 401, description = "Missing caller identity"),
        (status = 404, description = "Account not found")
    )
)]
async fn get_me() {}

/// Change the caller's name and/or email
#[utoipa::path(
    put,
    path = "/api/accounts/me",
    tag = "accounts",
    request_body = UpdateAccountRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Account updated", body = AccountResponse),
        (status = 400, description = "Empty request or blank value"),
        (status = 404, description = "Account not found")
    )
)]
async fn update_me() {}

/// Overwrite one of the caller's balances
#[utoipa::path(
    put,
    path = "/api/accounts/me/balance",
    tag = "accounts",
    request_body = SetBalanceRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Balance updated", body = AccountResponse),
        (status = 400, description = "Negative balance"),
        (status = 404, description = "Caller has no account in that role")
    )
)]
async fn set_my_balance() {}

/// Register a payment method for the caller
#[utoipa::path(
    post,
    path = "/api/payment-methods",
    tag = "payment-methods",
    request_body = CreatePaymentMethodRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Payment method created", body = PaymentMethodResponse),
        (status = 400, description = "Invalid details"),
        (status = 409, description = "Active method with the same identifier exists")
    )
)]
async fn create_payment_method() {}

/// List the caller's payment methods
#[utoipa::path(
    get,
    path = "/api/payment-methods",
    tag = "payment-methods",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Payment methods", body = Vec<PaymentMethodResponse>)
    )
)]
async fn list_payment_methods() {}

/// Get one of the caller's payment methods
#[utoipa::path(
    get,
    path = "/api/payment-methods/{id}",
    tag = "payment-methods",
    security(("user_id" = [])),
    params(
        ("id" = PaymentMethodId, Path, description = "Payment method ID (UUID)")
    ),
    responses(
        (status = 200, description = "Payment method", body = PaymentMethodResponse),
        (status = 404, description = "Payment method not found")
    )
)]
async fn get_payment_method() {}

/// Partially update a payment method
#[utoipa::path(
    put,
    path = "/api/payment-methods/{id}",
    tag = "payment-methods",
    request_body = UpdatePaymentMethodRequest,
    security(("user_id" = [])),
    params(
        ("id" = PaymentMethodId, Path, description = "Payment method ID (UUID)")
    ),
    responses(
        (status = 200, description = "Payment method updated", body = PaymentMethodResponse),
        (status = 400, description = "Field not applicable or invalid"),
        (status = 404, description = "Payment method not found"),
        (status = 409, description = "Identifier already active")
    )
)]
async fn update_payment_method() {}

/// Check that a payment method exists and is active
#[utoipa::path(
    post,
    path = "/api/payment-methods/validate/{id}",
    tag = "payment-methods",
    security(("user_id" = [])),
    params(
        ("id" = PaymentMethodId, Path, description = "Payment method ID (UUID)")
    ),
    responses(
        (status = 200, description = "Payment method is valid", body = ValidationResponse),
        (status = 404, description = "Payment method not found"),
        (status = 422, description = "Payment method is inactive")
    )
)]
async fn validate_payment_method() {}

/// Initialize and settle a transaction with the caller as payer
#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "transactions",
    request_body = CreateTransactionRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Transaction completed", body = TransactionResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Party or payment method not found"),
        (status = 409, description = "Duplicate transaction or refund mismatch"),
        (status = 422, description = "Insufficient funds or details mismatch"),
        (status = 500, description = "Storage failure or phase timeout")
    )
)]
async fn create_transaction() {}

/// List transactions where the caller is payer or payee
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transactions, newest first", body = Vec<TransactionView>)
    )
)]
async fn list_transactions() {}

/// Get one transaction
#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "transactions",
    security(("user_id" = [])),
    params(
        ("id" = TransactionId, Path, description = "Transaction ID (UUID)")
    ),
    responses(
        (status = 200, description = "Transaction", body = TransactionView),
        (status = 404, description = "Transaction not found")
    )
)]
async fn get_transaction() {}

/// Audit trail of one transaction
#[utoipa::path(
    get,
    path = "/api/transactions/{id}/audit",
    tag = "transactions",
    security(("user_id" = [])),
    params(
        ("id" = TransactionId, Path, description = "Transaction ID (UUID)")
    ),
    responses(
        (status = 200, description = "Audit entries, oldest first", body = Vec<AuditEntryView>),
        (status = 404, description = "Transaction not found")
    )
)]
async fn list_audit_entries() {}

/// OpenAPI documentation for the Payflow API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payflow Transaction Engine API",
        version = "1.0.0",
        description = "Payers, payees, payment methods and transactions with reserve-then-process settlement.\n\n## Identity\n\nAuthentication happens upstream. Every endpoint except `/health` and `POST /api/accounts` expects the caller's id in the `x-user-id` header:\n\n```\nx-user-id: 7f0c2c4e-4b7a-4d43-9a7e-1d2f0f3b9c11\n```",
        license(name = "MIT"),
    ),
    paths(
        health,
        register_account,
        get_me,
        update_me,
        set_my_balance,
        create_payment_method,
        list_payment_methods,
        get_payment_method,
        update_payment_method,
        validate_payment_method,
        create_transaction,
        list_transactions,
        get_transaction,
        list_audit_entries,
    ),
    components(
        schemas(
            RegisterAccountRequest,
            AccountResponse,
            UpdateAccountRequest,
            SetBalanceRequest,
            PartyRole,
            PartyStatus,
            CreatePaymentMethodRequest,
            UpdatePaymentMethodRequest,
            PaymentMethodResponse,
            ValidationResponse,
            MethodType,
            MethodStatus,
            CreateTransactionRequest,
            PaymentDetails,
            TransactionResponse,
            TransactionView,
            TransactionType,
            TransactionStatus,
            AuditEntryView,
            AccountId,
            PaymentMethodId,
            TransactionId,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "accounts", description = "Signup and balances"),
        (name = "payment-methods", description = "Stored payment instruments"),
        (name = "transactions", description = "Debit, credit and refund"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for the gateway-supplied caller id.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-user-id"))),
            );
        }
    }
}
