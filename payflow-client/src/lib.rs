//! # Payflow Client SDK
//!
//! A typed Rust client for the Payflow API.

use payflow_types::{
    AccountResponse, AuditEntryView, CreatePaymentMethodRequest, CreateTransactionRequest,
    PartyRole, PaymentMethodId, PaymentMethodResponse, RegisterAccountRequest, SetBalanceRequest,
    TransactionId, TransactionResponse, TransactionView, UpdateAccountRequest,
    UpdatePaymentMethodRequest,
};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Header carrying the caller's account id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} {reason} - {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(serde::Deserialize)]
struct Validated {
    payment_method: PaymentMethodResponse,
}

/// Payflow API client.
pub struct PayflowClient {
    base_url: String,
    user_id: Option<String>,
    http: Client,
}

impl PayflowClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: None,
            http: Client::new(),
        }
    }

    /// Acts on behalf of the given account.
    pub fn with_user(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registers a new user as payer, payee or both.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        as_payer: bool,
        as_payee: bool,
    ) -> Result<AccountResponse, ClientError> {
        let req = RegisterAccountRequest {
            name: name.to_string(),
            email: email.to_string(),
            as_payer,
            as_payee,
        };
        self.send(Method::POST, "/api/accounts", Some(&req)).await
    }

    /// The caller's account.
    pub async fn me(&self) -> Result<AccountResponse, ClientError> {
        self.send::<_, ()>(Method::GET, "/api/accounts/me", None).await
    }

    /// Changes the caller's name and/or email.
    pub async fn update_account(
        &self,
        req: &UpdateAccountRequest,
    ) -> Result<AccountResponse, ClientError> {
        self.send(Method::PUT, "/api/accounts/me", Some(req)).await
    }

    /// Overwrites one of the caller's balances.
    pub async fn set_balance(
        &self,
        role: PartyRole,
        balance: Decimal,
    ) -> Result<AccountResponse, ClientError> {
        let req = SetBalanceRequest { role, balance };
        self.send(Method::PUT, "/api/accounts/me/balance", Some(&req))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Methods
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn create_payment_method(
        &self,
        req: &CreatePaymentMethodRequest,
    ) -> Result<PaymentMethodResponse, ClientError> {
        self.send(Method::POST, "/api/payment-methods", Some(req))
            .await
    }

    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethodResponse>, ClientError> {
        self.send::<_, ()>(Method::GET, "/api/payment-methods", None)
            .await
    }

    pub async fn get_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<PaymentMethodResponse, ClientError> {
        self.send::<_, ()>(Method::GET, &format!("/api/payment-methods/{id}"), None)
            .await
    }

    pub async fn update_payment_method(
        &self,
        id: PaymentMethodId,
        req: &UpdatePaymentMethodRequest,
    ) -> Result<PaymentMethodResponse, ClientError> {
        self.send(Method::PUT, &format!("/api/payment-methods/{id}"), Some(req))
            .await
    }

    /// Returns the method if it exists and is active.
    pub async fn validate_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<PaymentMethodResponse, ClientError> {
        let validated: Validated = self
            .send::<_, ()>(
                Method::POST,
                &format!("/api/payment-methods/validate/{id}"),
                None,
            )
            .await?;
        Ok(validated.payment_method)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Initializes a debit, credit or refund with the caller as payer.
    pub async fn create_transaction(
        &self,
        req: &CreateTransactionRequest,
    ) -> Result<TransactionResponse, ClientError> {
        self.send(Method::POST, "/api/transactions", Some(req)).await
    }

    pub async fn list_transactions(&self) -> Result<Vec<TransactionView>, ClientError> {
        self.send::<_, ()>(Method::GET, "/api/transactions", None)
            .await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<TransactionView, ClientError> {
        self.send::<_, ()>(Method::GET, &format!("/api/transactions/{id}"), None)
            .await
    }

    pub async fn audit_trail(&self, id: TransactionId) -> Result<Vec<AuditEntryView>, ClientError> {
        self.send::<_, ()>(Method::GET, &format!("/api/transactions/{id}/audit"), None)
            .await
    }

    async fn send<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(user) = &self.user_id {
            req = req.header(USER_ID_HEADER, user);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let (reason, message) = parse_error_body(&body);
            Err(ClientError::Api {
                status: status.as_u16(),
                reason,
                message,
            })
        }
    }
}

/// Pulls `reason` and `error` out of an error body, falling back to the raw text.
fn parse_error_body(body: &str) -> (String, String) {
    let value = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = |name: &str| {
        value
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|e| e.as_str())
            .map(String::from)
    };
    (
        field("reason").unwrap_or_else(|| "unknown".into()),
        field("error").unwrap_or_else(|| body.to_string()),
    )
}
