//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use payflow_types::LedgerRepository;

use super::auth::identity_middleware;
use super::handlers::{self, AppState};
use crate::PaymentService;
use crate::openapi::ApiDoc;

/// HTTP Server for the Payflow API.
pub struct HttpServer<R: LedgerRepository> {
    state: Arc<AppState<R>>,
}

impl<R: LedgerRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: PaymentService<R>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api-docs/openapi.json",
                get(|| async { Json(ApiDoc::openapi()) }),
            )
            .route("/api/accounts", post(handlers::register_account::<R>))
            .route(
                "/api/accounts/me",
                get(handlers::get_me::<R>).put(handlers::update_me::<R>),
            )
            .route("/api/accounts/me/balance", put(handlers::set_my_balance::<R>))
            .route(
                "/api/payment-methods",
                post(handlers::create_payment_method::<R>)
                    .get(handlers::list_payment_methods::<R>),
            )
            .route(
                "/api/payment-methods/{id}",
                get(handlers::get_payment_method::<R>).put(handlers::update_payment_method::<R>),
            )
            .route(
                "/api/payment-methods/validate/{id}",
                post(handlers::validate_payment_method::<R>),
            )
            .route(
                "/api/transactions",
                post(handlers::create_transaction::<R>).get(handlers::list_transactions::<R>),
            )
            .route("/api/transactions/{id}", get(handlers::get_transaction::<R>))
            .route(
                "/api/transactions/{id}/audit",
                get(handlers::list_audit_entries::<R>),
            )
            .layer(middleware::from_fn(identity_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
