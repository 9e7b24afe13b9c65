//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

mod auth;
pub(crate) mod handlers;
mod server;

pub use auth::USER_ID_HEADER;
pub use handlers::{CallerId, ValidationResponse};
pub use server::HttpServer;
