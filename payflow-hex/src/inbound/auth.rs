//! Caller identity middleware.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the gateway has put the user's id in the `x-user-id` header.

use axum::{
    Json,
    body::Body,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use payflow_types::AccountId;

use super::handlers::CallerId;

pub const USER_ID_HEADER: &str = "x-user-id";

fn parse_caller(header: Option<&str>) -> Option<AccountId> {
    header?.trim().parse().ok()
}

/// Routes reachable without a caller identity.
fn is_public(method: &Method, path: &str) -> bool {
    path == "/health"
        || path.starts_with("/api-docs")
        || (path == "/api/accounts" && method == Method::POST)
}

/// Resolves the caller from `x-user-id` and stores it as a [`CallerId`]
/// request extension. Missing or malformed ids get a 401.
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    match parse_caller(header) {
        Some(user) => {
            request.extensions_mut().insert(CallerId(user));
            next.run(request).await
        }
        None => unauthorized_response("missing or invalid x-user-id header"),
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "reason": "unauthenticated",
            "code": 401
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_caller_uuid() {
        let id = AccountId::new();
        assert_eq!(parse_caller(Some(&id.to_string())), Some(id));
    }

    #[test]
    fn test_parse_caller_trims_whitespace() {
        let id = AccountId::new();
        assert_eq!(parse_caller(Some(&format!(" {id} "))), Some(id));
    }

    #[test]
    fn test_parse_caller_rejects_garbage() {
        assert_eq!(parse_caller(Some("alice")), None);
        assert_eq!(parse_caller(None), None);
    }

    #[test]
    fn test_public_routes() {
        assert!(is_public(&Method::GET, "/health"));
        assert!(is_public(&Method::POST, "/api/accounts"));
        assert!(is_public(&Method::GET, "/api-docs/openapi.json"));
        assert!(!is_public(&Method::GET, "/api/accounts/me"));
        assert!(!is_public(&Method::POST, "/api/transactions"));
    }
}
