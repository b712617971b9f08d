//! Request authentication
//!
//! Extracts the bearer token from the `Authorization` header, validates it
//! as an access token and produces the [`AuthContext`] that handlers read
//! from request extensions.
//!
//! # Example
//!
//! ```no_run
//! use axum::{extract::Request, middleware::Next, response::Response};
//! use foodbank_shared::auth::middleware::{authenticate_bearer, AuthError};
//!
//! async fn auth_layer(mut req: Request, next: Next) -> Result<Response, AuthError> {
//!     let context = authenticate_bearer(req.headers(), "secret-key-at-least-32-bytes-long")?;
//!     req.extensions_mut().insert(context);
//!     Ok(next.run(req).await)
//! }
//! ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::profile::UserRole;

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Role claim from the token; `None` for tokens minted without one
    pub role: Option<UserRole>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Option<UserRole>) -> Self {
        Self { user_id, role }
    }
}

/// Authentication failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Token rejected
    #[error("{0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            AuthError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };

        let body = Json(serde_json::json!({
            "error": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Validates the bearer token in `headers`
pub fn authenticate_bearer(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    Ok(AuthContext::new(claims.sub, claims.role))
}
