//! Authentication endpoints
//!
//! - `POST /v1/auth/login`: exchange email and password for tokens
//! - `POST /v1/auth/refresh`: exchange a refresh token for a new access token
//!
//! Staff accounts are created by admins (see [`super::admin`]); there is no
//! self-registration.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use foodbank_shared::{
    auth::{jwt, password},
    error::DbResultExt,
    models::{profile::UserRole, user::User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,

    pub role: UserRole,

    pub access_token: String,

    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".to_string())
}

/// `POST /v1/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await
        .db_context("look up user")?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Rejected login with wrong password");
        return Err(invalid_credentials());
    }

    let account = User::find_with_role(&state.db, user.id)
        .await
        .db_context("fetch user role")?
        .ok_or_else(invalid_credentials)?;

    User::update_last_login(&state.db, user.id)
        .await
        .db_context("record login")?;

    let access_claims = jwt::Claims::new(user.id, Some(account.role), jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, None, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, role = %account.role, "User logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        role: account.role,
        access_token,
        refresh_token,
    }))
}

/// `POST /v1/auth/refresh`
///
/// The new access token carries the user's current role, so role changes
/// take effect at the next refresh. Deleted users cannot refresh.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let account = User::find_with_role(&state.db, claims.sub)
        .await
        .db_context("fetch user role")?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    let access_token =
        jwt::refresh_access_token(&req.refresh_token, state.jwt_secret(), Some(account.role))?;

    Ok(Json(RefreshResponse { access_token }))
}
