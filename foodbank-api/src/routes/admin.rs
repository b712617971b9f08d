//! Staff account administration
//!
//! Every handler re-checks the caller's role; only admins get through.
//!
//! - `GET /v1/admin/users`
//! - `POST /v1/admin/create-user`
//! - `POST /v1/admin/update-user`
//! - `POST /v1/admin/delete-user`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use foodbank_shared::{
    auth::{authorization::require_admin, middleware::AuthContext, password::hash_password},
    error::{AdminOperationError, DbResultExt},
    forms::{CreateUserForm, DeleteUserForm, UpdateUserForm},
    models::user::{CreateUser, UpdateUser, User, UserWithRole},
};

fn hash_for(operation: &'static str, password: &str) -> Result<String, AdminOperationError> {
    hash_password(password).map_err(|e| AdminOperationError::new(operation, e.to_string()))
}

/// `GET /v1/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserWithRole>>> {
    require_admin(&state.db, &auth).await?;

    let users = User::list(&state.db).await.db_context("fetch users")?;
    Ok(Json(users))
}

/// `POST /v1/admin/create-user`
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<CreateUserForm>,
) -> ApiResult<(StatusCode, Json<UserWithRole>)> {
    require_admin(&state.db, &auth).await?;
    let role = form.check()?;

    let password_hash = hash_for("create-user", &form.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: form.email,
            password_hash,
            role,
        },
    )
    .await
    .db_context("create user")?;

    tracing::info!(admin = %auth.user_id, user_id = %user.id, role = %user.role, "User created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /v1/admin/update-user`
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<UpdateUserForm>,
) -> ApiResult<Json<UserWithRole>> {
    require_admin(&state.db, &auth).await?;
    let role = form.check()?;

    let password_hash = match form.password.as_deref() {
        Some(password) => Some(hash_for("update-user", password)?),
        None => None,
    };

    let user = User::update(
        &state.db,
        form.user_id,
        UpdateUser {
            email: form.email,
            password_hash,
            role,
        },
    )
    .await
    .db_context("update user")?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(admin = %auth.user_id, user_id = %user.id, "User updated");

    Ok(Json(user))
}

/// `POST /v1/admin/delete-user`
///
/// Admins cannot delete their own account.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<DeleteUserForm>,
) -> ApiResult<Json<UserWithRole>> {
    require_admin(&state.db, &auth).await?;

    if form.user_id == auth.user_id {
        return Err(ApiError::Conflict(
            "Cannot delete your own account".to_string(),
        ));
    }

    let user = User::delete(&state.db, form.user_id)
        .await
        .db_context("delete user")?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(admin = %auth.user_id, user_id = %user.id, "User deleted");

    Ok(Json(user))
}
