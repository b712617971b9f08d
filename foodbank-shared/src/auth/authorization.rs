//! Role checks
//!
//! Staff are either callers or admins. Admin-only operations call
//! [`require_admin`], which trusts the role claim carried in the access token
//! and only consults `profiles` when the token was minted without one.

use sqlx::PgPool;

use super::middleware::AuthContext;
use crate::error::{DatabaseError, DbResultExt};
use crate::models::profile::{Profile, UserRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Admin role required")]
    NotAdmin,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Resolves the caller's role, falling back to the stored profile
pub async fn resolve_role(pool: &PgPool, auth: &AuthContext) -> Result<UserRole, AuthzError> {
    if let Some(role) = auth.role {
        return Ok(role);
    }

    let role = Profile::get_role(pool, auth.user_id)
        .await
        .db_context("fetch user role")?;
    Ok(role.unwrap_or_default())
}

pub async fn require_admin(pool: &PgPool, auth: &AuthContext) -> Result<(), AuthzError> {
    if resolve_role(pool, auth).await?.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAdmin)
    }
}
