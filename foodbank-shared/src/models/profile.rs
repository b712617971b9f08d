//! User profiles and roles
//!
//! Each user has exactly one profile row holding their role. Admins may
//! manage other users; callers handle clients and parcels only.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE user_role AS ENUM ('admin', 'caller');
//!
//! CREATE TABLE profiles (
//!     primary_key UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
//!     role user_role NOT NULL DEFAULT 'caller',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Application role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Caller,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Caller => "caller",
        }
    }

    /// Parses a role name, rejecting anything outside the enum
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "caller" => Some(UserRole::Caller),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub primary_key: Uuid,
    pub user_id: Uuid,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Creates the profile for a new user inside the caller's transaction
    pub async fn create(
        conn: &mut PgConnection,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, role)
            VALUES ($1, $2)
            RETURNING primary_key, user_id, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(conn)
        .await
    }

    /// Looks up a user's role; `None` when the user has no profile
    pub async fn get_role(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRole>, sqlx::Error> {
        let role: Option<(UserRole,)> =
            sqlx::query_as("SELECT role FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;

        Ok(role.map(|(role,)| role))
    }

    /// Sets a user's role, creating the profile if it is missing
    pub async fn set_role(
        conn: &mut PgConnection,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING primary_key, user_id, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::from_str("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_str("caller"), Some(UserRole::Caller));
        assert_eq!(UserRole::from_str("Admin"), None);
        assert_eq!(UserRole::from_str("volunteer"), None);
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
        let role: UserRole = serde_json::from_str("\"caller\"").unwrap();
        assert_eq!(role, UserRole::Caller);
        assert!(serde_json::from_str::<UserRole>("\"owner\"").is_err());
    }

    #[test]
    fn test_default_role_is_caller() {
        assert_eq!(UserRole::default(), UserRole::Caller);
        assert!(!UserRole::default().is_admin());
        assert!(UserRole::Admin.is_admin());
    }
}
