//! User model and database operations
//!
//! Users are staff accounts (admins and callers). A user's role lives in the
//! `profiles` table; creating or updating a user writes both rows in one
//! transaction.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email CITEXT NOT NULL UNIQUE,
//!     password_hash VARCHAR(255) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_login_at TIMESTAMPTZ
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::models::profile::UserRole;
//! use foodbank_shared::models::user::{CreateUser, User};
//! use foodbank_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let new_user = CreateUser {
//!     email: "volunteer@example.org".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     role: UserRole::Caller,
//! };
//!
//! let user = User::create(&pool, new_user).await?;
//! println!("Created user: {} ({})", user.id, user.role);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::profile::{Profile, UserRole};

/// User account
///
/// Passwords are stored as Argon2id hashes and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address (case-insensitive via CITEXT)
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// `None` if the user never logged in
    pub last_login_at: Option<DateTime<Utc>>,
}

/// User joined with their role, as returned by the admin endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserWithRole {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    pub role: UserRole,
}

/// Input for updating a user
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password_hash.is_none() && self.role.is_none()
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, created_at, updated_at, last_login_at";

const USER_WITH_ROLE_SELECT: &str = r#"
    SELECT u.id, u.email, COALESCE(p.role, 'caller'::user_role) AS role,
           u.created_at, u.last_login_at
    FROM users u
    LEFT JOIN profiles p ON p.user_id = u.id"#;

impl User {
    /// Creates a user and their profile in one transaction
    ///
    /// # Errors
    ///
    /// Fails with a unique violation when the email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<UserWithRole, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(data.email)
        .bind(data.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let profile = Profile::create(&mut tx, user.id, data.role).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %profile.role, "Created user");

        Ok(UserWithRole {
            id: user.id,
            email: user.email,
            role: profile.role,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        })
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user with their role
    pub async fn find_with_role(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<UserWithRole>, sqlx::Error> {
        sqlx::query_as::<_, UserWithRole>(&format!("{} WHERE u.id = $1", USER_WITH_ROLE_SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Updates a user's email, password and role in one transaction
    ///
    /// Returns `None` if the user does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<UserWithRole>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE users SET updated_at = NOW()");
        if let Some(email) = data.email {
            builder.push(", email = ").push_bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            builder.push(", password_hash = ").push_bind(password_hash);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let updated = builder.build().execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(role) = data.role {
            Profile::set_role(&mut tx, id, role).await?;
        }

        let user = sqlx::query_as::<_, UserWithRole>(&format!(
            "{} WHERE u.id = $1",
            USER_WITH_ROLE_SELECT
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, role = %user.role, "Updated user");
        Ok(Some(user))
    }

    /// Deletes a user; the profile goes with it (cascade)
    ///
    /// Returns the deleted user, or `None` if they did not exist.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<UserWithRole>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, UserWithRole>(&format!(
            "{} WHERE u.id = $1 FOR UPDATE OF u",
            USER_WITH_ROLE_SELECT
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if user.is_some() {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if user.is_some() {
            tracing::info!(user_id = %id, "Deleted user");
        }
        Ok(user)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users with their roles, ordered by email
    pub async fn list(pool: &PgPool) -> Result<Vec<UserWithRole>, sqlx::Error> {
        sqlx::query_as::<_, UserWithRole>(&format!("{} ORDER BY u.email", USER_WITH_ROLE_SELECT))
            .fetch_all(pool)
            .await
    }

    /// Counts users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
