//! Tagged error types for backend operations
//!
//! Every failure that reaches the database or a privileged operation is
//! wrapped with a log identifier. The identifier is written to the log when
//! the error is created and is returned to the caller, so a user-facing
//! message can be matched against the server log.
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::error::DatabaseError;
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), DatabaseError> {
//! sqlx::query("SELECT 1")
//!     .execute(&pool)
//!     .await
//!     .map_err(|e| DatabaseError::new("ping database", e))?;
//! # Ok(())
//! # }
//! ```

use sqlx::error::ErrorKind;
use uuid::Uuid;

/// A database operation failed
#[derive(Debug, thiserror::Error)]
#[error("Failed to {action} (log id {log_id}): {source}")]
pub struct DatabaseError {
    /// Short description of what was attempted, e.g. "fetch parcels"
    pub action: String,

    /// Identifier written to the log alongside the error
    pub log_id: Uuid,

    /// Underlying sqlx error
    #[source]
    pub source: sqlx::Error,
}

impl DatabaseError {
    /// Wraps a sqlx error and logs it under a fresh log id
    pub fn new(action: impl Into<String>, source: sqlx::Error) -> Self {
        let err = Self {
            action: action.into(),
            log_id: Uuid::new_v4(),
            source,
        };

        if err.is_not_found() {
            tracing::debug!(log_id = %err.log_id, action = %err.action, "Row not found");
        } else if err.kind().is_some() {
            tracing::warn!(
                log_id = %err.log_id,
                action = %err.action,
                error = %err.source,
                "Database constraint rejected the change"
            );
        } else {
            tracing::error!(
                log_id = %err.log_id,
                action = %err.action,
                error = %err.source,
                "Database operation failed"
            );
        }

        err
    }

    /// Whether the underlying error is a missing row
    pub fn is_not_found(&self) -> bool {
        matches!(self.source, sqlx::Error::RowNotFound)
    }

    /// Name of the violated constraint, if any
    pub fn constraint(&self) -> Option<&str> {
        match &self.source {
            sqlx::Error::Database(db_err) => db_err.constraint(),
            _ => None,
        }
    }

    /// Kind of constraint violation, `None` for every other failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match &self.source {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::Other => None,
                kind => Some(kind),
            },
            _ => None,
        }
    }

    /// Column named by the violated constraint, e.g. `collection_centre`
    /// for `parcels_collection_centre_fkey`
    pub fn constraint_field(&self) -> Option<String> {
        let sqlx::Error::Database(db_err) = &self.source else {
            return None;
        };
        db_err
            .constraint()
            .map(|constraint| field_from_constraint(constraint, db_err.table()))
    }
}

/// Strips the table prefix and the Postgres suffix from a constraint name
fn field_from_constraint(constraint: &str, table: Option<&str>) -> String {
    let mut field = constraint;
    if let Some(rest) = table.and_then(|t| field.strip_prefix(t)) {
        field = rest.trim_start_matches('_');
    }
    for suffix in ["_fkey", "_check", "_key", "_not_null"] {
        if let Some(rest) = field.strip_suffix(suffix) {
            field = rest;
            break;
        }
    }
    if field.is_empty() {
        constraint.to_string()
    } else {
        field.to_string()
    }
}

/// A privileged admin operation failed
///
/// Raised by the user management operations after the caller has passed the
/// admin gate, when the underlying user directory rejects the change.
#[derive(Debug, thiserror::Error)]
#[error("Admin operation '{operation}' failed (log id {log_id}): {message}")]
pub struct AdminOperationError {
    /// Operation name, e.g. "create-user"
    pub operation: &'static str,

    /// Identifier written to the log alongside the error
    pub log_id: Uuid,

    /// Human-readable reason
    pub message: String,
}

impl AdminOperationError {
    /// Creates and logs an admin operation error
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let log_id = Uuid::new_v4();

        tracing::error!(
            log_id = %log_id,
            operation = operation,
            message = %message,
            "Admin operation failed"
        );

        Self {
            operation,
            log_id,
            message,
        }
    }
}

/// Extension for attaching an action label to sqlx results
pub trait DbResultExt<T> {
    /// Converts the error into a [`DatabaseError`] tagged with `action`
    fn db_context(self, action: &str) -> Result<T, DatabaseError>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db_context(self, action: &str) -> Result<T, DatabaseError> {
        self.map_err(|e| DatabaseError::new(action, e))
    }
}
