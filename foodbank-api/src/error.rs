/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. Errors are rendered as JSON:
///
/// ```json
/// {
///   "error": "not_found",
///   "message": "Parcel not found",
///   "log_id": "6d1f..."
/// }
/// ```
///
/// `log_id` is present when the failure was logged server-side under that
/// identifier; `details` is present for validation failures.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;
use std::fmt;
use uuid::Uuid;

use foodbank_shared::auth::authorization::AuthzError;
use foodbank_shared::auth::jwt::JwtError;
use foodbank_shared::auth::middleware::AuthError;
use foodbank_shared::auth::password::PasswordError;
use foodbank_shared::error::{AdminOperationError, DatabaseError};
use foodbank_shared::paging::PageWindowError;
use foodbank_shared::pdf::DocumentError;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),

    /// 401 Unauthorized
    Unauthorized(String),

    /// 403 Forbidden
    Forbidden(String),

    /// 404 Not Found
    NotFound(String),

    /// 409 Conflict
    Conflict(String),

    /// 422 Unprocessable Entity
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500 Internal Server Error, details are logged and not exposed
    InternalError(String),

    /// 503 Service Unavailable
    ServiceUnavailable(String),

    /// A tagged database failure
    Database(DatabaseError),

    /// A tagged admin operation failure
    AdminOperation(AdminOperationError),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,

    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::Database(err) => write!(f, "{}", err),
            ApiError::AdminOperation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String, Option<Uuid>, Option<Vec<ValidationErrorDetail>>) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                None,
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None, None)
            }
            ApiError::Database(err) => {
                if err.is_not_found() {
                    return (StatusCode::NOT_FOUND, "not_found", "Resource not found".to_string(), None, None);
                }

                match err.kind() {
                    Some(ErrorKind::UniqueViolation) => {
                        let field = err.constraint_field().unwrap_or_default();
                        let message = if field.contains("email") {
                            "Email already exists".to_string()
                        } else {
                            format!("A record with this {} already exists", field)
                        };
                        return (StatusCode::CONFLICT, "conflict", message, Some(err.log_id), None);
                    }
                    Some(kind) => {
                        let message = match kind {
                            ErrorKind::ForeignKeyViolation => "Referenced record does not exist",
                            ErrorKind::NotNullViolation => "Value is required",
                            _ => "Value is not allowed",
                        };
                        let detail = ValidationErrorDetail {
                            field: err.constraint_field().unwrap_or_else(|| "request".to_string()),
                            message: message.to_string(),
                        };
                        return (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            "validation_error",
                            "Request validation failed".to_string(),
                            Some(err.log_id),
                            Some(vec![detail]),
                        );
                    }
                    None => {}
                }

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    format!("Failed to {}", err.action),
                    Some(err.log_id),
                    None,
                )
            }
            ApiError::AdminOperation(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "admin_operation_failed",
                format!("{} failed: {}", err.operation, err.message),
                Some(err.log_id),
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, log_id, details) = self.parts();

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            log_id,
            details,
        });

        (status, body).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Database(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::new("complete request", err))
    }
}

impl From<AdminOperationError> for ApiError {
    fn from(err: AdminOperationError) -> Self {
        ApiError::AdminOperation(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<PageWindowError> for ApiError {
    fn from(err: PageWindowError) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "window".to_string(),
            message: err.to_string(),
        }])
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Database(err) => ApiError::Database(err),
            DocumentError::MissingParcels(ids) => {
                let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
                ApiError::NotFound(format!("Parcels not found: {}", ids.join(", ")))
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotAdmin => ApiError::Forbidden("Admin role required".to_string()),
            AuthzError::Database(err) => ApiError::Database(err),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Parcel not found".to_string());
        assert_eq!(err.to_string(), "Not found: Parcel not found");
    }

    #[tokio::test]
    async fn test_database_error_response_carries_log_id() {
        let err = DatabaseError::new("fetch parcels", sqlx::Error::PoolTimedOut);
        let log_id = err.log_id;

        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "database_error");
        assert_eq!(body["message"], "Failed to fetch parcels");
        assert_eq!(body["log_id"], log_id.to_string());
    }

    #[tokio::test]
    async fn test_row_not_found_is_404() {
        let response = ApiError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_operation_error_response() {
        let err = AdminOperationError::new("delete-user", "user directory rejected the change");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "admin_operation_failed");
        assert!(body["log_id"].is_string());
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
        #[validate(email)]
        email: String,
    }

    #[tokio::test]
    async fn test_validation_errors_become_details() {
        let errors = Sample {
            name: String::new(),
            email: "nope".to_string(),
        }
        .validate()
        .unwrap_err();

        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][0]["message"], "email");
        assert_eq!(body["details"][1]["field"], "name");
        assert_eq!(body["details"][1]["message"], "Name is required");
    }

    #[test]
    fn test_authz_error_mapping() {
        assert!(matches!(ApiError::from(AuthzError::NotAdmin), ApiError::Forbidden(_)));
        assert!(matches!(
            ApiError::from(AuthError::MissingCredentials),
            ApiError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_missing_parcels_is_not_found() {
        let id = Uuid::new_v4();
        match ApiError::from(DocumentError::MissingParcels(vec![id])) {
            ApiError::NotFound(msg) => assert!(msg.contains(&id.to_string())),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
