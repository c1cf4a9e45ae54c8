//! # Pagination errors
//!
//! Only two things can fail a pagination request:
//! - the resource is misconfigured (no sortable columns), reported as `503 Service Unavailable`;
//! - the database call fails, reported as `500 Internal Server Error`.
//!
//! Bad client input (unknown sort columns, unsupported filter operators, ...) never
//! produces an error; it is dropped and logged at debug level.
//!
//! Internal details are logged through `tracing` and never sent to the client:
//!
//! ```rust,ignore
//! async fn list_cats(
//!     State(db): State<DatabaseConnection>,
//!     query: PaginateQuery,
//! ) -> Result<Paginated<Cat>, PaginateError> {
//!     paginate(&query, cat_metadata(), &cat_config(), &db).await
//! }
//! ```

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

#[derive(Debug)]
pub enum PaginateError {
    /// 503 Service Unavailable - the resource definition is broken
    Misconfigured {
        /// Internal description (logged, not sent to user)
        message: String,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },
}

impl PaginateError {
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
        }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Misconfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Misconfigured { .. } => "Service unavailable".to_string(),
            Self::Database { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Misconfigured { message } => {
                tracing::debug!(details = %message, "pagination misconfigured");
            }
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for PaginateError {
    fn into_response(self) -> Response {
        self.log_internal();
        let status = self.status_code();
        let response = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(response)).into_response()
    }
}

impl fmt::Display for PaginateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misconfigured { message } => write!(f, "pagination misconfigured: {message}"),
            Self::Database { internal, .. } => write!(f, "database error: {internal}"),
        }
    }
}

impl std::error::Error for PaginateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database { internal, .. } => Some(internal),
            Self::Misconfigured { .. } => None,
        }
    }
}

/// Every `DbErr` is a 500; the query it came from is logged, not returned.
impl From<DbErr> for PaginateError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn test_misconfigured_is_service_unavailable() {
        let err = PaginateError::misconfigured("sortable_columns is empty");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.user_message(), "Service unavailable");
        assert!(err.to_string().contains("sortable_columns"));
    }

    #[test]
    fn test_database_error_conversion() {
        let err: PaginateError = DbErr::Custom("connection reset".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "A database error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_database_user_message_hides_internal_details() {
        let err = PaginateError::database(DbErr::Custom("password=hunter2".to_string()));
        assert!(!err.user_message().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = PaginateError::database(DbErr::Custom("secret table".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "A database error occurred" }));

        let response = PaginateError::misconfigured("no sortable columns").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
