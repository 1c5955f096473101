use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr};
use serde::{Deserialize, Serialize};

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("ID generation failed for {table} after {attempts} attempts")]
    IdGenerationExhausted { table: String, attempts: u32 },

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Constraint violations raised by the database are caller mistakes
    /// (duplicate username, dangling foreign key), not server faults.
    fn constraint_violation(&self) -> Option<SqlErr> {
        match self {
            Self::DatabaseError(err) => err.sql_err(),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => match self.constraint_violation() {
                Some(SqlErr::UniqueConstraintViolation(_))
                | Some(SqlErr::ForeignKeyConstraintViolation(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::BadRequest(_)
            | Self::InvalidTransition(_)
            | Self::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::IdGenerationExhausted { .. } | Self::HashError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => match self.constraint_violation() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    "A record with the same unique value already exists".to_string()
                }
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    "Referenced record does not exist".to_string()
                }
                _ => "Database error".to_string(),
            },
            Self::HashError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use rstest::rstest;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InvalidTransition("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InsufficientStock("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::DatabaseError(DbErr::Custom("boom".into())), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_mapping(#[case] error: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn id_exhaustion_is_a_distinct_server_error() {
        let err = ServiceError::IdGenerationExhausted {
            table: "substances".into(),
            attempts: 20,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.response_message(),
            "ID generation failed for substances after 20 attempts"
        );
    }

    #[tokio::test]
    async fn id_exhaustion_reaches_the_client_as_a_500_body() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("req-ids"),
            async {
                ServiceError::IdGenerationExhausted {
                    table: "substances".into(),
                    attempts: 20,
                }
                .into_response()
            },
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Internal Server Error");
        assert_eq!(
            payload.message,
            "ID generation failed for substances after 20 attempts"
        );
        assert_eq!(payload.request_id.as_deref(), Some("req-ids"));
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::HashError("salt".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("connection reset".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Order 4 not found".into()).response_message(),
            "Not found: Order 4 not found"
        );
    }
}
