use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::services::TransferError;
use crate::workflow::{BusinessFault, DelegateError, Variables};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A named fault raised by a delegate, returned with the partial outputs.
    #[error("{fault}")]
    Fault {
        fault: BusinessFault,
        variables: Variables,
    },
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Fault { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn from_delegate(err: DelegateError, variables: Variables) -> Self {
        match err {
            DelegateError::Fault(fault) => AppError::Fault { fault, variables },
            DelegateError::Fatal(message) => AppError::Internal(message),
        }
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Repository(e) => AppError::Repository(e),
            TransferError::Validation(e) => AppError::Validation(e.to_string()),
            TransferError::AccountNotFound(number) => AppError::NotFound(format!("account {}", number)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Fault { fault, variables } => json!({
                "errorCode": fault.code.as_str(),
                "message": fault.message,
                "variables": Value::Object(variables),
            }),
            AppError::Repository(e) => {
                tracing::error!(error = %e, "Repository error while serving request");
                json!({
                    "error": format!("Database error: {}", e),
                    "status": status.as_u16(),
                })
            }
            other => json!({
                "error": other.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_repository_error_status_code() {
        let error = AppError::Repository(RepositoryError::Database(sqlx::Error::RowNotFound));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = AppError::Repository(RepositoryError::Unavailable("pool closed".to_string()));
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_error_status_code() {
        let error = AppError::Internal("Something went wrong".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_fault_status_code() {
        let error = AppError::from_delegate(
            BusinessFault::transfer_failed("compensated").into(),
            Variables::new(),
        );
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let error = AppError::from_delegate(DelegateError::Fatal("boom".to_string()), Variables::new());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_transfer_error_mapping() {
        let error: AppError = TransferError::AccountNotFound("ACC-404".to_string()).into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fault_response_body() {
        let mut variables = Variables::new();
        variables.insert("transferSuccess".to_string(), Value::Bool(false));
        let error = AppError::Fault {
            fault: BusinessFault::validation("amount is required"),
            variables,
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "amount is required");
        assert_eq!(body["variables"]["transferSuccess"], false);
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("transaction TXN-1".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
