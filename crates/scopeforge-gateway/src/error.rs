//! Error types for the Gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scopeforge_core::ScopeError;
use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project {0} has no scope yet")]
    NoScope(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<scopeforge_core::ValidationError> for GatewayError {
    fn from(e: scopeforge_core::ValidationError) -> Self {
        GatewayError::Scope(e.into())
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoScope(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Scope(ScopeError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Scope(_) | Self::InvalidConfig(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Serialization(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use scopeforge_core::ValidationError;

    #[test]
    fn validation_errors_are_unprocessable() {
        let err = GatewayError::from(ValidationError::ZeroDurationPhase("Build".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("Build"));

        assert_eq!(GatewayError::ProjectNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::NoScope("x".into()).status(), StatusCode::CONFLICT);
    }
}
