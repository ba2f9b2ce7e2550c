//! Error type shared by the backend service and the plugin adapter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("missing tail target")]
    MissingTailTarget,

    #[error("invalid tail target: {0}")]
    InvalidTailTarget(String),

    #[error("unknown path: {0}. must be one of: tail/relation/<name>, tail/select/<query id>")]
    UnknownPath(String),

    #[error("datasource not found: {0}")]
    DatasourceNotFound(String),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("invalid datasource settings: {0}")]
    InvalidDatasourceSettings(String),

    #[error("connection error: {0}")]
    DatabaseConnection(String),

    #[error("query error: {0}")]
    DatabaseQuery(String),

    #[error("error creating frame: {0}")]
    Data(String),

    #[error("backend request failed: {0}")]
    ExternalService(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("already registered: {0}")]
    AlreadyRegistered(String),
}

impl AppError {
    /// Machine-readable error code placed in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::MissingTailTarget => "MISSING_TAIL_TARGET",
            Self::InvalidTailTarget(_) => "INVALID_TAIL_TARGET",
            Self::UnknownPath(_) => "UNKNOWN_PATH",
            Self::DatasourceNotFound(_) => "DATASOURCE_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidDatasourceSettings(_) => "INVALID_DATASOURCE_SETTINGS",
            Self::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            Self::DatabaseQuery(_) => "DATABASE_QUERY_ERROR",
            Self::Data(_) => "DATA_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::AlreadyRegistered(_) => "ALREADY_REGISTERED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidQuery(_)
            | Self::MissingTailTarget
            | Self::InvalidTailTarget(_)
            | Self::UnknownPath(_)
            | Self::InvalidDatasourceSettings(_) => StatusCode::BAD_REQUEST,
            Self::DatasourceNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyRegistered(_) => StatusCode::CONFLICT,
            Self::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::DatabaseQuery(_) | Self::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(ApiResponse::err(self.code(), self.to_string()))).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidQuery(error.to_string())
    }
}
