//! API response wrapper types.
//!
//! Every backend endpoint answers in this envelope; the plugin transport
//! unwraps it on the way back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Standard API response wrapper.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Error details (present on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// Response metadata.
    pub meta: ResponseMeta,
}

/// API error details.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code for client handling (e.g., "UNKNOWN_PATH", "NOT_FOUND").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Response metadata. The request ID travels in the `x-request-id` header.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,

    /// Service name that handled the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            service: None,
        }
    }
}

impl<T> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ResponseMeta::default(),
        }
    }

    /// Creates a successful response tagged with the service name.
    pub fn ok_with_service(data: T, service: impl Into<String>) -> Self {
        Self::ok(data).with_service(service)
    }

    /// Sets the service name on the response.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.meta.service = Some(service.into());
        self
    }

    /// Unwraps the envelope into its payload.
    ///
    /// A failed envelope becomes [`AppError::ExternalService`] carrying the
    /// backend's message verbatim.
    pub fn into_result(self) -> Result<T, AppError> {
        if let Some(error) = self.error {
            return Err(AppError::ExternalService(format!(
                "{}: {}",
                error.code, error.message
            )));
        }
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(AppError::ExternalService(
                "response carried no data".to_string(),
            )),
        }
    }
}

impl ApiResponse<()> {
    /// Creates an error response.
    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
            meta: ResponseMeta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_unwraps_to_data() {
        let response = ApiResponse::ok_with_service(vec!["a".to_string()], "backend");
        assert_eq!(response.meta.service.as_deref(), Some("backend"));
        assert_eq!(response.into_result().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_error_envelope_round_trips_through_json() {
        let json = serde_json::to_string(&ApiResponse::err("NOT_FOUND", "path not found: /x")).unwrap();
        let parsed: ApiResponse<Vec<String>> = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(
            parsed.into_result().unwrap_err(),
            AppError::ExternalService("NOT_FOUND: path not found: /x".to_string())
        );
    }

    #[test]
    fn test_error_response_skips_data() {
        let value = serde_json::to_value(ApiResponse::err("X", "y")).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], "X");
    }
}
