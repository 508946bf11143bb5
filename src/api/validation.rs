//! Request validation and API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Longest address accepted by the API
pub const MAX_ADDRESS_LEN: usize = 128;

/// Validation result
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![msg.into()],
        }
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

/// Validate an address submitted for watching
pub fn validate_address(address: &str) -> ValidationResult {
    if address.trim().is_empty() {
        return ValidationResult::error("address is required");
    }

    if address.len() > MAX_ADDRESS_LEN {
        return ValidationResult::error(format!(
            "address must not exceed {} characters",
            MAX_ADDRESS_LEN
        ));
    }

    if address.chars().any(char::is_whitespace) {
        return ValidationResult::error("address must not contain whitespace");
    }

    ValidationResult::ok()
}

/// Error response for API errors
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ApiError {
    pub fn validation(details: Vec<String>) -> Self {
        Self {
            error: "Invalid request".to_string(),
            code: Some("VALIDATION_ERROR".to_string()),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.code.as_deref() == Some("VALIDATION_ERROR") {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("AAAAEXAMPLEADDRESS").is_valid);
        assert!(!validate_address("").is_valid);
        assert!(!validate_address("   ").is_valid);
        assert!(!validate_address("AB CD").is_valid);
        assert!(!validate_address(&"A".repeat(MAX_ADDRESS_LEN + 1)).is_valid);
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationResult::ok().into_result().is_ok());

        let err = ValidationResult::error("address is required")
            .into_result()
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(err.details, vec!["address is required"]);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
