//! Error taxonomy shared by the daemon and the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure a caller of the analysis service can observe.
///
/// Each failed request returns exactly one of these to its own caller; none
/// is retried and none affects other sessions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GauError {
    #[error("You must be logged in to perform analysis.")]
    Unauthorized,

    #[error("This email is already registered.")]
    EmailAlreadyRegistered,

    #[error("Incorrect email or password.")]
    InvalidCredentials,

    #[error("The model returned an unusable response: {0}")]
    ModelResponseInvalid(String),

    #[error("You must be logged in to view your history.")]
    NotAuthenticated,

    #[error("Upstream service failure: {0}")]
    UpstreamFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Too many authentication attempts. Try again shortly.")]
    RateLimited,

    #[error("Request body is too large.")]
    PayloadTooLarge,
}

impl GauError {
    /// Stable machine-readable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            GauError::Unauthorized => "unauthorized",
            GauError::EmailAlreadyRegistered => "email_already_registered",
            GauError::InvalidCredentials => "invalid_credentials",
            GauError::ModelResponseInvalid(_) => "model_response_invalid",
            GauError::NotAuthenticated => "not_authenticated",
            GauError::UpstreamFailure(_) => "upstream_failure",
            GauError::InvalidInput(_) => "invalid_input",
            GauError::RateLimited => "rate_limited",
            GauError::PayloadTooLarge => "payload_too_large",
        }
    }

    /// Message carried on the wire: the payload for variants that have one,
    /// the full text otherwise
    pub fn detail(&self) -> String {
        match self {
            GauError::ModelResponseInvalid(detail)
            | GauError::UpstreamFailure(detail)
            | GauError::InvalidInput(detail) => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Rebuild an error from its wire form
    pub fn from_wire(body: &ErrorBody) -> Self {
        match body.code.as_str() {
            "unauthorized" => GauError::Unauthorized,
            "email_already_registered" => GauError::EmailAlreadyRegistered,
            "invalid_credentials" => GauError::InvalidCredentials,
            "model_response_invalid" => GauError::ModelResponseInvalid(body.message.clone()),
            "not_authenticated" => GauError::NotAuthenticated,
            "invalid_input" => GauError::InvalidInput(body.message.clone()),
            "rate_limited" => GauError::RateLimited,
            "payload_too_large" => GauError::PayloadTooLarge,
            _ => GauError::UpstreamFailure(body.message.clone()),
        }
    }

    /// True for the two "no valid session" variants
    pub fn is_auth_required(&self) -> bool {
        matches!(self, GauError::Unauthorized | GauError::NotAuthenticated)
    }
}

/// `{"error": {...}}` envelope returned by the daemon on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&GauError> for ErrorResponse {
    fn from(err: &GauError) -> Self {
        Self {
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.detail(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_stable() {
        assert_eq!(GauError::Unauthorized.code(), "unauthorized");
        assert_eq!(GauError::NotAuthenticated.code(), "not_authenticated");
        assert_eq!(
            GauError::ModelResponseInvalid("x".into()).code(),
            "model_response_invalid"
        );
    }

    #[test]
    fn test_from_wire_restores_variant() {
        for err in [
            GauError::Unauthorized,
            GauError::EmailAlreadyRegistered,
            GauError::InvalidCredentials,
            GauError::NotAuthenticated,
            GauError::RateLimited,
            GauError::PayloadTooLarge,
        ] {
            let wire = ErrorResponse::from(&err);
            assert_eq!(GauError::from_wire(&wire.error), err);
        }
    }

    #[test]
    fn test_payload_variants_keep_a_single_prefix() {
        for err in [
            GauError::InvalidInput("password must be at least 6 characters".to_string()),
            GauError::ModelResponseInvalid("extract_traits: missing field bodyLength".to_string()),
            GauError::UpstreamFailure("history store: disk full".to_string()),
        ] {
            let wire = ErrorResponse::from(&err);
            let restored = GauError::from_wire(&wire.error);
            assert_eq!(restored, err);
            assert_eq!(restored.to_string(), err.to_string());
        }

        let wire = ErrorResponse::from(&GauError::InvalidInput("bad image".to_string()));
        assert_eq!(wire.error.message, "bad image");
        assert_eq!(
            GauError::from_wire(&wire.error).to_string(),
            "Invalid input: bad image"
        );
    }

    #[test]
    fn test_unknown_code_is_upstream_failure() {
        let body = ErrorBody {
            code: "teapot".to_string(),
            message: "short and stout".to_string(),
        };
        assert_eq!(
            GauError::from_wire(&body),
            GauError::UpstreamFailure("short and stout".to_string())
        );
    }

    #[test]
    fn test_messages_are_plain_language() {
        assert_eq!(
            GauError::EmailAlreadyRegistered.to_string(),
            "This email is already registered."
        );
        assert_eq!(
            GauError::InvalidCredentials.to_string(),
            "Incorrect email or password."
        );
    }
}
