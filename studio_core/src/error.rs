// Typed errors with thiserror. Surface meaningful messages to JS.
// Service failures are classified by kind so the UI can tell auth, quota,
// content-policy, availability and input problems apart.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;
use crate::types::Resolution;

/// Studio error types.
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Generated video is {actual}, below the required {required} after {attempts} attempts")]
    QualityGate {
        actual: Resolution,
        required: Resolution,
        attempts: u32,
    },

    #[error("Generation finished without a result: {0}")]
    MissingResult(String),

    #[error("No source image has been uploaded")]
    NoSourceImage,

    #[error("Generation was cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::Serialization(err.to_string())
    }
}

/// Broad class of a generation service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Missing, invalid or unselected API key.
    Auth,
    /// Rate limit or quota exhausted.
    Quota,
    /// Request or output blocked by the provider's safety filters.
    ContentPolicy,
    /// Service temporarily unavailable or overloaded. The only retryable kind.
    Unavailable,
    /// The request itself was rejected as invalid.
    MalformedInput,
    Other,
}

impl ServiceErrorKind {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServiceErrorKind::Auth => "The API key is missing or invalid. Please select a key and try again.",
            ServiceErrorKind::Quota => "Usage quota exceeded. Please wait a moment or check your plan.",
            ServiceErrorKind::ContentPolicy => {
                "The request was blocked by the content policy. Try a different image or directive."
            }
            ServiceErrorKind::Unavailable => "The generation service is busy. Please try again shortly.",
            ServiceErrorKind::MalformedInput => "The request was rejected as invalid. Check the uploaded image.",
            ServiceErrorKind::Other => "Generation failed unexpectedly.",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceErrorKind::Auth => "auth",
            ServiceErrorKind::Quota => "quota",
            ServiceErrorKind::ContentPolicy => "content-policy",
            ServiceErrorKind::Unavailable => "unavailable",
            ServiceErrorKind::MalformedInput => "malformed-input",
            ServiceErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failure reported by the generation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        ServiceError {
            kind,
            message: message.into(),
        }
    }

    /// Classify a raw error message from the provider by its known markers.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
        let status = |codes: &[&str]| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| codes.contains(&token))
        };

        // First match wins. Status codes only count as standalone tokens.
        let kind = if status(&["503"]) || has(&["unavailable", "overloaded", "try again later"]) {
            ServiceErrorKind::Unavailable
        } else if status(&["429"])
            || has(&["quota", "resource_exhausted", "resource exhausted", "rate limit"])
        {
            ServiceErrorKind::Quota
        } else if status(&["401", "403"])
            || has(&[
                "api key",
                "api_key",
                "permission denied",
                "requested entity was not found",
            ])
        {
            ServiceErrorKind::Auth
        } else if has(&["safety", "blocked", "content policy", "prohibited"]) {
            ServiceErrorKind::ContentPolicy
        } else if status(&["400"]) || has(&["invalid argument", "invalid_argument", "malformed"]) {
            ServiceErrorKind::MalformedInput
        } else {
            ServiceErrorKind::Other
        };

        ServiceError { kind, message }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ServiceErrorKind::Unavailable
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StudioError::InvalidConfig("missing field".to_string());
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn quality_gate_display_names_resolutions() {
        let err = StudioError::QualityGate {
            actual: Resolution::new(640, 360),
            required: Resolution::new(1280, 720),
            attempts: 3,
        };
        let text = err.to_string();
        assert!(text.contains("640x360"));
        assert!(text.contains("1280x720"));
    }

    #[test]
    fn status_codes_must_stand_alone() {
        let err = ServiceError::classify("upload 15034 failed: image is 4000x3000");
        assert_eq!(err.kind, ServiceErrorKind::Other);
        assert!(!err.is_transient());
        assert_eq!(
            ServiceError::classify("job-4011 returned 401").kind,
            ServiceErrorKind::Auth
        );
        assert_eq!(
            ServiceError::classify("HTTP/1.1 503: backend").kind,
            ServiceErrorKind::Unavailable
        );
    }

    #[test]
    fn classify_transient_markers() {
        assert!(ServiceError::classify("503 Service Unavailable").is_transient());
        assert!(ServiceError::classify("The model is overloaded").is_transient());
    }

    #[test]
    fn classify_distinguishes_kinds() {
        assert_eq!(
            ServiceError::classify("429 RESOURCE_EXHAUSTED").kind,
            ServiceErrorKind::Quota
        );
        assert_eq!(
            ServiceError::classify("Requested entity was not found.").kind,
            ServiceErrorKind::Auth
        );
        assert_eq!(
            ServiceError::classify("Response blocked due to SAFETY").kind,
            ServiceErrorKind::ContentPolicy
        );
        assert_eq!(
            ServiceError::classify("400 INVALID_ARGUMENT: bad image").kind,
            ServiceErrorKind::MalformedInput
        );
        assert_eq!(
            ServiceError::classify("socket hang up").kind,
            ServiceErrorKind::Other
        );
    }

    #[test]
    fn quota_is_not_transient() {
        assert!(!ServiceError::classify("quota exceeded").is_transient());
    }
}
