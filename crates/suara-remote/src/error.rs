use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// How a failed call should be treated by the caller.
///
/// The distinction between `Permanent` and `Retryable` is what lets the
/// session layer tell "record not found" apart from a transient outage
/// instead of logging the user out on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors produced while talking to the hosted backend.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not decode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the platform.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A query expected a row and found none.
    #[error("record not found")]
    NotFound,

    /// Missing, rejected or expired credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Client misconfiguration (missing base URL / API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// The realtime feed could not be reached or was torn down.
    #[error("realtime feed unavailable: {0}")]
    Feed(String),
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => RetryClass::ReauthRequired,
                408 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) => RetryClass::Retryable,
            Self::Feed(_) => RetryClass::Retryable,
            Self::Json(_) => RetryClass::Permanent,
            Self::NotFound => RetryClass::Permanent,
            Self::Config(_) => RetryClass::Permanent,
            Self::Auth(_) => RetryClass::ReauthRequired,
        }
    }

    /// Whether this failure means "wrong identifier or password" rather
    /// than an outage. Sign-in flows report these as a plain `false`
    /// instead of an error.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Api { status: 400 | 401 | 403 | 422, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_for_server_errors_is_retryable() {
        assert_eq!(RemoteError::api(503, "down").retry_class(), RetryClass::Retryable);
        assert_eq!(RemoteError::api(429, "slow down").retry_class(), RetryClass::Retryable);
    }

    #[test]
    fn not_found_is_permanent_not_reauth() {
        assert_eq!(RemoteError::NotFound.retry_class(), RetryClass::Permanent);
        assert!(!RemoteError::NotFound.is_credential_failure());
    }

    #[test]
    fn bad_credentials_are_flagged() {
        assert!(RemoteError::api(400, "invalid_grant").is_credential_failure());
        assert!(RemoteError::Auth("missing token".into()).is_credential_failure());
        assert!(!RemoteError::api(500, "boom").is_credential_failure());
    }
}
