//! Error taxonomy and status-code classification.
//!
//! All failures surface as [`ChatError`]. The coarse [`ErrorCategory`] drives
//! the retry engine's state machine; [`classify_status`] maps transport-level
//! status codes (plus an optional service retry hint) onto the taxonomy so
//! transport implementations never have to pick variants themselves.

use std::time::Duration;

/// Errors produced by session operations, request composition, the retry
/// engine, and the streaming flow controller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    /// Caller-supplied parameter outside its legal domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model identifier absent from the capability catalog.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Requested feature unsupported by the active model.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Session wired up incorrectly (missing transport, bad thresholds).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Tool registration past the session cap.
    #[error("Tool limit exceeded: at most {limit} tool definitions")]
    ToolLimitExceeded { limit: usize },

    /// Stop sequence registration past the session cap.
    #[error("Stop sequence limit exceeded: at most {limit} sequences")]
    StopSequenceLimitExceeded { limit: usize },

    /// Service responded with an error status.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Service signalled too many requests.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// Service-advertised wait before the next attempt, when present.
        retry_after: Option<Duration>,
    },

    /// Credential rejected by the service.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Failure inside an incremental response sequence.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Connection-level failure with no usable status code.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Invariant violation inside this crate.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse classification used by the retry engine and by display layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any network activity; state unchanged.
    Validation,
    /// Feature/model mismatch surfaced at toggle or composition time.
    Capability,
    /// Transient; always retried.
    RateLimit,
    /// Potentially recoverable through credential replacement.
    Auth,
    /// 5xx-equivalent; retried only with an affirmative decision.
    Server,
    /// 4xx-equivalent (non-auth, non-rate-limit); never retried.
    Client,
    /// Connection, stream, or serialization failure.
    Transport,
    /// Internal invariant violation.
    Internal,
}

impl ChatError {
    /// Convenience constructor mirroring the common `(status, message)` shape.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Constructor carrying the raw provider error body.
    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// The coarse category this error falls into.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParameter(_)
            | Self::UnknownModel(_)
            | Self::ConfigurationError(_)
            | Self::ToolLimitExceeded { .. }
            | Self::StopSequenceLimitExceeded { .. } => ErrorCategory::Validation,
            Self::UnsupportedOperation(_) => ErrorCategory::Capability,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::AuthenticationError(_) => ErrorCategory::Auth,
            Self::ApiError { code, .. } if (500..=599).contains(code) => ErrorCategory::Server,
            Self::ApiError { .. } => ErrorCategory::Client,
            Self::StreamError(_) | Self::TransportError(_) | Self::JsonError(_) => {
                ErrorCategory::Transport
            }
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the error is transient enough that retrying can help at all.
    ///
    /// Rate limits retry unconditionally; server errors retry only after an
    /// affirmative decision, but both count as transient here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Server
        )
    }

    /// Service-advertised retry interval, if one was attached.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP-ish status code, when the error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::RateLimited { .. } => Some(429),
            Self::AuthenticationError(_) => Some(401),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

/// Map a status code and optional service retry hint onto the taxonomy.
///
/// Transports call this at the response boundary so every status lands on
/// exactly one variant:
///
/// - 429 → [`ChatError::RateLimited`] (hint preserved)
/// - 401/403 → [`ChatError::AuthenticationError`]
/// - 5xx → [`ChatError::ApiError`] (server category)
/// - any other 4xx → [`ChatError::ApiError`] (client category)
pub fn classify_status(
    code: u16,
    message: impl Into<String>,
    retry_after: Option<Duration>,
) -> ChatError {
    let message = message.into();
    match code {
        429 => ChatError::RateLimited {
            message,
            retry_after,
        },
        401 | 403 => ChatError::AuthenticationError(message),
        _ => ChatError::ApiError {
            code,
            message,
            details: None,
        },
    }
}
