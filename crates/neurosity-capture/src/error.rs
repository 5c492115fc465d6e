//! # Error Types
//!
//! Semantic error types for a capture run. Every variant carries enough
//! context to diagnose the problem without digging through logs.
//!
//! ## Error Code Mapping
//!
//! The device-cloud gateway returns numeric error codes in JSON-RPC error
//! responses. [`CaptureError::from_api_error`] maps known codes to semantic
//! variants with actionable error messages.

use std::fmt;

use thiserror::Error;

use crate::protocol::constants::ErrorCodes;

/// Convenient Result alias for capture operations.
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Why a login attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No account is registered under the given email.
    UnknownAccount,
    /// The account exists but the password does not match.
    InvalidPassword,
    /// Anything else: device not claimed, service down, malformed reply.
    Other,
}

impl AuthFailure {
    /// Classify a login rejection from its error code, falling back to the
    /// `EMAIL_NOT_FOUND` / `INVALID_PASSWORD` markers the cloud embeds in
    /// its messages.
    #[must_use]
    pub fn classify(code: i32, message: &str) -> Self {
        match code {
            ErrorCodes::EMAIL_NOT_FOUND => AuthFailure::UnknownAccount,
            ErrorCodes::INVALID_PASSWORD => AuthFailure::InvalidPassword,
            _ if message.contains("EMAIL_NOT_FOUND") => AuthFailure::UnknownAccount,
            _ if message.contains("INVALID_PASSWORD") => AuthFailure::InvalidPassword,
            _ => AuthFailure::Other,
        }
    }

    fn hint(self) -> &'static str {
        match self {
            AuthFailure::UnknownAccount => {
                "The provided email does not exist. Please check and try again."
            }
            AuthFailure::InvalidPassword => {
                "The provided password is invalid. Please check and try again."
            }
            AuthFailure::Other => {
                "Please confirm that the provided email and password are correct."
            }
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthFailure::UnknownAccount => "unknown account",
            AuthFailure::InvalidPassword => "invalid password",
            AuthFailure::Other => "login rejected",
        };
        f.write_str(label)
    }
}

/// All errors that can occur during a capture run.
#[derive(Error, Debug)]
pub enum CaptureError {
    // ─── Connection ─────────────────────────────────────────────────
    /// Failed to establish a WebSocket connection to the gateway.
    #[error("Failed to connect to the device gateway at {url}: {reason}. Is the gateway running?")]
    ConnectionFailed { url: String, reason: String },

    /// WebSocket connection was lost after being established.
    #[error("Connection to the device gateway lost: {reason}")]
    ConnectionLost { reason: String },

    /// The client is not connected to the gateway.
    #[error("Not connected to the device gateway")]
    NotConnected,

    // ─── Authentication ─────────────────────────────────────────────
    /// Login was rejected. Fatal for the whole run.
    #[error("Authentication failed ({kind}): {reason}. {}", .kind.hint())]
    Authentication { kind: AuthFailure, reason: String },

    // ─── Subscriptions ──────────────────────────────────────────────
    /// The collaborator refused or does not offer a metric subscription.
    #[error("Subscription to '{metric}' failed: {reason}")]
    Subscription { metric: String, reason: String },

    /// A capture worker task panicked or was aborted.
    #[error("Capture task for '{metric}' did not finish: {reason}")]
    TaskFailed { metric: String, reason: String },

    // ─── API ────────────────────────────────────────────────────────
    /// Raw gateway error that doesn't map to a more specific variant.
    #[error("Gateway API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// The requested RPC method was not found (likely a version mismatch).
    #[error("API method not found: {method}")]
    MethodNotFound { method: String },

    // ─── Timeout ────────────────────────────────────────────────────
    /// An operation timed out waiting for a response.
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // ─── Protocol ───────────────────────────────────────────────────
    /// Received an unexpected or malformed message from the gateway.
    #[error("Protocol error: {reason}")]
    ProtocolError { reason: String },

    // ─── Config ─────────────────────────────────────────────────────
    /// Configuration file error (missing, malformed, or invalid values).
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// A required credential could be neither read nor prompted for.
    #[error("Could not obtain {variable}: {reason}")]
    CredentialUnavailable { variable: String, reason: String },

    // ─── WebSocket ──────────────────────────────────────────────────
    /// Low-level WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ─── I/O ────────────────────────────────────────────────────────
    /// Filesystem or I/O error (session directory, metric logs, config).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaptureError {
    /// Map a gateway API error code + message to the most specific error variant.
    ///
    /// Subscription codes carry no metric context here; callers that know
    /// the metric should use [`CaptureError::for_metric`].
    pub fn from_api_error(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ErrorCodes::METHOD_NOT_FOUND => CaptureError::MethodNotFound { method: message },
            ErrorCodes::EMAIL_NOT_FOUND
            | ErrorCodes::INVALID_PASSWORD
            | ErrorCodes::INVALID_TOKEN
            | ErrorCodes::DEVICE_NOT_CLAIMED => CaptureError::Authentication {
                kind: AuthFailure::classify(code, &message),
                reason: message,
            },
            ErrorCodes::UNKNOWN_METRIC | ErrorCodes::ALREADY_SUBSCRIBED => {
                CaptureError::Subscription {
                    metric: String::from("unknown"),
                    reason: message,
                }
            }
            _ => CaptureError::ApiError { code, message },
        }
    }

    /// Re-attribute an error raised while subscribing to `metric`.
    ///
    /// Anything the gateway rejected becomes a [`CaptureError::Subscription`];
    /// transport errors pass through untouched.
    #[must_use]
    pub fn for_metric(self, metric: &str) -> Self {
        match self {
            CaptureError::Subscription { reason, .. } => CaptureError::Subscription {
                metric: metric.to_string(),
                reason,
            },
            CaptureError::MethodNotFound { method } => CaptureError::Subscription {
                metric: metric.to_string(),
                reason: format!("capability not offered by the device ({method})"),
            },
            CaptureError::ApiError { code, message } => CaptureError::Subscription {
                metric: metric.to_string(),
                reason: format!("gateway error {code}: {message}"),
            },
            other => other,
        }
    }

    /// Returns `true` if this error is fatal for the whole run rather than
    /// a single metric.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::Authentication { .. }
                | CaptureError::ConnectionFailed { .. }
                | CaptureError::ConfigError { .. }
                | CaptureError::CredentialUnavailable { .. }
        )
    }

    /// Returns `true` if this error indicates the connection is dead.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CaptureError::ConnectionFailed { .. }
                | CaptureError::ConnectionLost { .. }
                | CaptureError::NotConnected
                | CaptureError::WebSocket(_)
        )
    }
}

// ─── From impls for external error types ────────────────────────────────

impl From<tokio_tungstenite::tungstenite::Error> for CaptureError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        CaptureError::WebSocket(err.to_string())
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for CaptureError {
    fn from(err: toml::de::Error) -> Self {
        CaptureError::ConfigError {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(
            AuthFailure::classify(ErrorCodes::EMAIL_NOT_FOUND, "nope"),
            AuthFailure::UnknownAccount
        );
        assert_eq!(
            AuthFailure::classify(ErrorCodes::INVALID_PASSWORD, "nope"),
            AuthFailure::InvalidPassword
        );
        assert_eq!(AuthFailure::classify(-1, "nope"), AuthFailure::Other);
    }

    #[test]
    fn test_classify_by_message_marker() {
        assert_eq!(
            AuthFailure::classify(-32000, "auth/EMAIL_NOT_FOUND: no user record"),
            AuthFailure::UnknownAccount
        );
        assert_eq!(
            AuthFailure::classify(-32000, "INVALID_PASSWORD"),
            AuthFailure::InvalidPassword
        );
    }

    #[test]
    fn test_from_api_error_known_codes() {
        assert!(matches!(
            CaptureError::from_api_error(ErrorCodes::METHOD_NOT_FOUND, "brainwaves_psd"),
            CaptureError::MethodNotFound { .. }
        ));
        assert!(matches!(
            CaptureError::from_api_error(ErrorCodes::EMAIL_NOT_FOUND, "missing"),
            CaptureError::Authentication {
                kind: AuthFailure::UnknownAccount,
                ..
            }
        ));
        assert!(matches!(
            CaptureError::from_api_error(ErrorCodes::INVALID_PASSWORD, "wrong"),
            CaptureError::Authentication {
                kind: AuthFailure::InvalidPassword,
                ..
            }
        ));
        assert!(matches!(
            CaptureError::from_api_error(ErrorCodes::DEVICE_NOT_CLAIMED, "not yours"),
            CaptureError::Authentication {
                kind: AuthFailure::Other,
                ..
            }
        ));
        assert!(matches!(
            CaptureError::from_api_error(ErrorCodes::UNKNOWN_METRIC, "no such metric"),
            CaptureError::Subscription { .. }
        ));
    }

    #[test]
    fn test_from_api_error_unknown_code() {
        let err = CaptureError::from_api_error(-99999, "something weird");
        assert!(matches!(err, CaptureError::ApiError { code: -99999, .. }));
    }

    #[test]
    fn test_for_metric_attributes_rejections() {
        let err = CaptureError::from_api_error(ErrorCodes::METHOD_NOT_FOUND, "calm")
            .for_metric("calm");
        match err {
            CaptureError::Subscription { metric, reason } => {
                assert_eq!(metric, "calm");
                assert!(reason.contains("capability"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let passthrough = CaptureError::Timeout { seconds: 3 }.for_metric("calm");
        assert!(matches!(passthrough, CaptureError::Timeout { seconds: 3 }));
    }

    #[test]
    fn test_authentication_message_is_actionable() {
        let err = CaptureError::Authentication {
            kind: AuthFailure::UnknownAccount,
            reason: "EMAIL_NOT_FOUND".into(),
        };
        let text = err.to_string();
        assert!(text.contains("unknown account"), "{text}");
        assert!(text.contains("email does not exist"), "{text}");
    }

    #[test]
    fn test_is_fatal() {
        assert!(
            CaptureError::Authentication {
                kind: AuthFailure::Other,
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(
            !CaptureError::Subscription {
                metric: "raw".into(),
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(!CaptureError::Io(std::io::Error::other("disk full")).is_fatal());
    }

    #[test]
    fn test_from_tungstenite_error() {
        let ws_error = tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        let err: CaptureError = ws_error.into();
        assert!(matches!(err, CaptureError::WebSocket(_)));
        assert!(err.is_connection_error());
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_from_toml_error_conversion() {
        #[derive(Debug, serde::Deserialize)]
        struct DummyConfig {
            _value: String,
        }

        let toml_err = toml::from_str::<DummyConfig>("value = [").unwrap_err();
        let err: CaptureError = toml_err.into();
        assert!(matches!(err, CaptureError::ConfigError { .. }));
    }
}
