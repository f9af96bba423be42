//! Error taxonomy for the provisioning run.
//!
//! Nothing here is retried: every error travels up to `main`, which reports
//! it and exits with a failure status.

use serde::Deserialize;
use thiserror::Error;

/// A failed REST call.
///
/// `status` is `None` when the request never produced a usable response
/// (connection failure, undecodable body).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub code: Option<u64>,
    pub errors: Option<serde_json::Value>,
}

/// Error body shape shared by every Discord endpoint.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

impl ApiError {
    /// Build an error from a non-2xx response.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status: Some(status),
                message: parsed.message,
                code: parsed.code,
                errors: parsed.errors,
            },
            Err(_) => {
                let raw = String::from_utf8_lossy(body).trim().to_string();
                let message = if raw.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    raw
                };
                Self {
                    status: Some(status),
                    message,
                    code: None,
                    errors: None,
                }
            }
        }
    }

    /// A failure with no HTTP status attached.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            code: None,
            errors: None,
        }
    }

    /// Operator-facing report: the message, the Discord error code when
    /// present, and the structured validation errors pretty-printed below.
    pub fn report(&self) -> String {
        let mut out = self.message.clone();
        if let Some(code) = self.code {
            out.push_str(&format!(" ({})", code));
            if let Some(errors) = &self.errors {
                let pretty =
                    serde_json::to_string_pretty(errors).unwrap_or_else(|_| errors.to_string());
                out.push('\n');
                out.push_str(&pretty);
            }
        }
        out
    }
}

/// Fatal failures of the gateway connection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to gateway: {0}")]
    Connect(String),

    #[error("gateway socket error: {0}")]
    Socket(String),

    #[error("gateway closed the connection (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("gateway stream ended")]
    StreamEnded,

    #[error("malformed gateway frame: {0}")]
    MalformedFrame(String),

    #[error("gateway requested a reconnect")]
    ReconnectRequested,

    #[error("gateway invalidated the session (resumable: {resumable})")]
    InvalidSession { resumable: bool },
}

/// Top-level error of a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Human-readable failure text, including API codes and validation
    /// details where the error carries them.
    pub fn report(&self) -> String {
        match self {
            Error::Api(e) => e.report(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
