//! Error types for transport and streaming.

use kestrel_core::StopReason;

use crate::error_parsing::format_http_error;
use crate::retry::is_size_limit_error;

/// Failures of the underlying chunk source.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP client error (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading the chunk stream failed.
    #[error("stream read failed: {0}")]
    Read(String),

    /// Transport-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Failures of one streaming call.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The chunk source failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The upstream service answered with a non-success status.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Reason phrase.
        status_text: String,
        /// Raw response body.
        body: String,
        /// `HTTP <status> <status text>: <parsed message>`.
        message: String,
    },

    /// No chunk arrived before the first-chunk deadline.
    #[error("no response within {timeout_ms}ms")]
    FirstChunkTimeout {
        /// Deadline in ms.
        timeout_ms: u64,
    },

    /// The stream went silent between chunks.
    #[error("stream idle for {timeout_ms}ms")]
    IdleTimeout {
        /// Deadline in ms.
        timeout_ms: u64,
    },

    /// The caller cancelled the call.
    #[error("Request aborted")]
    Aborted,

    /// The request builder failed.
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl StreamError {
    /// Build an [`StreamError::Http`] with its formatted message.
    pub fn http(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        let status_text = status_text.into();
        let body = body.into();
        let message = format_http_error(status, &status_text, &body);
        Self::Http {
            status,
            status_text,
            body,
            message,
        }
    }

    /// Error category string for retry events and logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "network",
            Self::Http { status, body, .. } => match *status {
                413 => "size_limit",
                400 if is_size_limit_error(body) => "size_limit",
                429 => "rate_limit",
                403 => "auth_race",
                500..=599 => "server",
                _ => "api",
            },
            Self::FirstChunkTimeout { .. } | Self::IdleTimeout { .. } => "timeout",
            Self::Aborted => "aborted",
            Self::RequestBuild(_) => "request",
            Self::Other(_) => "unknown",
        }
    }

    /// Stop reason for the terminal event.
    pub fn stop_reason(&self) -> StopReason {
        match self {
            Self::Aborted => StopReason::Aborted,
            _ => StopReason::Error,
        }
    }

    /// Whether this is a first-chunk or idle deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::FirstChunkTimeout { .. } | Self::IdleTimeout { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
