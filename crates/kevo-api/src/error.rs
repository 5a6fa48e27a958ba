use thiserror::Error;

/// Top-level error type for the `kevo-api` crate.
///
/// Covers every failure mode of the portal client: login-page scraping,
/// authentication, authenticated REST calls, and the push channel.
/// Use [`Error::kind`] to branch on the broad category.
#[derive(Debug, Error)]
pub enum Error {
    // ── Login page ──────────────────────────────────────────────────
    /// The login page did not contain a usable `authenticity_token` input.
    #[error("Could not find auth token on signin page")]
    TokenNotFound,

    // ── Authentication ──────────────────────────────────────────────
    /// Transport failure while fetching the login page or posting the form.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── REST ────────────────────────────────────────────────────────
    /// Non-success status from an authenticated GET.
    #[error("Unable to connect to kevo api (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration error (unreadable or invalid CA bundle).
    #[error("TLS error: {0}")]
    Tls(String),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Push channel ────────────────────────────────────────────────
    /// WebSocket handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket read failed after the connection was established.
    #[error("WebSocket transport error: {0}")]
    WebSocket(String),

    /// WebSocket closed with anything other than a normal-closure code.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The push task panicked or was aborted before reporting a result.
    #[error("Push channel task failed: {0}")]
    TaskFailed(String),
}

/// Broad error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Login page malformed or unexpected.
    TokenNotFound,
    /// Transport failure during login.
    Auth,
    /// Failure on an authenticated REST call.
    Client,
    /// Failure in the push channel.
    Channel,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenNotFound => ErrorKind::TokenNotFound,
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::Api { .. }
            | Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Tls(_)
            | Self::Deserialization { .. } => ErrorKind::Client,
            Self::WebSocketConnect(_)
            | Self::WebSocket(_)
            | Self::WebSocketClosed { .. }
            | Self::TaskFailed(_) => ErrorKind::Channel,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::WebSocketConnect(_) | Self::WebSocket(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
