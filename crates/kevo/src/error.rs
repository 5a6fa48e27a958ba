//! CLI error types with miette diagnostics.
//!
//! Maps `kevo_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use kevo_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

/// Longest response body echoed back in an error.
const MAX_BODY_CHARS: usize = 200;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the Kevo portal")]
    #[diagnostic(
        code(kevo::connection_failed),
        help(
            "Check your network connection and the portal URL.\n\
             Override it with --base-url or base_url in your profile."
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(kevo::tls_error),
        help("Check ca_cert in your profile, or use --insecure (-k) for test portals.")
    )]
    TlsError { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed: {message}")]
    #[diagnostic(
        code(kevo::auth_failed),
        help("The portal could not be reached during login. Retry, or check --base-url.")
    )]
    AuthFailed { message: String },

    #[error("The login page did not contain an authenticity token")]
    #[diagnostic(
        code(kevo::token_not_found),
        help("The portal may be down for maintenance, or its login form has changed.")
    )]
    TokenNotFound,

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(kevo::no_credentials),
        help(
            "Configure a profile with: kevo config init --user <email>\n\
             Or set KEVO_USERNAME and KEVO_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Portal responses ─────────────────────────────────────────────
    #[error("Lock '{identifier}' not found")]
    #[diagnostic(
        code(kevo::not_found),
        help("Check the lock ID in the Kevo app or your profile's lock_id.")
    )]
    NotFound { identifier: String },

    #[error("Portal returned HTTP {status}: {body}")]
    #[diagnostic(code(kevo::api_error))]
    ApiError { status: u16, body: String },

    #[error("Unexpected response from the portal: {message}")]
    #[diagnostic(
        code(kevo::unexpected_response),
        help("Run with -vv to see the request log.")
    )]
    UnexpectedResponse { message: String },

    // ── Push channel ─────────────────────────────────────────────────
    #[error("Push channel error: {message}")]
    #[diagnostic(
        code(kevo::push_channel),
        help("Use `kevo watch --reconnect` to retry automatically.")
    )]
    PushChannel { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(kevo::validation))]
    Validation { field: String, reason: String },

    #[error("No lock ID given")]
    #[diagnostic(
        code(kevo::no_lock_id),
        help("Pass the lock ID as an argument, or set lock_id in your profile.")
    )]
    MissingLockId,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(kevo::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: kevo config init --name {name} --user <email>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(kevo::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(kevo::timeout),
        help("Increase the timeout with --timeout or check portal responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to write config: {0}")]
    #[diagnostic(code(kevo::config_write))]
    ConfigWrite(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } | Self::PushChannel { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::TokenNotFound | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::MissingLockId => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_owned();
    }
    let mut out: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    out.push('…');
    out
}

// ── kevo_api::Error → CliError mapping ───────────────────────────────

impl From<kevo_api::Error> for CliError {
    fn from(err: kevo_api::Error) -> Self {
        use kevo_api::Error as ApiErr;

        match err {
            ApiErr::TokenNotFound => CliError::TokenNotFound,

            ApiErr::Authentication { message } => CliError::AuthFailed { message },

            ApiErr::Api { status, body } => CliError::ApiError {
                status,
                body: truncate_body(&body),
            },

            ApiErr::Transport(e) if e.is_timeout() => CliError::Timeout,
            ApiErr::Transport(e) if e.is_connect() => CliError::ConnectionFailed {
                source: Box::new(e),
            },
            ApiErr::Transport(e) => CliError::UnexpectedResponse {
                message: e.to_string(),
            },

            ApiErr::InvalidUrl(e) => CliError::Validation {
                field: "base_url".into(),
                reason: e.to_string(),
            },

            ApiErr::Tls(message) => CliError::TlsError { message },

            ApiErr::Deserialization { message, .. } => CliError::UnexpectedResponse { message },

            err @ (ApiErr::WebSocketConnect(_)
            | ApiErr::WebSocket(_)
            | ApiErr::WebSocketClosed { .. }
            | ApiErr::TaskFailed(_)) => CliError::PushChannel {
                message: err.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Serialization(e) => CliError::ConfigWrite(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
