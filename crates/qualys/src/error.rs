//! CLI error types with miette diagnostics.
//!
//! Maps library and configuration errors into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use qualys_api::Error as ApiError;
use qualys_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Qualys platform")]
    #[diagnostic(
        code(qualys::connection_failed),
        help(
            "Check the platform code (--platform) or base URL (--api-url)\n\
             and your network path to it."
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(qualys::tls_error),
        help("Configure ca_cert in your profile, or use --insecure (-k) for lab setups.")
    )]
    TlsError { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(qualys::auth_failed),
        help(
            "Verify the username and password for profile '{profile}'.\n\
             Run: qualys config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(qualys::no_credentials),
        help(
            "Set QUALYS_USERNAME and QUALYS_PASSWORD, pass --username,\n\
             or add the profile to the config file."
        )
    )]
    NoCredentials { profile: String },

    // ── Request ──────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(qualys::invalid_request),
        help("Run: qualys endpoints --module <module> to see what each endpoint accepts")
    )]
    InvalidRequest { message: String },

    #[error("Not found: {message}")]
    #[diagnostic(code(qualys::not_found))]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    #[diagnostic(
        code(qualys::conflict),
        help("The request is already running on the platform; retry once it finishes.")
    )]
    Conflict { message: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(qualys::api_error))]
    ApiError { status: u16, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(qualys::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(qualys::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(qualys::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out: {message}")]
    #[diagnostic(
        code(qualys::timeout),
        help("Increase --timeout or --deadline, or retry later.")
    )]
    Timeout { message: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(qualys::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(qualys::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::InvalidRequest { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Authentication { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },
            ApiError::Transport(e) if e.is_timeout() => Self::Timeout {
                message: e.to_string(),
            },
            ApiError::Transport(e) => Self::ConnectionFailed { source: e.into() },
            ApiError::Tls(reason) => Self::TlsError { reason },
            ApiError::Api {
                status: 404,
                message,
                ..
            } => Self::NotFound { message },
            ApiError::Api {
                status: 409,
                message,
                ..
            }
            | ApiError::TransientConflict { message } => Self::Conflict { message },
            ApiError::Api {
                status, message, ..
            } => Self::ApiError { status, message },
            e @ ApiError::Timeout { .. } => Self::Timeout {
                message: e.to_string(),
            },
            ApiError::Deserialization { message, .. } => Self::ApiError {
                status: 200,
                message,
            },
            other => Self::InvalidRequest {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { profile, available } => Self::ProfileNotFound {
                name: profile,
                available,
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
