use std::fmt;

use thiserror::Error;

use crate::credential::AuthFlavor;
use crate::registry::HttpMethod;

/// Structural shape of a decoded error body.
///
/// Set by the error decoder so callers can tell a vendor envelope from
/// a proxy's HTML error page without re-parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorTag {
    /// `SIMPLE_RETURN/RESPONSE/TEXT` envelope (VMDR, users, auth).
    VendorSimple,
    /// QPS `ServiceResponse` envelope, XML or JSON, with a non-SUCCESS `responseCode`.
    ServiceResponse,
    /// Plain HTML error page (`html/body/h1` + first `p`).
    Html,
    /// XHTML-namespaced error page.
    Xhtml,
    /// Anything else -- the message is a truncated copy of the body.
    Unknown,
}

/// Coarse error classes. Use [`Error::kind`] to branch on these without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Static misuse: unknown platform, module, endpoint, parameter, or method.
    Config,
    /// Credentials rejected, token issue/refresh failed, or flavor mismatch.
    Auth,
    /// Network, DNS, TLS, or transport timeout.
    Transport,
    /// The server returned a structured error.
    Api,
    /// The 409 "cannot be run again" condition.
    TransientConflict,
    /// Caller deadline exceeded.
    Timeout,
    /// A path placeholder had no value.
    MissingPathParam,
}

/// Top-level error type for the `qualys-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Platform code not present in the resolver table.
    #[error("Unknown platform code '{code}' (valid: {})", .valid.join(", "))]
    UnknownPlatform {
        code: String,
        valid: Vec<&'static str>,
    },

    /// Module name not present in the endpoint registry.
    #[error("Unknown module '{module}' (valid: {})", .valid.join(", "))]
    UnknownModule {
        module: String,
        valid: Vec<&'static str>,
    },

    /// Endpoint name not present under a known module.
    #[error("Unknown endpoint '{endpoint}' in module '{module}' (valid: {})", .valid.join(", "))]
    UnknownEndpoint {
        module: String,
        endpoint: String,
        valid: Vec<&'static str>,
    },

    /// Query parameter not accepted by the endpoint.
    #[error("Parameter '{param}' is not accepted by {endpoint}")]
    UnknownParam { endpoint: String, param: String },

    /// Body field not accepted by the endpoint.
    #[error("Body field '{field}' is not accepted by {endpoint}")]
    UnknownBodyField { endpoint: String, field: String },

    /// Method override not listed in the descriptor.
    #[error("Method {method} is not allowed for {endpoint} (allowed: {})", fmt_methods(.allowed))]
    MethodNotAllowed {
        endpoint: String,
        method: HttpMethod,
        allowed: Vec<HttpMethod>,
    },

    /// Path template contains a `{token}` outside the placeholder set.
    #[error("Unknown path placeholder '{{{token}}}'")]
    UnknownPlaceholder { token: String },

    /// URL parsing error (platform override or expanded path).
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value supplied by the caller could not be encoded.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    // ── Template expansion ──────────────────────────────────────────
    /// No source held a value for a placeholder in the path template.
    #[error("Missing value for path placeholder '{{{token}}}'")]
    MissingPathParam { token: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Token issue failed, credentials rejected, or refresh failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The credential's flavor does not match the endpoint.
    #[error("{endpoint} expects {expected} auth, credential is {got}")]
    AuthFlavorMismatch {
        endpoint: String,
        expected: AuthFlavor,
        got: AuthFlavor,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error returned by the platform.
    #[error("API error (HTTP {status}, {tag}): {message}")]
    Api {
        status: u16,
        message: String,
        tag: ErrorTag,
    },

    /// The endpoint refused a concurrent run (HTTP 409). Only raised when
    /// the caller opts in via [`CallResponse::into_result`](crate::CallResponse::into_result).
    #[error("Request cannot be run again yet: {message}")]
    TransientConflict { message: String },

    // ── Deadline ────────────────────────────────────────────────────
    /// The caller's deadline passed, possibly while waiting out a rate limit.
    #[error("Deadline exceeded after waiting {waited_secs}s")]
    Timeout { waited_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body could not be turned into records, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

fn fmt_methods(methods: &[HttpMethod]) -> String {
    methods
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownPlatform { .. }
            | Self::UnknownModule { .. }
            | Self::UnknownEndpoint { .. }
            | Self::UnknownParam { .. }
            | Self::UnknownBodyField { .. }
            | Self::MethodNotAllowed { .. }
            | Self::UnknownPlaceholder { .. }
            | Self::InvalidUrl(_)
            | Self::InvalidHeader { .. } => ErrorKind::Config,
            Self::MissingPathParam { .. } => ErrorKind::MissingPathParam,
            Self::Authentication { .. } | Self::AuthFlavorMismatch { .. } => ErrorKind::Auth,
            Self::Transport(_) | Self::Tls(_) => ErrorKind::Transport,
            Self::Api { .. } | Self::Deserialization { .. } => ErrorKind::Api,
            Self::TransientConflict { .. } => ErrorKind::TransientConflict,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Returns `true` if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::TransientConflict { .. } | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the platform reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// The decoded error tag, for [`Api`](Self::Api) errors.
    pub fn tag(&self) -> Option<ErrorTag> {
        match self {
            Self::Api { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Transport => "transport",
            Self::Api => "api",
            Self::TransientConflict => "transient_conflict",
            Self::Timeout => "timeout",
            Self::MissingPathParam => "missing_path_param",
        };
        f.write_str(name)
    }
}
