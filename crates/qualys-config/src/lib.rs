//! Shared configuration for Qualys tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to the `qualys_api` runtime types. The CLI layers its
//! own flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use qualys_api::{
    AuthFlavor, BasicCredential, DispatchConfig, PlatformProfile, TlsMode, TransportConfig,
};

/// Keyring service name; entries are keyed by profile name.
const KEYRING_SERVICE: &str = "qualys";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found (available: {available})")]
    UnknownProfile { profile: String, available: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named platform profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| {
                let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                ConfigError::UnknownProfile {
                    profile: name.to_owned(),
                    available: if names.is_empty() {
                        "none".into()
                    } else {
                        names.join(", ")
                    },
                }
            })
    }
}

/// Settings shared by every profile unless the profile overrides them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait when the rate-limit window is exhausted and the
    /// server did not say how long.
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait: u64,

    /// Seconds added to the server's advertised wait.
    #[serde(default = "default_rate_limit_margin")]
    pub rate_limit_margin: u64,

    /// Warn when fewer calls than this remain in the window.
    #[serde(default = "default_rate_limit_warn")]
    pub rate_limit_warn: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            rate_limit_wait: default_rate_limit_wait(),
            rate_limit_margin: default_rate_limit_margin(),
            rate_limit_warn: default_rate_limit_warn(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    300
}
fn default_rate_limit_wait() -> u64 {
    3601
}
fn default_rate_limit_margin() -> u64 {
    3
}
fn default_rate_limit_warn() -> u32 {
    10
}

/// A named platform profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Shared platform code ("qg1", "eu2", ...). Ignored when `api_url` is set.
    pub platform: Option<String>,

    /// Private platform: base URL of the classic API.
    pub api_url: Option<String>,

    /// Private platform: gateway base URL. Defaults to `api_url`.
    pub gateway_url: Option<String>,

    /// Private platform: console base URL. Defaults to `api_url`.
    pub console_url: Option<String>,

    /// "basic" or "bearer".
    #[serde(default)]
    pub auth: AuthFlavor,

    pub username: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout, in seconds.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "qualys", "qualys").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("qualys");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered as defaults, file, then
/// `QUALYS_`-prefixed environment variables (`__` separates nesting,
/// e.g. `QUALYS_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("QUALYS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Username from the profile, else `QUALYS_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("QUALYS_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: the profile's `password_env` variable, then
/// `QUALYS_PASSWORD`, then the system keyring, then plaintext config.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Generic env var
    if let Ok(pw) = std::env::var("QUALYS_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring under the profile name.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to runtime types ────────────────────────────────────

/// Build the profile's platform: explicit URLs win over a platform code;
/// with neither, the shared `qg1` platform.
pub fn platform_profile(profile: &Profile) -> Result<PlatformProfile, ConfigError> {
    if let Some(ref api) = profile.api_url {
        let gateway = profile.gateway_url.as_deref().unwrap_or(api);
        let console = profile.console_url.as_deref().unwrap_or(api);
        return PlatformProfile::from_urls(api, gateway, console).map_err(|e| {
            ConfigError::Validation {
                field: "api_url".into(),
                reason: e.to_string(),
            }
        });
    }

    match profile.platform.as_deref() {
        Some(code) => PlatformProfile::from_code(code).map_err(|e| ConfigError::Validation {
            field: "platform".into(),
            reason: e.to_string(),
        }),
        None => Ok(PlatformProfile::default()),
    }
}

/// TLS and timeout for the profile, falling back to `defaults`.
pub fn transport_config(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig::default()
        .with_tls(tls)
        .with_timeout(Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)))
}

/// Rate-limit knobs from `defaults`.
pub fn dispatch_config(defaults: &Defaults) -> DispatchConfig {
    DispatchConfig {
        default_wait: Duration::from_secs(defaults.rate_limit_wait),
        wait_margin: Duration::from_secs(defaults.rate_limit_margin),
        warn_below: defaults.rate_limit_warn,
    }
}

/// Build a basic credential from a profile. Bearer profiles need a token
/// issue round trip, which the caller performs with the same
/// username, password, and platform.
pub fn basic_credential(
    profile: &Profile,
    profile_name: &str,
) -> Result<BasicCredential, ConfigError> {
    Ok(BasicCredential::new(
        resolve_username(profile, profile_name)?,
        resolve_password(profile, profile_name)?,
        platform_profile(profile)?,
    ))
}
