// Credentials and bearer-token lifetime
//
// Two flavors: HTTP Basic (username/password on every request) and
// gateway bearer tokens (JWT issued by `POST {gateway}/auth`, valid for
// four hours). The bearer token lives behind a per-credential async
// mutex so concurrent callers observing a stale token trigger exactly
// one re-issue.

use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::platform::{PlatformProfile, UrlClass, resolve};
use crate::rate_limit::RateLimitView;

/// Bearer tokens expire after four hours; refresh a few seconds early.
pub const MAX_TOKEN_AGE: Duration = Duration::from_secs(4 * 60 * 60 - 5);

/// Gateway path that issues bearer tokens.
pub const TOKEN_PATH: &str = "/auth";

/// Which authentication strategy an endpoint expects.
///
/// Marker enum (no data) -- the secret material lives in [`Credential`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFlavor {
    /// HTTP Basic on every request.
    #[default]
    Basic,
    /// `Authorization: Bearer <jwt>` from the gateway token endpoint.
    Bearer,
}

impl fmt::Display for AuthFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Basic => "basic",
            Self::Bearer => "bearer",
        })
    }
}

// ── Basic ────────────────────────────────────────────────────────────

/// Username/password pair sent as HTTP Basic.
///
/// Equality compares `(username, platform)`; the password never takes
/// part and is never formatted.
#[derive(Debug)]
pub struct BasicCredential {
    username: String,
    password: SecretString,
    platform: PlatformProfile,
    /// Rate-limit view recorded by the most recent liveness probe.
    rate_limit: RwLock<Option<RateLimitView>>,
}

impl BasicCredential {
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        platform: PlatformProfile,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            platform,
            rate_limit: RwLock::new(None),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// The rate-limit view advertised when the credential was last probed.
    pub fn rate_limit(&self) -> Option<RateLimitView> {
        self.rate_limit
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_rate_limit(&self, view: RateLimitView) {
        *self
            .rate_limit
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(view);
    }
}

impl PartialEq for BasicCredential {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && self.platform == other.platform
    }
}

impl Eq for BasicCredential {}

// ── Bearer ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct TokenState {
    token: SecretString,
    issued_at: DateTime<Utc>,
}

/// Gateway bearer token plus the username/password needed to re-issue it.
#[derive(Debug)]
pub struct BearerCredential {
    username: String,
    password: SecretString,
    platform: PlatformProfile,
    state: Mutex<TokenState>,
}

impl BearerCredential {
    /// Issue a fresh token from the gateway.
    pub async fn issue(
        http: &reqwest::Client,
        username: impl Into<String>,
        password: SecretString,
        platform: PlatformProfile,
    ) -> Result<Self, Error> {
        let username = username.into();
        let token = request_token(http, &username, &password, &platform).await?;
        Ok(Self::from_token(
            username,
            password,
            platform,
            token,
            Utc::now(),
        ))
    }

    /// Wrap an already-issued token. `issued_at` decides freshness.
    pub fn from_token(
        username: impl Into<String>,
        password: SecretString,
        platform: PlatformProfile,
        token: SecretString,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            platform,
            state: Mutex::new(TokenState { token, issued_at }),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    pub async fn issued_at(&self) -> DateTime<Utc> {
        self.state.lock().await.issued_at
    }

    /// Snapshot of the current token, without a freshness check.
    pub async fn token(&self) -> SecretString {
        self.state.lock().await.token.clone()
    }

    pub async fn is_fresh(&self) -> bool {
        is_fresh_at(self.state.lock().await.issued_at, Utc::now())
    }

    /// Re-issue unconditionally; the previous token is discarded.
    pub async fn refresh(&self, http: &reqwest::Client) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        self.reissue(http, &mut state).await
    }

    /// Return a fresh token, re-issuing under the lock when stale.
    ///
    /// The flag is `true` when this call performed the refresh. Callers
    /// that queued behind a refresh re-check freshness after acquiring
    /// the lock and reuse the new token.
    pub(crate) async fn fresh_token(
        &self,
        http: &reqwest::Client,
    ) -> Result<(SecretString, bool), Error> {
        let mut state = self.state.lock().await;
        if is_fresh_at(state.issued_at, Utc::now()) {
            return Ok((state.token.clone(), false));
        }
        self.reissue(http, &mut state).await?;
        Ok((state.token.clone(), true))
    }

    async fn reissue(&self, http: &reqwest::Client, state: &mut TokenState) -> Result<(), Error> {
        debug!(username = %self.username, "refreshing bearer token");
        state.token = request_token(http, &self.username, &self.password, &self.platform).await?;
        state.issued_at = Utc::now();
        Ok(())
    }
}

fn is_fresh_at(issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let max_age = TimeDelta::from_std(MAX_TOKEN_AGE).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(issued_at) < max_age
}

async fn request_token(
    http: &reqwest::Client,
    username: &str,
    password: &SecretString,
    platform: &PlatformProfile,
) -> Result<SecretString, Error> {
    let url = format!("{}{TOKEN_PATH}", resolve(UrlClass::Gateway, platform));
    debug!("POST {url} (token issue)");

    let resp = http
        .post(&url)
        .form(&[
            ("username", username),
            ("password", password.expose_secret()),
            ("token", "true"),
            ("permissions", "true"),
        ])
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Authentication {
            message: format!(
                "token request failed (HTTP {status}): {}",
                crate::decode::preview(&body)
            ),
        });
    }

    let token = body.trim();
    if token.is_empty() {
        return Err(Error::Authentication {
            message: "token endpoint returned an empty body".into(),
        });
    }
    Ok(SecretString::from(token.to_owned()))
}

// ── Tagged credential ────────────────────────────────────────────────

/// A credential the dispatcher can authenticate with.
#[derive(Debug)]
pub enum Credential {
    Basic(BasicCredential),
    Bearer(BearerCredential),
}

impl Credential {
    /// Convenience constructor for a basic credential.
    pub fn basic(
        username: impl Into<String>,
        password: impl Into<String>,
        platform: PlatformProfile,
    ) -> Self {
        Self::Basic(BasicCredential::new(
            username,
            SecretString::from(password.into()),
            platform,
        ))
    }

    pub fn flavor(&self) -> AuthFlavor {
        match self {
            Self::Basic(_) => AuthFlavor::Basic,
            Self::Bearer(_) => AuthFlavor::Bearer,
        }
    }

    pub fn platform(&self) -> &PlatformProfile {
        match self {
            Self::Basic(c) => c.platform(),
            Self::Bearer(c) => c.platform(),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Basic(c) => c.username(),
            Self::Bearer(c) => c.username(),
        }
    }
}

impl From<BasicCredential> for Credential {
    fn from(c: BasicCredential) -> Self {
        Self::Basic(c)
    }
}

impl From<BearerCredential> for Credential {
    fn from(c: BearerCredential) -> Self {
        Self::Bearer(c)
    }
}
