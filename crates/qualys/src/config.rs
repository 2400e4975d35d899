//! CLI configuration: a thin wrapper around `qualys_config`.
//!
//! Applies `GlobalOpts` flag overrides (--platform, --api-url,
//! --username, ...) on top of the selected profile and builds the
//! dispatcher and credential every network command needs.

use std::sync::Arc;

use qualys_api::{
    AuthFlavor, BearerCredential, Credential, DiagnosticSink, Dispatcher, NullSink, TracingSink,
};

use crate::cli::{AuthArg, GlobalOpts};
use crate::error::CliError;

pub use qualys_config::{Config, Profile, config_path, load_config, load_config_or_default};

/// Everything a network command needs.
pub struct Session {
    pub profile_name: String,
    pub profile: Profile,
    pub dispatcher: Dispatcher,
    config: Config,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The selected profile with flag overrides applied.
///
/// A profile named with `--profile` must exist. Without one, a missing
/// default profile is fine: flags and environment variables can supply
/// everything.
pub fn effective_profile(
    global: &GlobalOpts,
    config: &Config,
) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    let mut profile = match config.profile(Some(&name)) {
        Ok((_, p)) => p.clone(),
        Err(e) if global.profile.is_some() => return Err(e.into()),
        Err(_) => Profile::default(),
    };

    if let Some(ref url) = global.api_url {
        profile.api_url = Some(url.clone());
        profile.gateway_url = None;
        profile.console_url = None;
    } else if let Some(ref code) = global.platform {
        profile.platform = Some(code.clone());
        profile.api_url = None;
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(auth) = global.auth {
        profile.auth = match auth {
            AuthArg::Basic => AuthFlavor::Basic,
            AuthArg::Bearer => AuthFlavor::Bearer,
        };
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok((name, profile))
}

impl Session {
    /// Load config and build the dispatcher. Credentials are resolved
    /// lazily so commands that never authenticate don't need them.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = load_config()?;
        let (profile_name, profile) = effective_profile(global, &config)?;

        let transport = qualys_config::transport_config(&profile, &config.defaults);
        let sink: Arc<dyn DiagnosticSink> = if global.quiet {
            Arc::new(NullSink)
        } else {
            Arc::new(TracingSink)
        };
        let dispatcher = Dispatcher::new(&transport)?
            .with_config(qualys_config::dispatch_config(&config.defaults))
            .with_sink(sink);

        Ok(Self {
            profile_name,
            profile,
            dispatcher,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the credential for the profile's auth flavor. Bearer
    /// profiles issue a token first.
    pub async fn credential(&self) -> Result<Credential, CliError> {
        match self.profile.auth {
            AuthFlavor::Basic => {
                qualys_config::basic_credential(&self.profile, &self.profile_name)
                    .map(Credential::from)
                    .map_err(Into::into)
            }
            AuthFlavor::Bearer => self.bearer().await.map(Credential::from),
        }
    }

    /// Issue a bearer token for the profile regardless of its auth flavor.
    pub async fn bearer(&self) -> Result<BearerCredential, CliError> {
        let username = qualys_config::resolve_username(&self.profile, &self.profile_name)?;
        let password = qualys_config::resolve_password(&self.profile, &self.profile_name)?;
        let platform = qualys_config::platform_profile(&self.profile)?;
        BearerCredential::issue(self.dispatcher.http(), username, password, platform)
            .await
            .map_err(|e| self.auth_context(e))
    }

    /// Attach the profile name to authentication failures.
    pub fn auth_context(&self, err: qualys_api::Error) -> CliError {
        match err {
            qualys_api::Error::Authentication { message } => CliError::AuthFailed {
                profile: self.profile_name.clone(),
                message,
            },
            other => other.into(),
        }
    }
}
