// Platform resolution
//
// Maps a short platform code (`qg1`, `eu2`, ...) or an explicit URL
// override to the three base URLs every Qualys tenant exposes. Pure --
// no I/O, no state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};
use url::Url;

use crate::error::Error;

/// Which host family an endpoint lives on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UrlClass {
    /// `qualysapi.*` -- the classic XML/QPS API.
    Api,
    /// `gateway.*` -- JWT-authenticated JSON services.
    Gateway,
    /// `qualysguard.*` -- the web console.
    Console,
}

/// A Qualys shared platform ("pod").
///
/// Host names follow `{prefix}.{pod}.apps.{domain}`, except the API and
/// console hosts of `qg1`, which predate the regional naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Qg1,
    Qg2,
    Qg3,
    Qg4,
    Eu1,
    Eu2,
    Eu3,
    In1,
    Ca1,
    Ae1,
    Uk1,
    Au1,
    Ksa1,
}

impl Platform {
    /// Every known platform code, in table order.
    pub fn codes() -> Vec<&'static str> {
        Self::iter().map(Into::into).collect()
    }

    /// The short code (`"qg1"`).
    pub fn code(self) -> &'static str {
        self.into()
    }

    fn pod(self) -> &'static str {
        match self {
            Self::Qg2 | Self::Eu2 => "qg2",
            Self::Qg3 | Self::Eu3 => "qg3",
            Self::Qg4 => "qg4",
            _ => "qg1",
        }
    }

    fn domain(self) -> &'static str {
        match self {
            Self::Qg1 | Self::Qg2 | Self::Qg3 | Self::Qg4 => "qualys.com",
            Self::Eu1 | Self::Eu2 => "qualys.eu",
            Self::Eu3 => "qualys.it",
            Self::In1 => "qualys.in",
            Self::Ca1 => "qualys.ca",
            Self::Ae1 => "qualys.ae",
            Self::Uk1 => "qualys.co.uk",
            Self::Au1 => "qualys.com.au",
            Self::Ksa1 => "qualysksa.com",
        }
    }

    /// Host name (no scheme) for a URL class.
    pub fn host(self, class: UrlClass) -> String {
        let prefix = match class {
            UrlClass::Api => "qualysapi",
            UrlClass::Gateway => "gateway",
            UrlClass::Console => "qualysguard",
        };
        match (self, class) {
            // qg1 API/console hosts carry no pod subdomain.
            (Self::Qg1, UrlClass::Api | UrlClass::Console) => format!("{prefix}.qualys.com"),
            _ => format!("{prefix}.{}.apps.{}", self.pod(), self.domain()),
        }
    }

    /// Base URL (`https://host`, no trailing slash) for a URL class.
    pub fn base_url(self, class: UrlClass) -> String {
        format!("https://{}", self.host(class))
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::iter()
            .find(|p| p.code() == wanted)
            .ok_or_else(|| Error::UnknownPlatform {
                code: s.to_owned(),
                valid: Self::codes(),
            })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where a credential's requests go.
///
/// Exactly one shape is active. Created once at authentication time and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformProfile {
    /// A shared platform looked up in the static table.
    Code(Platform),
    /// Private cloud platform or test server: explicit base URLs.
    Override {
        api_url: Url,
        gateway_url: Url,
        console_url: Url,
    },
}

impl PlatformProfile {
    /// Parse a platform code into a profile.
    pub fn from_code(code: &str) -> Result<Self, Error> {
        code.parse().map(Self::Code)
    }

    /// Build an override profile from three absolute URLs.
    pub fn from_urls(api_url: &str, gateway_url: &str, console_url: &str) -> Result<Self, Error> {
        Ok(Self::Override {
            api_url: Url::parse(api_url)?,
            gateway_url: Url::parse(gateway_url)?,
            console_url: Url::parse(console_url)?,
        })
    }

    /// Point every URL class at the same origin (mock servers, proxies).
    pub fn single_origin(origin: &str) -> Result<Self, Error> {
        Self::from_urls(origin, origin, origin)
    }

    /// The platform code, when this is a table profile.
    pub fn code(&self) -> Option<Platform> {
        match self {
            Self::Code(p) => Some(*p),
            Self::Override { .. } => None,
        }
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::Code(Platform::Qg1)
    }
}

/// Resolve the base URL for a URL class. The result never ends in `/`.
pub fn resolve(class: UrlClass, profile: &PlatformProfile) -> String {
    match profile {
        PlatformProfile::Code(platform) => platform.base_url(class),
        PlatformProfile::Override {
            api_url,
            gateway_url,
            console_url,
        } => {
            let url = match class {
                UrlClass::Api => api_url,
                UrlClass::Gateway => gateway_url,
                UrlClass::Console => console_url,
            };
            url.as_str().trim_end_matches('/').to_owned()
        }
    }
}
