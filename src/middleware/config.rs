use url::Url;

use super::error::GatewayError;
use crate::client::ProviderConfig;
use crate::cookies::CookieOptions;
use crate::error::Error;
use crate::policy::{PrefixMatch, RoutePolicy};

/// Where provider settings come from.
#[derive(Debug, Clone)]
pub enum ProviderSource {
    /// Read `SUPABASE_URL` / `SUPABASE_ANON_KEY` each time a client is built,
    /// so a missing value fails the first request that needs it rather than
    /// process start.
    Env,
    Fixed(ProviderConfig),
}

impl ProviderSource {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the environment is incomplete.
    pub fn resolve(&self) -> Result<ProviderConfig, Error> {
        match self {
            Self::Env => ProviderConfig::from_env(),
            Self::Fixed(config) => Ok(config.clone()),
        }
    }
}

/// Gateway settings shared by config and runtime state.
#[derive(Debug, Clone)]
pub(crate) struct GatewaySettings {
    pub(crate) policy: RoutePolicy,
    pub(crate) cookie_options: CookieOptions,
    pub(crate) storage_key: Option<String>,
    pub(crate) auth_path: String,
    pub(crate) site_url: Option<Url>,
}

impl GatewaySettings {
    fn defaults() -> Self {
        Self {
            policy: RoutePolicy::default(),
            cookie_options: CookieOptions::default(),
            storage_key: None,
            auth_path: "/auth".into(),
            site_url: None,
        }
    }
}

/// Session gateway configuration.
///
/// Use [`from_env()`](GatewayConfig::from_env) for convention-based setup,
/// or [`new()`](GatewayConfig::new) with `with_*` methods for full control.
pub struct GatewayConfig {
    pub(super) provider: ProviderSource,
    pub(super) http: reqwest::Client,
    pub(super) settings: GatewaySettings,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(provider: ProviderSource) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            settings: GatewaySettings::defaults(),
        }
    }

    /// Provider settings are read lazily from `SUPABASE_URL` and
    /// `SUPABASE_ANON_KEY` on first use.
    ///
    /// # Optional env vars
    /// - `GATEWAY_COOKIE_SECURE`: `"1"` or `"true"` marks session cookies `Secure`
    /// - `GATEWAY_COOKIE_DOMAIN`: `Domain` attribute for session cookies
    /// - `GATEWAY_SITE_URL`: public origin used to build the OAuth callback URL
    /// - `GATEWAY_STRICT_PREFIXES`: `"1"` or `"true"` matches protected prefixes
    ///   on path segment boundaries only
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `GATEWAY_SITE_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, GatewayError> {
        let mut config = Self::new(ProviderSource::Env);

        let mut cookie_options = CookieOptions::default().with_secure(env_flag("GATEWAY_COOKIE_SECURE"));
        if let Ok(domain) = std::env::var("GATEWAY_COOKIE_DOMAIN") {
            cookie_options = cookie_options.with_domain(domain);
        }
        config = config.with_cookie_options(cookie_options);

        if let Ok(url_str) = std::env::var("GATEWAY_SITE_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| GatewayError::Config(format!("GATEWAY_SITE_URL: {e}")))?;
            config = config.with_site_url(url);
        }

        if env_flag("GATEWAY_STRICT_PREFIXES") {
            let policy = config.settings.policy.clone().with_prefix_match(PrefixMatch::Segment);
            config = config.with_route_policy(policy);
        }

        Ok(config)
    }

    /// Share a connection pool across requests.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn with_route_policy(mut self, policy: RoutePolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    #[must_use]
    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.settings.cookie_options = options;
        self
    }

    /// Override the `sb-<project>-auth-token` cookie name.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.settings.storage_key = Some(key.into());
        self
    }

    /// Base path of the callback, login and sign-out routes (default `/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_site_url(mut self, url: Url) -> Self {
        self.settings.site_url = Some(url);
        self
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true"))
}
