use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::HOST;

use super::config::{GatewayConfig, GatewaySettings, ProviderSource};
use crate::client::AuthClient;
use crate::error::Error;
use crate::policy::RoutePolicy;
use crate::storage::SessionStorage;

/// Shared state for the session gate and auth routes.
///
/// Holds configuration only. Provider clients are built per request from it,
/// so there is no process-wide client and no state shared between requests
/// beyond the HTTP connection pool.
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<Inner>,
}

struct Inner {
    provider: ProviderSource,
    http: reqwest::Client,
    settings: GatewaySettings,
}

impl GatewayState {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: config.provider,
                http: config.http,
                settings: config.settings,
            }),
        }
    }

    /// Build the provider client and cookie storage for one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if provider settings are missing.
    pub fn client(&self) -> Result<(AuthClient, SessionStorage), Error> {
        let provider = self.inner.provider.resolve()?;
        let options = self.inner.settings.cookie_options.clone();
        let storage = match &self.inner.settings.storage_key {
            Some(key) => SessionStorage::new(key.clone(), options),
            None => SessionStorage::for_project(provider.project_ref(), options),
        };
        let client = AuthClient::new(provider).with_http_client(self.inner.http.clone());
        Ok((client, storage))
    }

    #[must_use]
    pub fn policy(&self) -> &RoutePolicy {
        &self.inner.settings.policy
    }

    pub(super) fn auth_path(&self) -> &str {
        &self.inner.settings.auth_path
    }

    /// Paths served by the auth routes; the gate leaves them alone.
    pub(super) fn is_auth_route(&self, path: &str) -> bool {
        path.strip_prefix(self.auth_path())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Absolute callback URL handed to the provider.
    pub(super) fn callback_url(&self, headers: &HeaderMap) -> String {
        let origin = match &self.inner.settings.site_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => {
                let scheme = headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("http");
                let host = headers
                    .get("x-forwarded-host")
                    .or_else(|| headers.get(HOST))
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                format!("{scheme}://{host}")
            }
        };
        format!("{origin}{}/callback", self.auth_path())
    }
}
