use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::pkce;
use crate::provider::IdentityProvider;
use crate::types::{Session, User};

const URL_VAR: &str = "SUPABASE_URL";
const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";

/// Identity provider connection settings.
///
/// ```rust,ignore
/// let config = ProviderConfig::new("https://abcd.supabase.co".parse()?, "public-anon-key");
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) url: Url,
    pub(crate) anon_key: String,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            url,
            anon_key: anon_key.into(),
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either is missing, empty, or the URL does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let url = required_var(URL_VAR)?;
        let anon_key = required_var(ANON_KEY_VAR)?;
        let url: Url = url
            .parse()
            .map_err(|e| Error::Config(format!("{URL_VAR}: {e}")))?;
        Ok(Self::new(url, anon_key))
    }

    /// Provider base URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Project reference: the first DNS label of the provider host.
    #[must_use]
    pub fn project_ref(&self) -> &str {
        self.url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or_default()
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.url.as_str().trim_end_matches('/');
        format!("{base}/auth/v1/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("{URL_VAR}: {e}")))
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

fn required_var(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!(
            "Missing required environment variable: {name}"
        ))),
    }
}

/// HTTP client for the provider's auth REST API.
///
/// Cheap to construct: build one per request boundary from a shared
/// `reqwest::Client` with [`AuthClient::with_http_client`].
#[derive(Clone)]
pub struct AuthClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

/// Sign-up answers with a session when the account is confirmed right away,
/// otherwise with the pending user.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(Session),
    Pending(serde::de::IgnoredAny),
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(default, alias = "error_description", alias = "message")]
    msg: Option<String>,
    #[serde(default, alias = "error")]
    error_code: Option<String>,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        operation: &'static str,
    ) -> Result<Session, Error> {
        let mut url = self.config.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        let mut session = response.json::<Session>().await?;
        session.stamp_expiry(OffsetDateTime::now_utc());
        Ok(session)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ProviderErrorBody>(&body) {
            Ok(ProviderErrorBody {
                msg: Some(msg),
                error_code,
            }) => match error_code {
                Some(code) => format!("{code}: {msg}"),
                None => msg,
            },
            _ => body,
        };
        Err(Error::Provider {
            operation,
            status,
            detail,
        })
    }
}

impl IdentityProvider for AuthClient {
    async fn get_user(&self, access_token: &str) -> Result<User, Error> {
        let response = self
            .http
            .get(self.config.endpoint("user")?)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "user lookup").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, Error> {
        self.token_grant(
            "refresh_token",
            json!({ "refresh_token": refresh_token }),
            "token refresh",
        )
        .await
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, Error> {
        self.token_grant(
            "pkce",
            json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            "code exchange",
        )
        .await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        self.token_grant(
            "password",
            json!({ "email": email, "password": password }),
            "password sign-in",
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, Error> {
        let mut url = self.config.endpoint("signup")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "code_challenge": code_challenge,
                "code_challenge_method": pkce::CHALLENGE_METHOD,
            }))
            .send()
            .await?;

        let response = Self::ensure_success(response, "sign up").await?;
        match response.json::<SignUpBody>().await? {
            SignUpBody::Session(mut session) => {
                session.stamp_expiry(OffsetDateTime::now_utc());
                Ok(Some(session))
            }
            SignUpBody::Pending(_) => Ok(None),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.config.endpoint("logout")?)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::ensure_success(response, "sign out").await?;
        Ok(())
    }

    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, Error> {
        let mut url = self.config.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
        Ok(url)
    }
}
