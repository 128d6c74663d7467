use std::future::Future;

use url::Url;

use crate::error::Error;
use crate::types::{Session, User};

/// Remote identity provider operations used by the gateway.
///
/// [`AuthClient`](crate::client::AuthClient) is the HTTP implementation.
/// Each call is a stateless remote round trip; cookie handling lives in
/// [`SessionClient`](crate::session::SessionClient), which wraps a provider.
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user that owns `access_token`.
    fn get_user(&self, access_token: &str) -> impl Future<Output = Result<User, Error>> + Send;

    /// Trade a refresh token for a new session. Refresh tokens are single use.
    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Trade a one-time authorization code plus its PKCE verifier for a session.
    fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Email/password sign-in.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Register a new email/password account.
    ///
    /// Returns `None` when the provider sent a confirmation email. The link in
    /// it lands on `redirect_to` with a one-time code bound to `code_challenge`.
    /// Returns a session when the account is confirmed right away.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Revoke the session behind `access_token` on the provider side.
    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// URL that starts an external OAuth login with the given PKCE challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the provider URL cannot be extended.
    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, Error>;
}
