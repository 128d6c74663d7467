use cookie::Cookie;
use time::OffsetDateTime;
use url::Url;

use crate::cookies::CookieStore;
use crate::error::Error;
use crate::pkce::PkcePair;
use crate::provider::IdentityProvider;
use crate::storage::SessionStorage;
use crate::types::{Session, User};

/// Refresh this many seconds before the stored expiry.
const REFRESH_MARGIN_SECS: i64 = 10;

/// Result of [`SessionClient::sign_up`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignUp {
    /// The account is active and its session is stored.
    SignedIn(Session),
    /// The provider emailed a confirmation link.
    ConfirmationSent,
}

/// Identity-provider client bound to one cookie store.
///
/// Every session change (refresh, code exchange, sign-out) is written back
/// through the store, so a [`RequestCookies`](crate::cookies::RequestCookies)
/// adapter makes it visible to later reads in the same request and to the
/// browser. A store that refuses writes is tolerated: the write is dropped
/// and logged at debug level.
pub struct SessionClient<'a, P, S> {
    provider: &'a P,
    cookies: &'a mut S,
    storage: &'a SessionStorage,
}

impl<'a, P, S> SessionClient<'a, P, S>
where
    P: IdentityProvider,
    S: CookieStore,
{
    pub fn new(provider: &'a P, cookies: &'a mut S, storage: &'a SessionStorage) -> Self {
        Self {
            provider,
            cookies,
            storage,
        }
    }

    /// Ask the provider who owns the current session.
    ///
    /// The access token is always checked by the provider. If it is refused,
    /// the session is refreshed once and the lookup retried.
    ///
    /// # Errors
    ///
    /// Returns any provider, transport or cookie decoding error. Callers that
    /// gate access should treat an error as "no user".
    pub async fn get_user(&mut self) -> Result<Option<User>, Error> {
        let Some(session) = self.storage.read_session(&self.cookies.get_all())? else {
            return Ok(None);
        };

        let mut refreshed = false;
        let session = if session.refresh_due(OffsetDateTime::now_utc(), REFRESH_MARGIN_SECS) {
            refreshed = true;
            self.refresh(&session.refresh_token).await?
        } else {
            session
        };

        match self.provider.get_user(&session.access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() && !refreshed => {
                tracing::debug!(error = %e, "Access token refused, refreshing session");
                let session = self.refresh(&session.refresh_token).await?;
                self.provider.get_user(&session.access_token).await.map(Some)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange a one-time authorization code for a session and store it.
    ///
    /// The PKCE verifier saved by [`sign_up`](Self::sign_up) or
    /// [`sign_in_with_oauth`](Self::sign_in_with_oauth) is consumed. No retry: the provider accepts a code once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCodeVerifier`] without contacting the provider
    /// if no verifier cookie is present, otherwise any provider error.
    pub async fn exchange_code_for_session(&mut self, auth_code: &str) -> Result<Session, Error> {
        let existing = self.cookies.get_all();
        let verifier = self
            .storage
            .read_code_verifier(&existing)?
            .ok_or(Error::MissingCodeVerifier)?;

        let session = self.provider.exchange_code(auth_code, &verifier).await?;

        let mut writes = self.storage.clear_code_verifier(&existing);
        writes.extend(self.storage.write_session(&session, &existing)?);
        self.write(writes);
        Ok(session)
    }

    /// Email/password sign-in. The new session is written through the store.
    ///
    /// # Errors
    ///
    /// Returns the provider error; wrong credentials are a client rejection.
    pub async fn sign_in_with_password(&mut self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self.provider.sign_in_with_password(email, password).await?;
        let writes = self.storage.write_session(&session, &self.cookies.get_all())?;
        self.write(writes);
        Ok(session)
    }

    /// Register an email/password account.
    ///
    /// When the provider asks for email confirmation, a fresh PKCE verifier
    /// is stored so the confirmation link can complete through
    /// [`exchange_code_for_session`](Self::exchange_code_for_session).
    /// When the account is confirmed right away, the session is stored.
    ///
    /// # Errors
    ///
    /// Returns the provider error; nothing is written in that case.
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUp, Error> {
        let pkce = PkcePair::generate();
        let existing = self.cookies.get_all();
        match self
            .provider
            .sign_up(email, password, redirect_to, &pkce.challenge)
            .await?
        {
            Some(session) => {
                let writes = self.storage.write_session(&session, &existing)?;
                self.write(writes);
                Ok(SignUp::SignedIn(session))
            }
            None => {
                let writes = self.storage.write_code_verifier(&pkce.verifier, &existing);
                self.write(writes);
                Ok(SignUp::ConfirmationSent)
            }
        }
    }

    /// Start an external OAuth login: store a fresh PKCE verifier and return
    /// the provider URL to send the browser to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the authorize URL cannot be built.
    pub fn sign_in_with_oauth(&mut self, provider: &str, redirect_to: &str) -> Result<Url, Error> {
        let pkce = PkcePair::generate();
        let url = self
            .provider
            .authorize_url(provider, redirect_to, &pkce.challenge)?;
        let writes = self
            .storage
            .write_code_verifier(&pkce.verifier, &self.cookies.get_all());
        self.write(writes);
        Ok(url)
    }

    /// Revoke the session at the provider (best effort) and clear its cookies.
    pub async fn sign_out(&mut self) {
        let existing = self.cookies.get_all();
        match self.storage.read_session(&existing) {
            Ok(Some(session)) => {
                if let Err(e) = self.provider.sign_out(&session.access_token).await {
                    tracing::warn!(error = %e, "Provider sign-out failed, clearing local session");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Clearing malformed session cookie"),
        }
        let removals = self.storage.clear_session(&existing);
        self.write(removals);
    }

    async fn refresh(&mut self, refresh_token: &str) -> Result<Session, Error> {
        match self.provider.refresh_session(refresh_token).await {
            Ok(session) => {
                let writes = self
                    .storage
                    .write_session(&session, &self.cookies.get_all())?;
                self.write(writes);
                Ok(session)
            }
            Err(e) => {
                if e.is_client_rejection() {
                    tracing::debug!(error = %e, "Refresh token refused, clearing session");
                    let removals = self.storage.clear_session(&self.cookies.get_all());
                    self.write(removals);
                }
                Err(e)
            }
        }
    }

    fn write(&mut self, cookies: Vec<Cookie<'static>>) {
        if cookies.is_empty() {
            return;
        }
        if let Err(e) = self.cookies.set_all(cookies) {
            tracing::debug!(error = %e, "Ignoring session cookie write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookieOptions, ReadOnlyCookies, RequestCookies};
    use crate::error::ErrorKind;
    use crate::testing::{FakeProvider, user};

    fn storage() -> SessionStorage {
        SessionStorage::for_project("abcd", CookieOptions::default())
    }

    fn far_future() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 3600
    }

    fn fresh(access: &str, refresh: &str) -> Session {
        Session::new(access, refresh, 3600).with_expires_at(far_future())
    }

    fn cookies_with(session: &Session) -> RequestCookies {
        RequestCookies::from_cookies(storage().write_session(session, &[]).unwrap())
    }

    #[tokio::test]
    async fn test_no_cookie_is_no_user_without_calling_provider() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let user = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap();

        assert_eq!(user, None);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_valid_session_resolves_user_without_writes() {
        let provider = FakeProvider::new().with_user("a1", user());
        let storage = storage();
        let mut cookies = cookies_with(&fresh("a1", "r1"));

        let resolved = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap();

        assert_eq!(resolved, Some(user()));
        assert!(cookies.written().is_empty());
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed_and_written_through() {
        let provider = FakeProvider::new()
            .with_refresh("r1", fresh("a2", "r2"))
            .with_user("a2", user());
        let storage = storage();
        let expiring = Session::new("a1", "r1", 3600)
            .with_expires_at(OffsetDateTime::now_utc().unix_timestamp() - 5);
        let mut cookies = cookies_with(&expiring);

        let resolved = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap();

        assert_eq!(resolved, Some(user()));
        assert_eq!(provider.calls(), ["refresh_session", "get_user"]);
        let stored = storage.read_session(&cookies.get_all()).unwrap().unwrap();
        assert_eq!(stored.access_token, "a2");
        assert_eq!(cookies.written().len(), 1);
    }

    #[tokio::test]
    async fn test_refused_access_token_triggers_one_refresh() {
        let provider = FakeProvider::new()
            .with_refresh("r1", fresh("a2", "r2"))
            .with_user("a2", user());
        let storage = storage();
        let mut cookies = cookies_with(&fresh("revoked", "r1"));

        let resolved = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap();

        assert_eq!(resolved, Some(user()));
        assert_eq!(provider.calls(), ["get_user", "refresh_session", "get_user"]);
    }

    #[tokio::test]
    async fn test_second_lookup_in_same_request_is_stable() {
        let provider = FakeProvider::new()
            .with_refresh("r1", fresh("a2", "r2"))
            .with_user("a2", user());
        let storage = storage();
        let expiring = Session::new("a1", "r1", 3600).with_expires_at(0);
        let mut cookies = cookies_with(&expiring);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        let first = client.get_user().await.unwrap();
        let second = client.get_user().await.unwrap();

        assert_eq!(first, second);
        // The refresh token is single use; the second call must not spend it again.
        assert_eq!(
            provider.calls(),
            ["refresh_session", "get_user", "get_user"]
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = cookies_with(&Session::new("a1", "spent", 3600).with_expires_at(0));

        let err = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(storage.read_session(&cookies.get_all()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_outage_keeps_cookies() {
        let provider = FakeProvider::new().down();
        let storage = storage();
        let mut cookies = cookies_with(&Session::new("a1", "r1", 3600).with_expires_at(0));

        assert!(
            SessionClient::new(&provider, &mut cookies, &storage)
                .get_user()
                .await
                .is_err()
        );
        assert!(cookies.written().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_store_still_resolves_user() {
        let provider = FakeProvider::new()
            .with_refresh("r1", fresh("a2", "r2"))
            .with_user("a2", user());
        let storage = storage();
        let stored = storage
            .write_session(&Session::new("a1", "r1", 3600).with_expires_at(0), &[])
            .unwrap();
        let mut cookies = ReadOnlyCookies::from_cookies(stored);

        let resolved = SessionClient::new(&provider, &mut cookies, &storage)
            .get_user()
            .await
            .unwrap();

        assert_eq!(resolved, Some(user()));
    }

    #[tokio::test]
    async fn test_oauth_start_then_exchange() {
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let start = FakeProvider::new();
        let url = SessionClient::new(&start, &mut cookies, &storage)
            .sign_in_with_oauth("github", "https://app.test/auth/callback")
            .unwrap();
        assert!(url.as_str().contains("provider=github"));

        let verifier = storage
            .read_code_verifier(&cookies.get_all())
            .unwrap()
            .unwrap();
        let challenge = crate::pkce::code_challenge(&verifier);
        assert!(url.as_str().contains(&challenge));

        let provider = FakeProvider::new().with_code("abc123", &verifier, fresh("a1", "r1"));
        let session = SessionClient::new(&provider, &mut cookies, &storage)
            .exchange_code_for_session("abc123")
            .await
            .unwrap();

        assert_eq!(session.access_token, "a1");
        let all = cookies.get_all();
        assert_eq!(storage.read_session(&all).unwrap().unwrap().access_token, "a1");
        assert!(storage.read_code_verifier(&all).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exchange_without_verifier_skips_provider() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let err = SessionClient::new(&provider, &mut cookies, &storage)
            .exchange_code_for_session("abc123")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingCodeVerifier));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_code_writes_nothing() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = RequestCookies::from_cookies(storage.write_code_verifier("v", &[]));

        let err = SessionClient::new(&provider, &mut cookies, &storage)
            .exchange_code_for_session("bad")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(cookies.written().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_provider_fails() {
        let provider = FakeProvider::new().down();
        let storage = storage();
        let mut cookies = cookies_with(&fresh("a1", "r1"));

        SessionClient::new(&provider, &mut cookies, &storage)
            .sign_out()
            .await;

        assert_eq!(provider.calls(), ["sign_out"]);
        assert!(storage.read_session(&cookies.get_all()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_sign_in_writes_session() {
        let provider = FakeProvider::new().with_password("ana@example.com", "hunter22", fresh("a1", "r1"));
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let session = SessionClient::new(&provider, &mut cookies, &storage)
            .sign_in_with_password("ana@example.com", "hunter22")
            .await
            .unwrap();

        assert_eq!(session.access_token, "a1");
        let stored = storage.read_session(&cookies.get_all()).unwrap().unwrap();
        assert_eq!(stored, session);
        assert_eq!(cookies.written().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_writes_nothing() {
        let provider = FakeProvider::new().with_password("ana@example.com", "hunter22", fresh("a1", "r1"));
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let err = SessionClient::new(&provider, &mut cookies, &storage)
            .sign_in_with_password("ana@example.com", "nope")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(cookies.written().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_then_confirmation_link_completes() {
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let signup = FakeProvider::new().with_sign_up("ana@example.com", None);
        let outcome = SessionClient::new(&signup, &mut cookies, &storage)
            .sign_up("ana@example.com", "hunter22", "https://app.test/auth/callback")
            .await
            .unwrap();
        assert_eq!(outcome, SignUp::ConfirmationSent);
        assert!(storage.read_session(&cookies.get_all()).unwrap().is_none());

        let verifier = storage
            .read_code_verifier(&cookies.get_all())
            .unwrap()
            .unwrap();
        assert_eq!(signup.challenges(), [crate::pkce::code_challenge(&verifier)]);

        let provider = FakeProvider::new().with_code("confirm-1", &verifier, fresh("a1", "r1"));
        SessionClient::new(&provider, &mut cookies, &storage)
            .exchange_code_for_session("confirm-1")
            .await
            .unwrap();
        let all = cookies.get_all();
        assert_eq!(storage.read_session(&all).unwrap().unwrap().access_token, "a1");
        assert!(storage.read_code_verifier(&all).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_confirmed_immediately_stores_session() {
        let provider = FakeProvider::new().with_sign_up("ana@example.com", Some(fresh("a1", "r1")));
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let outcome = SessionClient::new(&provider, &mut cookies, &storage)
            .sign_up("ana@example.com", "hunter22", "https://app.test/auth/callback")
            .await
            .unwrap();

        assert!(matches!(outcome, SignUp::SignedIn(_)));
        let all = cookies.get_all();
        assert_eq!(storage.read_session(&all).unwrap().unwrap().access_token, "a1");
        assert!(storage.read_code_verifier(&all).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_sign_up_writes_nothing() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = RequestCookies::default();

        let err = SessionClient::new(&provider, &mut cookies, &storage)
            .sign_up("taken@example.com", "hunter22", "https://app.test/auth/callback")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(cookies.written().is_empty());
    }
}
