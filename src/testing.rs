//! In-memory identity provider for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use url::Url;

use crate::error::Error;
use crate::provider::IdentityProvider;
use crate::types::{Session, User, UserId};

pub(crate) const USER_ID: &str = "3d6f0a8e-2c51-4b7a-9e0f-5a1c2b3d4e5f";

pub(crate) fn user() -> User {
    User::new(USER_ID.parse::<UserId>().unwrap()).with_email("ana@example.com")
}

fn rejected(operation: &'static str, status: u16) -> Error {
    Error::Provider {
        operation,
        status,
        detail: "rejected".into(),
    }
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    users: HashMap<String, User>,
    refreshes: Mutex<HashMap<String, Session>>,
    codes: HashMap<String, (String, Session)>,
    passwords: HashMap<(String, String), Session>,
    sign_ups: HashMap<String, Option<Session>>,
    challenges: Mutex<Vec<String>>,
    down: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `access_token` resolves to `user`.
    pub(crate) fn with_user(mut self, access_token: &str, user: User) -> Self {
        self.users.insert(access_token.into(), user);
        self
    }

    /// `refresh_token` can be spent once for `session`.
    pub(crate) fn with_refresh(self, refresh_token: &str, session: Session) -> Self {
        self.refreshes
            .lock()
            .unwrap()
            .insert(refresh_token.into(), session);
        self
    }

    pub(crate) fn with_code(mut self, code: &str, verifier: &str, session: Session) -> Self {
        self.codes.insert(code.into(), (verifier.into(), session));
        self
    }

    pub(crate) fn with_password(mut self, email: &str, password: &str, session: Session) -> Self {
        self.passwords
            .insert((email.into(), password.into()), session);
        self
    }

    /// `email` may sign up; `Some` confirms the account right away.
    pub(crate) fn with_sign_up(mut self, email: &str, session: Option<Session>) -> Self {
        self.sign_ups.insert(email.into(), session);
        self
    }

    /// PKCE challenges received by `sign_up`.
    pub(crate) fn challenges(&self) -> Vec<String> {
        self.challenges.lock().unwrap().clone()
    }

    /// Every call fails with a 503.
    pub(crate) fn down(mut self) -> Self {
        self.down = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> Result<(), Error> {
        self.calls.lock().unwrap().push(operation.to_string());
        if self.down {
            return Err(rejected(operation, 503));
        }
        Ok(())
    }
}

impl IdentityProvider for FakeProvider {
    async fn get_user(&self, access_token: &str) -> Result<User, Error> {
        self.record("get_user")?;
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| rejected("user lookup", 401))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, Error> {
        self.record("refresh_session")?;
        self.refreshes
            .lock()
            .unwrap()
            .remove(refresh_token)
            .ok_or_else(|| rejected("token refresh", 400))
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, Error> {
        self.record("exchange_code")?;
        match self.codes.get(auth_code) {
            Some((verifier, session)) if verifier == code_verifier => Ok(session.clone()),
            _ => Err(rejected("code exchange", 400)),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        self.record("sign_in_with_password")?;
        self.passwords
            .get(&(email.to_string(), password.to_string()))
            .cloned()
            .ok_or_else(|| rejected("password sign-in", 400))
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, Error> {
        self.record("sign_up")?;
        self.challenges.lock().unwrap().push(code_challenge.to_string());
        self.sign_ups
            .get(email)
            .cloned()
            .ok_or_else(|| rejected("sign up", 422))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), Error> {
        self.record("sign_out")
    }

    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, Error> {
        let mut url: Url = "https://idp.test/auth/v1/authorize"
            .parse()
            .map_err(|e| Error::Config(format!("{e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge);
        Ok(url)
    }
}
