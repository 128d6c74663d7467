use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Identity-provider user identifier (UUID).
///
/// Stable for the lifetime of the account. This is the only part of the
/// identity the gateway treats as a key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Resolved principal, as returned by the provider's user endpoint.
///
/// Recomputed on every request; never cache one across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl User {
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            role: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Access/refresh credential pair issued by the provider.
///
/// The gateway only ever holds a cookie-encoded copy of this. `expires_at`
/// schedules refreshes; whether the access token is still good is decided by
/// the provider, not by comparing it to the local clock.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl Session {
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in,
            expires_at: None,
            refresh_token: refresh_token.into(),
            user: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Fill in `expires_at` from `expires_in` when the provider omitted it.
    pub(crate) fn stamp_expiry(&mut self, now: OffsetDateTime) {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(now.unix_timestamp() + self.expires_in);
        }
    }

    /// Whether a refresh is due within `margin_secs` of `now`.
    ///
    /// A session without an expiry is never considered due.
    #[must_use]
    pub fn refresh_due(&self, now: OffsetDateTime, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at - margin_secs <= now.unix_timestamp())
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
