/// Errors raised by identity-provider operations.
///
/// Nothing in this crate swallows these implicitly: callers inspect
/// [`Error::kind`] and pick their own posture (the session gate downgrades to
/// anonymous, the login callback maps to a coarse redirect code).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} rejected with status {status}: {detail}")]
    Provider {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("Malformed session cookie: {0}")]
    MalformedSession(String),
    #[error("PKCE code verifier not found in cookies")]
    MissingCodeVerifier,
    #[error("Failed to encode session: {0}")]
    Encode(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required setting is missing or invalid. Fatal, never retried.
    Configuration,
    /// The provider could not be reached or returned an unreadable body.
    Transport,
    /// The provider answered and said no.
    Rejected,
    /// Cookie state is unusable (malformed session, no code verifier).
    Session,
    /// A local invariant failed.
    Internal,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Http(_) => ErrorKind::Transport,
            Self::Provider { .. } => ErrorKind::Rejected,
            Self::MalformedSession(_) | Self::MissingCodeVerifier => ErrorKind::Session,
            Self::Encode(_) => ErrorKind::Internal,
        }
    }

    /// Whether the provider refused the credential itself (401/403), as
    /// opposed to a server-side or transport failure.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Provider { status: 401 | 403, .. })
    }

    /// Whether the provider rejected the request as a client error. A 4xx on
    /// refresh means the refresh token is spent and the session is gone.
    #[must_use]
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, Self::Provider { status, .. } if (400..500).contains(status))
    }
}
