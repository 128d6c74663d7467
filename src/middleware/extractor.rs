use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::cookies::header_cookies;
use super::error::GatewayError;
use super::state::GatewayState;
use crate::cookies::ReadOnlyCookies;
use crate::session::SessionClient;
use crate::types::User;
use crate::validator;

/// User resolved by the session gate for this request.
#[derive(Clone)]
pub(super) struct ResolvedUser(pub(super) Option<User>);

/// Current user, or `None` for anonymous requests.
///
/// Behind [`session_gate`](super::session_gate) this is the identity the gate
/// already resolved. Elsewhere it validates the session cookies itself
/// through a read-only cookie view: a refresh still works for this request
/// but is not persisted, since this phase cannot set cookies.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Signed in as {}", u.email.unwrap_or_default()),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedUser(user)) = parts.extensions.get::<ResolvedUser>() {
            return Ok(Self(user.clone()));
        }

        let state = parts
            .extensions
            .get::<GatewayState>()
            .cloned()
            .ok_or_else(|| GatewayError::Config("GatewayState extension is not installed".into()))?;
        let (client, storage) = state.client()?;

        let mut cookies = ReadOnlyCookies::from_cookies(header_cookies(&parts.headers));
        let mut session = SessionClient::new(&client, &mut cookies, &storage);
        Ok(Self(validator::resolve_user(&mut session).await))
    }
}
