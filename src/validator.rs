use crate::cookies::CookieStore;
use crate::provider::IdentityProvider;
use crate::session::SessionClient;
use crate::types::User;

/// Resolve the current user, treating any failure as "nobody".
///
/// Provider outages, refused tokens and malformed cookies all come back as
/// `None`: when identity is in doubt the request is anonymous, never
/// authenticated.
pub async fn resolve_user<P, S>(client: &mut SessionClient<'_, P, S>) -> Option<User>
where
    P: IdentityProvider,
    S: CookieStore,
{
    match client.get_user().await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(
                error = %e,
                kind = ?e.kind(),
                "Session validation failed, continuing as anonymous"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use cookie::Cookie;
    use time::OffsetDateTime;

    use super::*;
    use crate::cookies::{CookieOptions, RequestCookies};
    use crate::storage::SessionStorage;
    use crate::testing::{FakeProvider, user};
    use crate::types::Session;

    fn storage() -> SessionStorage {
        SessionStorage::for_project("abcd", CookieOptions::default())
    }

    fn signed_in(storage: &SessionStorage) -> RequestCookies {
        let session = Session::new("a1", "r1", 3600)
            .with_expires_at(OffsetDateTime::now_utc().unix_timestamp() + 3600);
        RequestCookies::from_cookies(storage.write_session(&session, &[]).unwrap())
    }

    #[tokio::test]
    async fn test_resolves_user() {
        let provider = FakeProvider::new().with_user("a1", user());
        let storage = storage();
        let mut cookies = signed_in(&storage);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        assert_eq!(resolve_user(&mut client).await, Some(user()));
    }

    #[tokio::test]
    async fn test_provider_outage_is_anonymous() {
        let provider = FakeProvider::new().down();
        let storage = storage();
        let mut cookies = signed_in(&storage);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        assert_eq!(resolve_user(&mut client).await, None);
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_anonymous() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies =
            RequestCookies::from_cookies([Cookie::new("sb-abcd-auth-token", "base64-%%%")]);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        assert_eq!(resolve_user(&mut client).await, None);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_token_is_anonymous() {
        let provider = FakeProvider::new();
        let storage = storage();
        let mut cookies = signed_in(&storage);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        assert_eq!(resolve_user(&mut client).await, None);
    }

    #[tokio::test]
    async fn test_repeated_validation_is_idempotent() {
        let provider = FakeProvider::new().with_user("a1", user());
        let storage = storage();
        let mut cookies = signed_in(&storage);

        let mut client = SessionClient::new(&provider, &mut cookies, &storage);
        let first = resolve_user(&mut client).await;
        let second = resolve_user(&mut client).await;
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
