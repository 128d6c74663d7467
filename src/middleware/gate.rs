use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::cookies;
use super::error::GatewayError;
use super::extractor::ResolvedUser;
use super::state::GatewayState;
use crate::policy::Decision;
use crate::session::SessionClient;
use crate::validator;

/// Per-request session gate.
///
/// Resolves the user from the session cookies (refreshing them if needed),
/// then either continues with the refreshed cookies forwarded and attached to
/// the response, or redirects to the login or home path. Mount with
/// [`axum::middleware::from_fn_with_state`].
pub async fn session_gate(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if state.is_auth_route(&path) {
        return next.run(request).await;
    }

    let (client, storage) = match state.client() {
        Ok(pair) => pair,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let mut cookies = cookies::request_cookies(request.headers());
    let user = {
        let mut session = SessionClient::new(&client, &mut cookies, &storage);
        validator::resolve_user(&mut session).await
    };
    let writes = cookies.into_writes();

    match state.policy().decide(&path, user.as_ref()) {
        Decision::Continue => {
            cookies::forward_request_cookies(&writes, request.headers_mut());
            request.extensions_mut().insert(ResolvedUser(user));
            let response = next.run(request).await;
            (cookies::response_jar(writes), response).into_response()
        }
        Decision::Redirect(target) => {
            let location = redirect_location(state.policy().target_path(target), request.uri().query());
            tracing::debug!(%path, %location, "Session gate redirect");
            (cookies::response_jar(writes), Redirect::temporary(&location)).into_response()
        }
    }
}

/// Swap the path, keep the query string.
fn redirect_location(target: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{target}?{query}"),
        _ => target.to_string(),
    }
}
