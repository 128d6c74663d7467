use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::CookieJar;
use cookie::Cookie;

use crate::cookies::{self, CookieWrites, RequestCookies};

/// Cookies the browser sent, verbatim and in order.
pub(super) fn header_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    cookies::parse_header(
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    )
}

/// Adapter seeded from the cookies the browser sent.
pub(super) fn request_cookies(headers: &HeaderMap) -> RequestCookies {
    RequestCookies::from_cookies(header_cookies(headers))
}

/// Update the request's `Cookie` header with the adapter's request view.
/// Untouched if nothing was written.
pub(super) fn forward_request_cookies(writes: &CookieWrites, headers: &mut HeaderMap) {
    if writes.is_empty() {
        return;
    }
    headers.remove(COOKIE);
    let Some(value) = writes.request_header() else {
        return;
    };
    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable cookie header"),
    }
}

/// Response jar carrying every cookie the provider client wrote.
pub(super) fn response_jar(writes: CookieWrites) -> CookieJar {
    writes
        .response
        .into_iter()
        .fold(CookieJar::new(), |jar, cookie| jar.add(cookie))
}
