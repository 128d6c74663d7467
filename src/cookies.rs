//! Cookie access for the identity-provider client.
//!
//! [`RequestCookies`] is the per-request adapter: every write lands in two
//! places, the in-flight request's view (so a second read in the same request
//! sees it) and the list of cookies to send back with the response.
//! [`ReadOnlyCookies`] is for render phases where writes are not allowed.

use cookie::{Cookie, SameSite};
use time::Duration;

/// Write refused by a cookie store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CookieWriteError {
    /// The store only exposes reads in this phase.
    #[error("cookies are read-only in this context")]
    ReadOnly,
}

/// Cookie read/write capability handed to [`SessionClient`](crate::session::SessionClient).
pub trait CookieStore: Send {
    /// Current cookies, as last written.
    fn get_all(&self) -> Vec<Cookie<'static>>;

    /// Apply each cookie with exactly the attributes given.
    ///
    /// # Errors
    ///
    /// Returns [`CookieWriteError`] if this store does not accept writes.
    fn set_all(&mut self, cookies: Vec<Cookie<'static>>) -> Result<(), CookieWriteError>;
}

/// Attributes applied to every session cookie the gateway writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
    pub secure: bool,
    pub http_only: bool,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            same_site: Some(SameSite::Lax),
            secure: false,
            http_only: false,
            max_age: Duration::days(400),
        }
    }
}

impl CookieOptions {
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub(crate) fn build(&self, name: impl Into<String>, value: impl Into<String>) -> Cookie<'static> {
        self.build_with_max_age(name.into(), value.into(), self.max_age)
    }

    /// Same attributes, empty value, `Max-Age=0`.
    pub(crate) fn removal(&self, name: impl Into<String>) -> Cookie<'static> {
        self.build_with_max_age(name.into(), String::new(), Duration::ZERO)
    }

    fn build_with_max_age(&self, name: String, value: String, max_age: Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .max_age(max_age);
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

/// Parse `Cookie` header values into `name=value` pairs, in the order sent.
///
/// Values are kept exactly as the browser sent them: no percent-decoding.
/// Unparseable pairs are skipped.
pub fn parse_header<'a, I>(header_values: I) -> Vec<Cookie<'static>>
where
    I: IntoIterator<Item = &'a str>,
{
    header_values
        .into_iter()
        .flat_map(|value| Cookie::split_parse(value.to_owned()))
        .filter_map(Result::ok)
        .collect()
}

/// Dual-write cookie adapter for one inbound request.
#[derive(Debug, Default, Clone)]
pub struct RequestCookies {
    request: Vec<Cookie<'static>>,
    response: Vec<Cookie<'static>>,
}

/// The two outputs of a [`RequestCookies`] once the gateway is done with it.
#[derive(Debug, Default)]
pub struct CookieWrites {
    /// Cookie view to forward with the request: originals in their sent
    /// order, written names replaced in place or appended, removals dropped.
    pub request: Vec<Cookie<'static>>,
    /// Cookies to set on the response, one per written name, in write order.
    pub response: Vec<Cookie<'static>>,
}

impl RequestCookies {
    /// Start from the cookies the client sent.
    pub fn from_cookies<I>(cookies: I) -> Self
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        Self {
            request: cookies.into_iter().collect(),
            response: Vec::new(),
        }
    }

    /// Cookies written so far, without consuming the adapter.
    #[must_use]
    pub fn written(&self) -> &[Cookie<'static>] {
        &self.response
    }

    #[must_use]
    pub fn into_writes(self) -> CookieWrites {
        CookieWrites {
            request: self.request,
            response: self.response,
        }
    }
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() || cookie.max_age() == Some(Duration::ZERO)
}

/// Replace `cookie.name()` where it first appears (dropping duplicates),
/// append it if new, or drop it entirely for a removal.
fn apply(view: &mut Vec<Cookie<'static>>, cookie: Cookie<'static>) {
    let position = view.iter().position(|c| c.name() == cookie.name());
    view.retain(|c| c.name() != cookie.name());
    if is_removal(&cookie) {
        return;
    }
    let index = position.unwrap_or(view.len());
    view.insert(index, cookie);
}

impl CookieStore for RequestCookies {
    fn get_all(&self) -> Vec<Cookie<'static>> {
        self.request.clone()
    }

    fn set_all(&mut self, cookies: Vec<Cookie<'static>>) -> Result<(), CookieWriteError> {
        for cookie in cookies {
            apply(&mut self.request, cookie.clone());
            self.response.retain(|existing| existing.name() != cookie.name());
            self.response.push(cookie);
        }
        Ok(())
    }
}

impl CookieWrites {
    /// Whether anything was written during the request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }

    /// `Cookie` header value for the forwarded request, pairs verbatim and
    /// in order. `None` if nothing remains.
    #[must_use]
    pub fn request_header(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .request
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}

/// Cookie view that refuses writes.
#[derive(Debug, Default, Clone)]
pub struct ReadOnlyCookies {
    cookies: Vec<Cookie<'static>>,
}

impl ReadOnlyCookies {
    pub fn from_cookies<I>(cookies: I) -> Self
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        Self {
            cookies: cookies.into_iter().collect(),
        }
    }
}

impl CookieStore for ReadOnlyCookies {
    fn get_all(&self) -> Vec<Cookie<'static>> {
        self.cookies.clone()
    }

    fn set_all(&mut self, _cookies: Vec<Cookie<'static>>) -> Result<(), CookieWriteError> {
        Err(CookieWriteError::ReadOnly)
    }
}
