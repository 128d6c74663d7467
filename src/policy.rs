//! Route classification and the allow/redirect decision.
//!
//! Pure functions of the request path and whether a user was resolved.

use crate::types::User;

/// Path prefixes that require a signed-in user.
pub const PROTECTED_PREFIXES: [&str; 3] = ["/dashboard", "/chat", "/documents"];
/// Paths only meant for anonymous visitors.
pub const AUTH_ONLY_PATHS: [&str; 2] = ["/login", "/signup"];
pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Public,
}

/// How protected prefixes are compared to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixMatch {
    /// Plain string prefix: `/dashboards` and `/chatter` count as protected.
    #[default]
    Literal,
    /// Prefix must end at a path segment boundary: `/chat` and `/chat/x`,
    /// but not `/chatter`.
    Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Redirect(RedirectTarget),
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    protected_prefixes: Vec<String>,
    auth_only_paths: Vec<String>,
    login_path: String,
    home_path: String,
    prefix_match: PrefixMatch,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            protected_prefixes: PROTECTED_PREFIXES.iter().map(|p| p.to_string()).collect(),
            auth_only_paths: AUTH_ONLY_PATHS.iter().map(|p| p.to_string()).collect(),
            login_path: LOGIN_PATH.into(),
            home_path: HOME_PATH.into(),
            prefix_match: PrefixMatch::Literal,
        }
    }
}

impl RoutePolicy {
    #[must_use]
    pub fn with_protected_prefixes<I, T>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.protected_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_auth_only_paths<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.auth_only_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    #[must_use]
    pub fn with_prefix_match(mut self, prefix_match: PrefixMatch) -> Self {
        self.prefix_match = prefix_match;
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    #[must_use]
    pub fn target_path(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Login => &self.login_path,
            RedirectTarget::Home => &self.home_path,
        }
    }

    /// Protected prefixes are checked first, in configured order.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| self.matches_prefix(path, prefix))
        {
            RouteClass::Protected
        } else if self.auth_only_paths.iter().any(|p| p == path) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    /// First match wins:
    /// 1. protected path without a user → login;
    /// 2. auth-only path with a user → home;
    /// 3. anything else continues.
    #[must_use]
    pub fn decide(&self, path: &str, user: Option<&User>) -> Decision {
        match (self.classify(path), user) {
            (RouteClass::Protected, None) => Decision::Redirect(RedirectTarget::Login),
            (RouteClass::AuthOnly, Some(_)) => Decision::Redirect(RedirectTarget::Home),
            _ => Decision::Continue,
        }
    }

    fn matches_prefix(&self, path: &str, prefix: &str) -> bool {
        match self.prefix_match {
            PrefixMatch::Literal => path.starts_with(prefix),
            PrefixMatch::Segment => path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}
