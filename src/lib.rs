#![doc = include_str!("../README.md")]

pub mod client;
pub mod cookies;
pub mod error;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod pkce;
pub mod policy;
pub mod provider;
pub mod session;
pub mod storage;
#[cfg(test)]
mod testing;
pub mod types;
pub mod validator;

// Re-exports for convenient access
pub use client::{AuthClient, ProviderConfig};
pub use cookies::{CookieOptions, CookieStore, CookieWriteError, ReadOnlyCookies, RequestCookies};
pub use error::{Error, ErrorKind};
pub use policy::{Decision, PrefixMatch, RedirectTarget, RouteClass, RoutePolicy};
pub use provider::IdentityProvider;
pub use session::{SessionClient, SignUp};
pub use storage::SessionStorage;
pub use types::{Session, User, UserId};
pub use validator::resolve_user;
