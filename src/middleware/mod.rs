//! Session gateway for axum.
//!
//! Every request passes through [`session_gate`], which validates (and if
//! needed refreshes) the session carried in cookies, then lets the request
//! through or redirects it according to the [`RoutePolicy`](crate::policy::RoutePolicy).
//! [`auth_routes`] serves the OAuth callback, login start and sign-out.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use auditlens_gate::middleware::{GatewayConfig, gateway};
//!
//! let app = axum::Router::new()
//!     .route("/dashboard", get(dashboard))
//!     .route("/login", get(login_page));
//!
//! // SUPABASE_URL / SUPABASE_ANON_KEY are read on first use.
//! let app = gateway(app, GatewayConfig::from_env()?);
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod gate;
mod routes;
mod state;

use axum::middleware::from_fn_with_state;
use axum::{Extension, Router};

pub use config::{GatewayConfig, ProviderSource};
pub use error::GatewayError;
pub use extractor::CurrentUser;
pub use gate::session_gate;
pub use routes::auth_routes;
pub use state::GatewayState;

/// Mount the auth routes on `app` and put every route behind the session gate.
pub fn gateway(app: Router, config: GatewayConfig) -> Router {
    let state = GatewayState::new(config);
    app.merge(auth_routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), session_gate))
        .layer(Extension(state))
}
