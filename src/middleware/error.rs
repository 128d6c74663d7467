use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors the gateway cannot turn into a redirect.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or invalid configuration. Fatal for the request.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider failure outside the session and login flows.
    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Gateway internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
    }
}

impl From<crate::error::Error> for GatewayError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Config(msg) => Self::Config(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}
