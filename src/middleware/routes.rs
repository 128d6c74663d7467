use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;

use super::cookies;
use super::error::GatewayError;
use super::state::GatewayState;
use crate::cookies::RequestCookies;
use crate::error::{Error, ErrorKind};
use crate::session::{SessionClient, SignUp};

/// Auth routes under the configured base path (default `/auth`):
///
/// - `GET {auth}/callback?code=…`: authorization-code exchange
/// - `POST {auth}/signin`: email/password sign-in (form `email`, `password`)
/// - `POST {auth}/signup`: email/password registration (same form)
/// - `GET {auth}/login?provider=…`: start an external OAuth login
/// - `GET|POST {auth}/signout`: end the session
pub fn auth_routes(state: GatewayState) -> Router {
    let auth_path = state.auth_path().to_string();

    Router::new()
        .route(&format!("{auth_path}/callback"), get(callback))
        .route(&format!("{auth_path}/signin"), post(sign_in))
        .route(&format!("{auth_path}/signup"), post(sign_up))
        .route(&format!("{auth_path}/login"), get(login))
        .route(&format!("{auth_path}/signout"), get(sign_out).post(sign_out))
        .with_state(state)
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// Never fails; the first value of a repeated key wins.
    fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let pairs = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes());
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// Coarse failure reported to the browser; the detail only goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginFailure {
    AuthFailed,
    InvalidCredentials,
    SignUpFailed,
    MissingCredentials,
    Unexpected,
}

impl LoginFailure {
    fn code(self) -> &'static str {
        match self {
            Self::AuthFailed => "auth_failed",
            Self::InvalidCredentials => "invalid_credentials",
            Self::SignUpFailed => "signup_failed",
            Self::MissingCredentials => "missing_credentials",
            Self::Unexpected => "unexpected_error",
        }
    }

    /// A provider rejection of a form submission becomes `rejected`.
    fn of_form(e: &Error, rejected: Self) -> Self {
        match e.kind() {
            ErrorKind::Rejected => rejected,
            _ => Self::from(e),
        }
    }
}

impl From<&Error> for LoginFailure {
    fn from(e: &Error) -> Self {
        match e.kind() {
            ErrorKind::Transport | ErrorKind::Rejected | ErrorKind::Session => Self::AuthFailed,
            ErrorKind::Configuration | ErrorKind::Internal => Self::Unexpected,
        }
    }
}

async fn callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let mut cookies = cookies::request_cookies(&headers);
    let params = CallbackParams::from_query(query.as_deref());

    let location = match complete_login(&state, &mut cookies, params).await {
        Ok(()) => state.policy().home_path().to_string(),
        Err(failure) => login_error(state.policy().login_path(), failure.code()),
    };

    (
        cookies::response_jar(cookies.into_writes()),
        Redirect::temporary(&location),
    )
        .into_response()
}

/// No code means the session is already established.
async fn complete_login(
    state: &GatewayState,
    cookies: &mut RequestCookies,
    params: CallbackParams,
) -> Result<(), LoginFailure> {
    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth error from identity provider");
    }

    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        return Ok(());
    };

    let (client, storage) = state.client().map_err(|e| {
        tracing::error!(error = %e, "Unexpected error in auth callback");
        LoginFailure::Unexpected
    })?;

    SessionClient::new(&client, cookies, &storage)
        .exchange_code_for_session(&code)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, kind = ?e.kind(), "Error exchanging code for session");
            LoginFailure::from(&e)
        })?;

    tracing::info!("Authorization code exchanged, session established");
    Ok(())
}

// ── Email and password ─────────────────────────────────────────────

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    fn filled(self) -> Option<Self> {
        (!self.email.trim().is_empty() && !self.password.is_empty()).then_some(self)
    }
}

async fn sign_in(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    form: Result<Form<Credentials>, FormRejection>,
) -> Response {
    let login_path = state.policy().login_path();
    let Some(credentials) = form.ok().and_then(|Form(c)| c.filled()) else {
        return Redirect::to(&login_error(login_path, LoginFailure::MissingCredentials.code()))
            .into_response();
    };

    let (client, storage) = match state.client() {
        Ok(pair) => pair,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let mut cookies = cookies::request_cookies(&headers);
    let signed_in = SessionClient::new(&client, &mut cookies, &storage)
        .sign_in_with_password(credentials.email.trim(), &credentials.password)
        .await;

    let location = match signed_in {
        Ok(_) => {
            tracing::info!("Signed in with password");
            state.policy().home_path().to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = ?e.kind(), "Password sign-in failed");
            let failure = LoginFailure::of_form(&e, LoginFailure::InvalidCredentials);
            login_error(login_path, failure.code())
        }
    };

    (
        cookies::response_jar(cookies.into_writes()),
        Redirect::to(&location),
    )
        .into_response()
}

async fn sign_up(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    form: Result<Form<Credentials>, FormRejection>,
) -> Response {
    let login_path = state.policy().login_path();
    let Some(credentials) = form.ok().and_then(|Form(c)| c.filled()) else {
        return Redirect::to(&login_error(login_path, LoginFailure::MissingCredentials.code()))
            .into_response();
    };

    let (client, storage) = match state.client() {
        Ok(pair) => pair,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let redirect_to = state.callback_url(&headers);
    let mut cookies = cookies::request_cookies(&headers);
    let signed_up = SessionClient::new(&client, &mut cookies, &storage)
        .sign_up(credentials.email.trim(), &credentials.password, &redirect_to)
        .await;

    let location = match signed_up {
        Ok(SignUp::SignedIn(_)) => {
            tracing::info!("Signed up and signed in");
            state.policy().home_path().to_string()
        }
        Ok(SignUp::ConfirmationSent) => {
            tracing::info!("Sign-up confirmation sent");
            login_message(login_path, "check_email")
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = ?e.kind(), "Sign-up failed");
            let failure = LoginFailure::of_form(&e, LoginFailure::SignUpFailed);
            login_error(login_path, failure.code())
        }
    };

    (
        cookies::response_jar(cookies.into_writes()),
        Redirect::to(&location),
    )
        .into_response()
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    provider: Option<String>,
}

async fn login(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(params): Query<LoginParams>,
) -> Response {
    let Some(provider) = params.provider.filter(|p| !p.is_empty()) else {
        return Redirect::temporary(&login_error(state.policy().login_path(), "missing_provider"))
            .into_response();
    };

    let (client, storage) = match state.client() {
        Ok(pair) => pair,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let redirect_to = state.callback_url(&headers);
    let mut cookies = cookies::request_cookies(&headers);
    let started =
        SessionClient::new(&client, &mut cookies, &storage).sign_in_with_oauth(&provider, &redirect_to);

    match started {
        Ok(url) => (
            cookies::response_jar(cookies.into_writes()),
            Redirect::temporary(url.as_str()),
        )
            .into_response(),
        Err(e) => GatewayError::from(e).into_response(),
    }
}

// ── Sign out ───────────────────────────────────────────────────────

async fn sign_out(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let (client, storage) = match state.client() {
        Ok(pair) => pair,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let mut cookies = cookies::request_cookies(&headers);
    SessionClient::new(&client, &mut cookies, &storage)
        .sign_out()
        .await;

    tracing::info!("Signed out");
    (
        cookies::response_jar(cookies.into_writes()),
        Redirect::to(state.policy().login_path()),
    )
        .into_response()
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(login_path: &str, code: &str) -> String {
    let encoded = urlencoding::encode(code);
    format!("{login_path}?error={encoded}")
}

fn login_message(login_path: &str, message: &str) -> String {
    let encoded = urlencoding::encode(message);
    format!("{login_path}?message={encoded}")
}
