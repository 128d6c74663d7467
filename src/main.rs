use auditlens_gate::middleware::{CurrentUser, GatewayConfig, gateway};
use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing_subscriber::EnvFilter;

async fn home() -> &'static str {
    "AuditLens"
}

async fn login_page() -> &'static str {
    "Sign in at /auth/login?provider=<name>"
}

async fn signed_in_page(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    match user {
        Some(user) => format!(
            "Signed in as {}",
            user.email.unwrap_or_else(|| user.id.to_string())
        ),
        None => "Not signed in".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,auditlens_gate=debug")),
        )
        .init();

    let bind = std::env::var("GATEWAY_BIND").unwrap_or_else(|_| "127.0.0.1:3000".into());

    let app = Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/signup", get(login_page))
        .route("/dashboard", get(signed_in_page))
        .route("/dashboard/{*rest}", get(signed_in_page))
        .route("/chat", get(signed_in_page))
        .route("/documents", get(signed_in_page));

    let app = gateway(app, GatewayConfig::from_env()?);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "Session gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
