use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use kiosk_api::config::Config;
use kiosk_api::mailer::Mailer;
use kiosk_api::{AppState, AppStateInner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiosk=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = kiosk_db::Database::open(&PathBuf::from(&config.db_path))?;
    let mailer = Mailer::from_config(&config);
    if !mailer.is_configured() {
        info!("SMTP not configured, emails will be skipped");
    }

    let state: AppState = Arc::new(AppStateInner { db, config, mailer });

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;

    let app = kiosk_api::router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Kiosk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
