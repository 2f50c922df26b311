mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use banter_api::{AppState, AppStateInner};
use banter_db::Database;
use banter_gateway::hub::Hub;
use banter_types::token::TokenKeys;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Shared resources: one durable store, one hub, one set of signing
    // keys — all built once and passed explicitly.
    let db = Arc::new(Database::open(&config.db_path)?);
    let tokens = TokenKeys::new(&config.jwt_secret);
    let hub = Hub::new();

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        tokens: tokens.clone(),
    });

    let app = banter_api::router(app_state)
        .merge(banter_gateway::router(hub, db, tokens))
        .layer(config.cors_layer()?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("banter listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
