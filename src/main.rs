//! Platform trust registry — registration, keys and access tokens for
//! federated platforms.
//!
//! Serves the admin surface described in [`platform_trust::handlers`] on
//! `LISTEN_ADDR`, backed by PostgreSQL at `DATABASE_URL`.

use platform_trust::{config::Config, db::AppState, handlers};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "platform_trust=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let state = Arc::new(AppState::connect(&config).await?);

    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Platform registry listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
