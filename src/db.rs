// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Database connection and application state.

use std::sync::Arc;

use crate::config::Config;
use crate::credentials::Ed25519KeyGenerator;
use crate::registry::PlatformRegistry;
use crate::store::{DocumentStore, PostgresStore};

/// Shared application state injected into every Axum handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: PlatformRegistry,
    /// Optional API key for mutating routes.
    /// When `Some`, callers must supply the matching value in `X-Registry-Key`.
    /// When `None`, the admin surface is open (useful for local dev).
    pub registry_key: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, registry_key: Option<String>) -> Self {
        Self {
            registry: PlatformRegistry::new(store, Arc::new(Ed25519KeyGenerator)),
            registry_key,
        }
    }

    /// Connect to PostgreSQL, apply migrations and build the state.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let store = PostgresStore::connect(&config.database_url).await?;
        tracing::info!("Platform registry connected to database");

        sqlx::migrate!("./migrations").run(store.pool()).await?;
        tracing::info!("Migrations applied");

        if config.registry_key.is_some() {
            tracing::info!("REGISTRY_KEY set — mutating routes are key-protected");
        } else {
            tracing::warn!("REGISTRY_KEY not set — mutating routes are open (dev mode)");
        }

        Ok(Self::new(Arc::new(store), config.registry_key.clone()))
    }
}
