// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Axum route handlers for the platform registry.
//!
//! ## Endpoints
//!
//! - `GET    /health`                — Health check
//! - `GET    /platforms`             — List platforms (optionally by `url` / `client_id`)
//! - `POST   /platforms`             — Register a platform (or merge into an existing one)
//! - `DELETE /platforms`             — Delete the platform for `url` + `client_id`
//! - `GET    /platforms/:kid`        — Platform with public key and status
//! - `PATCH  /platforms/:kid`        — Update a platform
//! - `DELETE /platforms/:kid`        — Delete a platform
//! - `PUT    /platforms/:kid/active` — Activate / deactivate a platform

use crate::{
    auth::require_registry_key,
    db::AppState,
    error::{ApiError, RegistryError},
    models::{PlatformDescription, PlatformIdentity, PlatformPatch, RegisterRequest, UrlLookup},
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/platforms",
            get(list_platforms)
                .post(register_platform)
                .delete(delete_platform_by_pair),
        )
        .route(
            "/platforms/:kid",
            get(get_platform).patch(update_platform).delete(delete_platform),
        )
        .route("/platforms/:kid/active", put(set_active))
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Query string for URL lookups and pair deletion.
#[derive(Debug, Deserialize)]
pub struct PlatformQuery {
    pub url: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

// ── Health ────────────────────────────────────────────────────────────────────

/// `GET /health` — Health check
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "platform-trust",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Lookup ────────────────────────────────────────────────────────────────────

/// `GET /platforms` — All platforms, or those matching `url` (and `client_id`).
pub async fn list_platforms(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlatformQuery>,
) -> Result<Json<Value>, ApiError> {
    let platforms = match (q.url.as_deref(), q.client_id.as_deref()) {
        (None, None) => state.registry.list_all().await?,
        (url, client_id) => {
            let lookup = state
                .registry
                .get_by_url(url.unwrap_or_default(), client_id)
                .await?;
            match lookup {
                Some(UrlLookup::One(p)) => vec![p],
                Some(UrlLookup::Many(ps)) => ps,
                None => Vec::new(),
            }
        }
    };

    Ok(Json(json!({
        "count": platforms.len(),
        "platforms": platforms,
    })))
}

/// `GET /platforms/:kid` — Platform with its public key and status flag.
pub async fn get_platform(
    State(state): State<Arc<AppState>>,
    Path(kid): Path<String>,
) -> Result<Json<PlatformDescription>, ApiError> {
    match state.registry.describe(&kid).await? {
        Some(description) => Ok(Json(description)),
        None => Err(RegistryError::NotFound(kid).into()),
    }
}

// ── Register ──────────────────────────────────────────────────────────────────

/// `POST /platforms` — Register a platform.
///
/// Re-registering an existing (`url`, `clientId`) merges into the existing
/// record, keeps its `kid` and answers `200` instead of `201`.
pub async fn register_platform(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PlatformIdentity>), ApiError> {
    require_registry_key(&state, &headers)?;
    let registration = state.registry.enroll(req).await?;
    let status = if registration.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(registration.platform)))
}

// ── Update ────────────────────────────────────────────────────────────────────

/// `PATCH /platforms/:kid` — Update a platform; absent fields are kept.
pub async fn update_platform(
    State(state): State<Arc<AppState>>,
    Path(kid): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<PlatformPatch>,
) -> Result<Json<PlatformIdentity>, ApiError> {
    require_registry_key(&state, &headers)?;
    let platform = state.registry.update(&kid, patch).await?;
    Ok(Json(platform))
}

/// `PUT /platforms/:kid/active` — Set the platform's status flag.
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Path(kid): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Value>, ApiError> {
    require_registry_key(&state, &headers)?;
    if state.registry.get_by_id(&kid).await?.is_none() {
        return Err(RegistryError::NotFound(kid).into());
    }
    let active = state.registry.set_active(&kid, req.active).await?;
    Ok(Json(json!({ "kid": kid, "active": active })))
}

// ── Delete ────────────────────────────────────────────────────────────────────

/// `DELETE /platforms/:kid` — Delete a platform, its keys and status flag.
pub async fn delete_platform(
    State(state): State<Arc<AppState>>,
    Path(kid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_registry_key(&state, &headers)?;
    let deleted = state.registry.delete_by_id(&kid).await?;
    Ok(Json(json!({ "kid": kid, "deleted": deleted })))
}

/// `DELETE /platforms?url=..&client_id=..` — Delete by (`url`, `clientId`).
pub async fn delete_platform_by_pair(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlatformQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_registry_key(&state, &headers)?;
    let url = q.url.unwrap_or_default();
    let client_id = q.client_id.unwrap_or_default();
    let deleted = state.registry.delete(&url, &client_id).await?;
    Ok(Json(json!({ "url": url, "clientId": client_id, "deleted": deleted })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::REGISTRY_KEY_HEADER;
    use crate::store::MemoryStore;
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::TestServer;

    fn server(key: Option<&str>) -> TestServer {
        let state = AppState::new(Arc::new(MemoryStore::new()), key.map(str::to_string));
        TestServer::new(router(Arc::new(state))).unwrap()
    }

    fn registration(client_id: &str) -> Value {
        json!({
            "url": "https://lms.example",
            "clientId": client_id,
            "name": "Example LMS",
            "authenticationEndpoint": "https://lms.example/auth",
            "accessTokenEndpoint": "https://lms.example/token",
            "authConfig": { "method": "JWK_SET", "key": "https://lms.example/jwks" }
        })
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = health().await;
        assert_eq!(resp.0["status"], "ok");
        assert_eq!(resp.0["service"], "platform-trust");
    }

    #[tokio::test]
    async fn register_get_and_delete() {
        let server = server(None);

        let resp = server.post("/platforms").json(&registration("abc")).await;
        resp.assert_status(StatusCode::CREATED);
        let created: Value = resp.json();
        let kid = created["kid"].as_str().unwrap().to_string();

        let resp = server.get(&format!("/platforms/{kid}")).await;
        resp.assert_status_ok();
        let desc: Value = resp.json();
        assert_eq!(desc["clientId"], "abc");
        assert_eq!(desc["active"], true);
        assert!(desc["publicKey"].is_string());

        let resp = server.delete(&format!("/platforms/{kid}")).await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>()["deleted"], true);

        server
            .get(&format!("/platforms/{kid}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn re_registration_answers_ok() {
        let server = server(None);
        let created: Value = server.post("/platforms").json(&registration("abc")).await.json();

        let mut body = registration("abc");
        body["name"] = json!("Renamed LMS");
        let resp = server.post("/platforms").json(&body).await;
        resp.assert_status_ok();
        let merged: Value = resp.json();
        assert_eq!(merged["kid"], created["kid"]);
        assert_eq!(merged["name"], "Renamed LMS");
    }

    #[tokio::test]
    async fn invalid_auth_config_is_unprocessable() {
        let server = server(None);
        let mut body = registration("abc");
        body["authConfig"]["method"] = json!("rsa_key");

        let resp = server.post("/platforms").json(&body).await;
        resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resp.json::<Value>()["kind"], "invalid_auth_config");
    }

    #[tokio::test]
    async fn relocation_conflict_is_reported() {
        let server = server(None);
        let a: Value = server.post("/platforms").json(&registration("a")).await.json();
        server.post("/platforms").json(&registration("b")).await;

        let resp = server
            .patch(&format!("/platforms/{}", a["kid"].as_str().unwrap()))
            .json(&json!({ "clientId": "b" }))
            .await;
        resp.assert_status(StatusCode::CONFLICT);
        assert_eq!(resp.json::<Value>()["kind"], "duplicate_url_client_id");
    }

    #[tokio::test]
    async fn list_by_url_and_pair() {
        let server = server(None);
        server.post("/platforms").json(&registration("a")).await;
        server.post("/platforms").json(&registration("b")).await;

        let all: Value = server.get("/platforms").await.json();
        assert_eq!(all["count"], 2);

        let one: Value = server
            .get("/platforms")
            .add_query_param("url", "https://lms.example")
            .add_query_param("client_id", "b")
            .await
            .json();
        assert_eq!(one["count"], 1);
        assert_eq!(one["platforms"][0]["clientId"], "b");

        let resp = server
            .delete("/platforms")
            .add_query_param("url", "https://lms.example")
            .add_query_param("client_id", "a")
            .await;
        assert_eq!(resp.json::<Value>()["deleted"], true);
        assert_eq!(server.get("/platforms").await.json::<Value>()["count"], 1);
    }

    #[tokio::test]
    async fn set_active_round_trip() {
        let server = server(None);
        let created: Value = server.post("/platforms").json(&registration("abc")).await.json();
        let kid = created["kid"].as_str().unwrap();

        server
            .put(&format!("/platforms/{kid}/active"))
            .json(&json!({ "active": false }))
            .await
            .assert_status_ok();
        let desc: Value = server.get(&format!("/platforms/{kid}")).await.json();
        assert_eq!(desc["active"], false);

        server
            .put("/platforms/unknown/active")
            .json(&json!({ "active": false }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mutations_require_registry_key_when_configured() {
        let server = server(Some("s3cret"));

        let resp = server.post("/platforms").json(&registration("abc")).await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(resp.json::<Value>()["kind"], "unauthorized");

        server
            .post("/platforms")
            .add_header(
                HeaderName::from_static(REGISTRY_KEY_HEADER),
                HeaderValue::from_static("s3cret"),
            )
            .json(&registration("abc"))
            .await
            .assert_status(StatusCode::CREATED);

        // Reads stay open.
        server.get("/platforms").await.assert_status_ok();
    }
}
