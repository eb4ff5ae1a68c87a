// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Admin-key check for mutating routes.
//!
//! When the registry runs with `REGISTRY_KEY`, every request that changes
//! state must carry it in the `X-Registry-Key` header:
//!
//! ```text
//! X-Registry-Key: <REGISTRY_KEY>
//! ```

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::{db::AppState, error::ApiError};

pub const REGISTRY_KEY_HEADER: &str = "x-registry-key";

/// Reject the request unless it carries the configured registry key.
/// Always passes when no key is configured.
pub fn require_registry_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.registry_key.as_deref() else {
        return Ok(());
    };

    let supplied = headers
        .get(REGISTRY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("Rejected request with missing or wrong registry key");
        Err(ApiError::Unauthorized)
    }
}
