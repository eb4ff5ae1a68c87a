// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Per-platform active/inactive flag.
//!
//! A platform without a status document is **active**. That default lives
//! here, in [`StatusStore::is_active`], and nowhere else.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::credentials::by_kid;
use crate::error::Result;
use crate::models::StatusFlag;
use crate::store::{Collection, DocumentStore, StoreError};

#[derive(Debug, Clone)]
pub struct StatusStore {
    store: Arc<dyn DocumentStore>,
}

impl StatusStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn is_active(&self, kid: &str) -> Result<bool> {
        let docs = self.store.get(Collection::PlatformStatus, &by_kid(kid)).await?;
        match docs.into_iter().next() {
            Some(doc) => {
                let flag: StatusFlag =
                    serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(flag.active)
            }
            None => Ok(true),
        }
    }

    /// Overwrite the flag for `kid`.
    pub async fn set_active(&self, kid: &str, active: bool) -> Result<bool> {
        self.store
            .replace(
                Collection::PlatformStatus,
                &by_kid(kid),
                json!({ "kid": kid, "active": active }),
                true,
            )
            .await?;
        info!(kid = %kid, active, "Platform status changed");
        Ok(active)
    }

    pub async fn clear(&self, kid: &str) -> Result<()> {
        self.store.delete(Collection::PlatformStatus, &by_kid(kid)).await?;
        Ok(())
    }
}
