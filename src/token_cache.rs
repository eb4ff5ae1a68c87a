// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Access-token cache keyed by (`url`, `clientId`, `scopes`).
//!
//! Tokens are never evicted. Freshness is checked on every read and a stale
//! or missing entry is replaced by a new token from the [`TokenIssuer`].
//! Concurrent misses for the same key may each call the issuer; the last
//! write wins and every returned token is valid.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::{AccessToken, CachedToken, PlatformIdentity};
use crate::store::{Collection, DocumentStore, Filter, StoreError};

/// Failure reported by the token issuer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct IssuerError {
    message: String,
}

impl IssuerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Exchanges the tool's credentials for an access token at the platform's
/// token endpoint. Retries, if any, are the issuer's concern.
#[async_trait]
pub trait TokenIssuer: Send + Sync + Debug {
    async fn issue(&self, scopes: &str, identity: &PlatformIdentity) -> Result<AccessToken, IssuerError>;
}

fn cache_key(identity: &PlatformIdentity, scopes: &str) -> Filter {
    Filter::new()
        .eq("url", identity.url.as_str())
        .eq("clientId", identity.client_id.as_str())
        .eq("scopes", scopes)
}

#[derive(Debug, Clone)]
pub struct TokenCache {
    store: Arc<dyn DocumentStore>,
    issuer: Arc<dyn TokenIssuer>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn DocumentStore>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    /// A token for `identity` covering `scopes`, from cache if still fresh.
    ///
    /// The returned `token_type` always starts with an upper-case letter.
    pub async fn get_access_token(&self, identity: &PlatformIdentity, scopes: &str) -> Result<AccessToken> {
        let key = cache_key(identity, scopes);

        if let Some(cached) = self.cached(&key).await? {
            if cached.is_fresh(Utc::now().timestamp_millis()) {
                debug!(kid = %identity.kid, scopes = %scopes, "Access token cache hit");
                return Ok(cached.token.normalized());
            }
            debug!(kid = %identity.kid, scopes = %scopes, "Cached access token expired");
        }

        let token = self.issuer.issue(scopes, identity).await?;
        info!(kid = %identity.kid, scopes = %scopes, expires_in = token.expires_in, "Issued access token");

        let entry = CachedToken {
            url: identity.url.clone(),
            client_id: identity.client_id.clone(),
            scopes: scopes.to_string(),
            token,
            created_at: Utc::now().timestamp_millis(),
        };
        let doc = serde_json::to_value(&entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Err(e) = self.store.replace(Collection::AccessToken, &key, doc, true).await {
            error!(kid = %identity.kid, error = %e, "Failed to cache access token");
            return Err(e.into());
        }

        Ok(entry.token.normalized())
    }

    /// The cached entry for `key`. Unreadable entries count as missing.
    async fn cached(&self, key: &Filter) -> Result<Option<CachedToken>> {
        let docs = self.store.get(Collection::AccessToken, key).await?;
        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };
        match serde_json::from_value(doc) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached access token");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_config::{AuthConfig, AuthMethod};
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use crate::test_support::{CountingIssuer, DownIssuer, FaultyStore, Op};
    use serde_json::{json, Map};

    const SCOPES: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";

    fn identity() -> PlatformIdentity {
        PlatformIdentity {
            kid: "k1".into(),
            name: "LMS".into(),
            url: "https://lms.example".into(),
            client_id: "abc".into(),
            authentication_endpoint: "https://lms.example/auth".into(),
            access_token_endpoint: "https://lms.example/token".into(),
            auth_config: AuthConfig {
                method: AuthMethod::JwkSet,
                key: "https://lms.example/jwks".into(),
            },
        }
    }

    async fn seed(store: &dyn DocumentStore, token_type: &str, expires_in: u64, age_secs: i64) {
        let mut extra = Map::new();
        extra.insert("access_token".into(), json!("seeded"));
        let entry = CachedToken {
            url: "https://lms.example".into(),
            client_id: "abc".into(),
            scopes: SCOPES.into(),
            token: AccessToken {
                token_type: token_type.into(),
                expires_in,
                extra,
            },
            created_at: Utc::now().timestamp_millis() - age_secs * 1000,
        };
        store
            .replace(
                Collection::AccessToken,
                &cache_key(&identity(), SCOPES),
                serde_json::to_value(entry).unwrap(),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn miss_issues_and_caches() {
        let store = Arc::new(MemoryStore::new());
        let issuer = Arc::new(CountingIssuer::new("bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        let first = cache.get_access_token(&identity(), SCOPES).await.unwrap();
        let second = cache.get_access_token(&identity(), SCOPES).await.unwrap();

        assert_eq!(issuer.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.token_type, "Bearer");
        assert_eq!(first.extra["access_token"], "k1-1");
        assert_eq!(store.len(Collection::AccessToken), 1);
    }

    #[tokio::test]
    async fn fresh_token_returned_unchanged() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, "bearer", 3600, 10).await;
        let issuer = Arc::new(CountingIssuer::new("bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        let token = cache.get_access_token(&identity(), SCOPES).await.unwrap();

        assert_eq!(issuer.calls(), 0);
        assert_eq!(token.extra["access_token"], "seeded");
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn expired_token_is_regenerated() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, "bearer", 3600, 3601).await;
        let issuer = Arc::new(CountingIssuer::new("bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        let token = cache.get_access_token(&identity(), SCOPES).await.unwrap();

        assert_eq!(issuer.calls(), 1);
        assert_eq!(token.extra["access_token"], "k1-1");
        assert_eq!(store.len(Collection::AccessToken), 1);
    }

    #[tokio::test]
    async fn scopes_are_matched_exactly() {
        let store = Arc::new(MemoryStore::new());
        let issuer = Arc::new(CountingIssuer::new("Bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        cache.get_access_token(&identity(), "a b").await.unwrap();
        cache.get_access_token(&identity(), "b a").await.unwrap();
        cache.get_access_token(&identity(), "a b").await.unwrap();

        assert_eq!(issuer.calls(), 2);
        assert_eq!(store.len(Collection::AccessToken), 2);
    }

    #[tokio::test]
    async fn unreadable_entry_is_treated_as_missing() {
        let store = Arc::new(MemoryStore::new());
        store
            .replace(
                Collection::AccessToken,
                &cache_key(&identity(), SCOPES),
                json!({ "url": "https://lms.example", "clientId": "abc", "scopes": SCOPES, "token": "garbage" }),
                true,
            )
            .await
            .unwrap();
        let issuer = Arc::new(CountingIssuer::new("bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        cache.get_access_token(&identity(), SCOPES).await.unwrap();
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn issuer_failure_propagates() {
        let cache = TokenCache::new(Arc::new(MemoryStore::new()), Arc::new(DownIssuer));
        let err = cache.get_access_token(&identity(), SCOPES).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    }

    #[tokio::test]
    async fn cache_write_failure_is_reported() {
        let store = Arc::new(FaultyStore::new());
        store.fail_on(Op::Replace, Collection::AccessToken);
        let issuer = Arc::new(CountingIssuer::new("bearer", 3600));
        let cache = TokenCache::new(store.clone(), issuer.clone());

        let err = cache.get_access_token(&identity(), SCOPES).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(issuer.calls(), 1);
        assert_eq!(store.len(Collection::AccessToken), 0);

        store.heal();
        cache.get_access_token(&identity(), SCOPES).await.unwrap();
        cache.get_access_token(&identity(), SCOPES).await.unwrap();
        assert_eq!(issuer.calls(), 2);
    }
}
