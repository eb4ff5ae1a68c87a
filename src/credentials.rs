// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Keypairs bound to registered platforms.
//!
//! Each platform owns one keypair, stored as two documents (`publickey`,
//! `privatekey`) that share the platform's `kid` and carry its (`url`,
//! `clientId`) for lookup. Key material is generated once at registration
//! and only re-tagged, never regenerated, when the platform moves.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde_json::json;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{KeyPair, KeyRecord};
use crate::store::{Collection, DocumentStore, Filter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct KeyGenError(pub String);

/// Fresh key material. `kid` is authoritative and becomes the platform's id.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    pub kid: String,
    pub public_key: String,
    pub private_key: String,
}

/// Source of new keypairs.
pub trait KeyGenerator: Send + Sync + Debug {
    fn generate(&self) -> Result<GeneratedKeyPair, KeyGenError>;
}

/// Ed25519 keys from the OS RNG, base64url-encoded without padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519KeyGenerator;

impl KeyGenerator for Ed25519KeyGenerator {
    fn generate(&self) -> Result<GeneratedKeyPair, KeyGenError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        Ok(GeneratedKeyPair {
            kid: Uuid::new_v4().simple().to_string(),
            public_key: URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes()),
            private_key: URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
        })
    }
}

pub(crate) fn by_kid(kid: &str) -> Filter {
    Filter::new().eq("kid", kid)
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn KeyGenerator>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn DocumentStore>, generator: Arc<dyn KeyGenerator>) -> Self {
        Self { store, generator }
    }

    /// Generate a keypair and persist both halves tagged with
    /// (`kid`, `url`, `client_id`).
    ///
    /// If the private half cannot be written, the public half is removed
    /// again before the error is returned; no half-stored pair is left.
    pub async fn issue(&self, url: &str, client_id: &str) -> Result<KeyPair> {
        let generated = self.generator.generate()?;
        let kid = generated.kid;

        let record = |key: &str| KeyRecord {
            kid: kid.clone(),
            url: url.to_string(),
            client_id: client_id.to_string(),
            key: key.to_string(),
        };

        self.put(Collection::PublicKey, &record(&generated.public_key)).await?;

        if let Err(e) = self.put(Collection::PrivateKey, &record(&generated.private_key)).await {
            for collection in [Collection::PrivateKey, Collection::PublicKey] {
                if let Err(undo) = self.store.delete(collection, &by_kid(&kid)).await {
                    error!(kid = %kid, collection = %collection, error = %undo, "failed to remove partial keypair");
                }
            }
            return Err(e);
        }

        info!(kid = %kid, url = %url, client_id = %client_id, "Issued platform keypair");
        Ok(KeyPair {
            kid,
            public_key: generated.public_key,
            private_key: generated.private_key,
        })
    }

    /// Re-tag both key records of `kid` with a new (`url`, `client_id`).
    /// Key material is untouched.
    pub async fn relocate(&self, kid: &str, url: &str, client_id: &str) -> Result<()> {
        let patch = json!({ "url": url, "clientId": client_id });
        for collection in [Collection::PublicKey, Collection::PrivateKey] {
            self.store.modify(collection, &by_kid(kid), patch.clone()).await?;
        }
        info!(kid = %kid, url = %url, client_id = %client_id, "Relocated platform keypair");
        Ok(())
    }

    /// Delete both key records of `kid`. Deleting an absent pair is not an
    /// error.
    pub async fn revoke(&self, kid: &str) -> Result<()> {
        for collection in [Collection::PublicKey, Collection::PrivateKey] {
            self.store.delete(collection, &by_kid(kid)).await?;
        }
        info!(kid = %kid, "Revoked platform keypair");
        Ok(())
    }

    pub async fn public_key(&self, kid: &str) -> Result<Option<String>> {
        self.key(Collection::PublicKey, kid).await
    }

    /// Private half, for issuers that sign client assertions.
    pub async fn private_key(&self, kid: &str) -> Result<Option<String>> {
        self.key(Collection::PrivateKey, kid).await
    }

    async fn key(&self, collection: Collection, kid: &str) -> Result<Option<String>> {
        let docs = self.store.get(collection, &by_kid(kid)).await?;
        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };
        let record: KeyRecord = serde_json::from_value(doc)
            .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))?;
        Ok(Some(record.key))
    }

    async fn put(&self, collection: Collection, record: &KeyRecord) -> Result<()> {
        let doc = serde_json::to_value(record)
            .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))?;
        self.store.replace(collection, &by_kid(&record.kid), doc, true).await?;
        Ok(())
    }
}
