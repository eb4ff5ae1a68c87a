// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Platform lifecycle: registration, lookup, update and deletion.
//!
//! A platform spans four collections (`platform`, `publickey`, `privatekey`,
//! `platformStatus`) that the store cannot write atomically. Registration
//! and relocating updates therefore run as a sequence of single-record
//! writes with a [`Compensation`] log; when a step fails, the steps already
//! applied are reversed before the error is returned.
//!
//! ## Concurrency
//!
//! Operations on different platforms never coordinate. Operations on the
//! same platform are not serialised here; the store's per-record writes are
//! the only consistency boundary. Two first-time registrations of the same
//! (`url`, `clientId`) can both pass the existence check; the store's
//! uniqueness constraint lets exactly one identity write succeed, and the
//! loser removes its own keypair and merges into the winner.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth_config;
use crate::credentials::{by_kid, CredentialStore, KeyGenerator};
use crate::error::{RegistryError, Result};
use crate::models::{
    PlatformDescription, PlatformIdentity, PlatformPatch, RegisterRequest, UrlLookup,
};
use crate::saga::{Compensation, Undo};
use crate::status::StatusStore;
use crate::store::{Collection, DocumentStore, Filter, StoreError};

/// Present, non-empty string argument, or `MissingArgument(name)`.
fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(RegistryError::MissingArgument(name))
}

/// Empty strings in a patch count as "not supplied".
fn supplied(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn duplicate(identity: &PlatformIdentity) -> RegistryError {
    RegistryError::DuplicateUrlClientId {
        url: identity.url.clone(),
        client_id: identity.client_id.clone(),
    }
}

fn by_pair(url: &str, client_id: &str) -> Filter {
    Filter::new().eq("url", url).eq("clientId", client_id)
}

fn decode(doc: Value) -> Result<PlatformIdentity> {
    serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()).into())
}

fn encode(identity: &PlatformIdentity) -> Result<Value> {
    serde_json::to_value(identity).map_err(|e| StoreError::Serialization(e.to_string()).into())
}

/// Outcome of [`PlatformRegistry::enroll`].
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub platform: PlatformIdentity,
    /// `false` when the request merged into an existing platform.
    pub created: bool,
}

impl Registration {
    fn merged(platform: PlatformIdentity) -> Self {
        Self {
            platform,
            created: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    store: Arc<dyn DocumentStore>,
    credentials: CredentialStore,
    status: StatusStore,
}

impl PlatformRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, generator: Arc<dyn KeyGenerator>) -> Self {
        Self {
            credentials: CredentialStore::new(store.clone(), generator),
            status: StatusStore::new(store.clone()),
            store,
        }
    }

    // ── Register ──────────────────────────────────────────────────────────────

    /// Register a platform, or merge into it if (`url`, `clientId`) is
    /// already registered.
    pub async fn register(&self, req: RegisterRequest) -> Result<PlatformIdentity> {
        self.enroll(req).await.map(|r| r.platform)
    }

    /// [`register`](Self::register), also reporting whether a new platform
    /// was created or the request merged into an existing one.
    ///
    /// A new registration generates the `kid` and keypair and then writes the
    /// platform record. If that write fails, the keypair is removed again and
    /// the platform stays unregistered.
    pub async fn enroll(&self, req: RegisterRequest) -> Result<Registration> {
        let url = required(req.url.as_deref(), "url")?.to_string();
        let client_id = required(req.client_id.as_deref(), "clientId")?.to_string();

        if let Some(existing) = self.find(&url, &client_id).await? {
            info!(kid = %existing.kid, url = %url, client_id = %client_id, "Platform already registered, merging");
            return self.apply_patch(existing, req.into_patch()).await.map(Registration::merged);
        }

        let name = required(req.name.as_deref(), "name")?.to_string();
        let authentication_endpoint =
            required(req.authentication_endpoint.as_deref(), "authenticationEndpoint")?.to_string();
        let access_token_endpoint =
            required(req.access_token_endpoint.as_deref(), "accessTokenEndpoint")?.to_string();
        let auth_input = req
            .auth_config
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or(RegistryError::MissingArgument("authConfig"))?;
        let auth_config = auth_config::validate(&auth_input, None)?;

        let keys = self.credentials.issue(&url, &client_id).await?;
        let kid = keys.kid;

        let mut saga = Compensation::new(&*self.store, "register");
        saga.push(Undo::Delete {
            collection: Collection::PrivateKey,
            filter: by_kid(&kid),
        });
        saga.push(Undo::Delete {
            collection: Collection::PublicKey,
            filter: by_kid(&kid),
        });

        let identity = PlatformIdentity {
            kid: kid.clone(),
            name,
            url: url.clone(),
            client_id: client_id.clone(),
            authentication_endpoint,
            access_token_endpoint,
            auth_config,
        };
        let doc = match encode(&identity) {
            Ok(doc) => doc,
            Err(e) => return saga.fail(e).await,
        };

        saga.push(Undo::Delete {
            collection: Collection::Platform,
            filter: by_kid(&kid),
        });
        match self.store.replace(Collection::Platform, &by_kid(&kid), doc, true).await {
            Ok(_) => {
                info!(kid = %kid, url = %url, client_id = %client_id, "Registered new platform");
                Ok(Registration {
                    platform: identity,
                    created: true,
                })
            }
            Err(StoreError::Conflict { .. }) => {
                // Another registration of this pair won the race.
                saga.unwind().await;
                warn!(url = %url, client_id = %client_id, "Concurrent registration detected, merging into winner");
                match self.find(&url, &client_id).await? {
                    Some(winner) => self.apply_patch(winner, req.into_patch()).await.map(Registration::merged),
                    None => Err(RegistryError::DuplicateUrlClientId { url, client_id }),
                }
            }
            Err(e) => saga.fail(e).await,
        }
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// The platform registered for (`url`, `client_id`), if any.
    pub async fn find(&self, url: &str, client_id: &str) -> Result<Option<PlatformIdentity>> {
        let docs = self.store.get(Collection::Platform, &by_pair(url, client_id)).await?;
        docs.into_iter().next().map(decode).transpose()
    }

    /// With `client_id`: the single matching platform. Without: every
    /// platform sharing `url`. `None` when nothing matches.
    pub async fn get_by_url(&self, url: &str, client_id: Option<&str>) -> Result<Option<UrlLookup>> {
        let url = required(Some(url), "url")?;

        match client_id.filter(|c| !c.is_empty()) {
            Some(client_id) => Ok(self.find(url, client_id).await?.map(UrlLookup::One)),
            None => {
                let docs = self.store.get(Collection::Platform, &Filter::new().eq("url", url)).await?;
                if docs.is_empty() {
                    return Ok(None);
                }
                let platforms = docs.into_iter().map(decode).collect::<Result<Vec<_>>>()?;
                Ok(Some(UrlLookup::Many(platforms)))
            }
        }
    }

    pub async fn get_by_id(&self, kid: &str) -> Result<Option<PlatformIdentity>> {
        let kid = required(Some(kid), "kid")?;
        let docs = self.store.get(Collection::Platform, &by_kid(kid)).await?;
        docs.into_iter().next().map(decode).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<PlatformIdentity>> {
        let docs = self.store.get(Collection::Platform, &Filter::new()).await?;
        docs.into_iter().map(decode).collect()
    }

    /// Identity fields together with the public key and status flag.
    pub async fn describe(&self, kid: &str) -> Result<Option<PlatformDescription>> {
        let Some(identity) = self.get_by_id(kid).await? else {
            return Ok(None);
        };
        let public_key = self.credentials.public_key(kid).await?;
        let active = self.status.is_active(kid).await?;
        Ok(Some(PlatformDescription {
            identity,
            public_key,
            active,
        }))
    }

    pub async fn public_key(&self, kid: &str) -> Result<Option<String>> {
        let kid = required(Some(kid), "kid")?;
        self.credentials.public_key(kid).await
    }

    // ── Update ────────────────────────────────────────────────────────────────

    /// Apply `patch` to the platform `kid`.
    ///
    /// Changing `url` or `clientId` relocates the platform: the new pair must
    /// be free, the key records are re-tagged first, and if the platform
    /// write then fails the key records are moved back.
    pub async fn update(&self, kid: &str, patch: PlatformPatch) -> Result<PlatformIdentity> {
        let kid = required(Some(kid), "kid")?;
        if patch.is_empty() {
            return Err(RegistryError::MissingArgument("patch"));
        }
        let current = self
            .get_by_id(kid)
            .await?
            .ok_or_else(|| RegistryError::NotFound(kid.to_string()))?;
        self.apply_patch(current, patch).await
    }

    async fn apply_patch(&self, current: PlatformIdentity, patch: PlatformPatch) -> Result<PlatformIdentity> {
        if patch.is_empty() {
            return Ok(current);
        }

        let auth_config = match patch.auth_config.as_ref().filter(|c| !c.is_empty()) {
            Some(input) => auth_config::validate(input, Some(&current.auth_config))?,
            None => current.auth_config.clone(),
        };

        let updated = PlatformIdentity {
            kid: current.kid.clone(),
            name: supplied(patch.name).unwrap_or_else(|| current.name.clone()),
            url: supplied(patch.url).unwrap_or_else(|| current.url.clone()),
            client_id: supplied(patch.client_id).unwrap_or_else(|| current.client_id.clone()),
            authentication_endpoint: supplied(patch.authentication_endpoint)
                .unwrap_or_else(|| current.authentication_endpoint.clone()),
            access_token_endpoint: supplied(patch.access_token_endpoint)
                .unwrap_or_else(|| current.access_token_endpoint.clone()),
            auth_config,
        };

        let relocating = updated.url != current.url || updated.client_id != current.client_id;
        let mut saga = Compensation::new(&*self.store, "update");

        if relocating {
            if let Some(other) = self.find(&updated.url, &updated.client_id).await? {
                if other.kid != current.kid {
                    return Err(duplicate(&updated));
                }
            }

            let back = json!({ "url": current.url, "clientId": current.client_id });
            for collection in [Collection::PublicKey, Collection::PrivateKey] {
                saga.push(Undo::Modify {
                    collection,
                    filter: by_kid(&current.kid),
                    patch: back.clone(),
                });
            }
            if let Err(e) = self
                .credentials
                .relocate(&current.kid, &updated.url, &updated.client_id)
                .await
            {
                return saga.fail(e).await;
            }
        }

        let doc = match encode(&updated) {
            Ok(doc) => doc,
            Err(e) => return saga.fail(e).await,
        };
        match self
            .store
            .replace(Collection::Platform, &by_kid(&current.kid), doc, false)
            .await
        {
            Ok(0) => {
                warn!(kid = %current.kid, "Platform disappeared during update");
                saga.fail(RegistryError::NotFound(current.kid.clone())).await
            }
            Ok(_) => {
                if relocating {
                    info!(
                        kid = %updated.kid,
                        from_url = %current.url,
                        from_client_id = %current.client_id,
                        url = %updated.url,
                        client_id = %updated.client_id,
                        "Relocated platform"
                    );
                } else {
                    info!(kid = %updated.kid, "Updated platform");
                }
                Ok(updated)
            }
            Err(StoreError::Conflict { .. }) => saga.fail(duplicate(&updated)).await,
            Err(e) => saga.fail(e).await,
        }
    }

    // ── Delete ────────────────────────────────────────────────────────────────

    /// Delete the platform registered for (`url`, `client_id`). Returns
    /// `false` if there was none.
    pub async fn delete(&self, url: &str, client_id: &str) -> Result<bool> {
        let url = required(Some(url), "url")?;
        let client_id = required(Some(client_id), "clientId")?;
        match self.find(url, client_id).await? {
            Some(identity) => self.remove(&identity.kid).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Delete the platform `kid`. Returns `false` if there was none.
    pub async fn delete_by_id(&self, kid: &str) -> Result<bool> {
        match self.get_by_id(kid).await? {
            Some(identity) => self.remove(&identity.kid).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Remove every record of `kid`. Each removal is attempted even if an
    /// earlier one failed; the first failure is returned.
    async fn remove(&self, kid: &str) -> Result<()> {
        let mut first_error = None;
        for collection in [
            Collection::Platform,
            Collection::PlatformStatus,
            Collection::PublicKey,
            Collection::PrivateKey,
        ] {
            if let Err(e) = self.store.delete(collection, &by_kid(kid)).await {
                error!(kid = %kid, collection = %collection, error = %e, "Failed to delete platform record");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => {
                info!(kid = %kid, "Deleted platform");
                Ok(())
            }
        }
    }

    // ── Status ────────────────────────────────────────────────────────────────

    pub async fn set_active(&self, kid: &str, active: bool) -> Result<bool> {
        let kid = required(Some(kid), "kid")?;
        self.status.set_active(kid, active).await
    }

    pub async fn is_active(&self, kid: &str) -> Result<bool> {
        let kid = required(Some(kid), "kid")?;
        self.status.is_active(kid).await
    }
}
