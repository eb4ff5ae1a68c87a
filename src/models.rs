// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Domain models for the platform registry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth_config::{AuthConfig, AuthConfigInput};

/// A registered platform: the trust record shared with an external issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformIdentity {
    /// Key identifier. Assigned once at registration, never changes.
    pub kid: String,
    /// Human-readable label
    pub name: String,
    /// Platform base URL (issuer)
    pub url: String,
    /// Client identifier issued to this tool by the platform
    pub client_id: String,
    pub authentication_endpoint: String,
    pub access_token_endpoint: String,
    pub auth_config: AuthConfig,
}

/// Keypair bound to a platform `kid`. Both halves are base64url-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub kid: String,
    pub public_key: String,
    pub private_key: String,
}

/// One half of a [`KeyPair`] as persisted in `publickey` / `privatekey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub kid: String,
    pub url: String,
    pub client_id: String,
    pub key: String,
}

/// Active/inactive flag, stored separately from the platform record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlag {
    pub active: bool,
}

/// Access token returned by the platform's token endpoint.
///
/// Only `token_type` and `expires_in` are interpreted; everything else the
/// issuer returns is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token_type: String,
    /// Lifetime in seconds, counted from issuance.
    pub expires_in: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessToken {
    /// `token_type` with its first character upper-cased (`bearer` → `Bearer`).
    pub fn normalized(mut self) -> Self {
        self.token_type = capitalize_first(&self.token_type);
        self
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A token cached under (`url`, `clientId`, `scopes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedToken {
    pub url: String,
    pub client_id: String,
    pub scopes: String,
    pub token: AccessToken,
    /// Issue time, Unix milliseconds.
    pub created_at: i64,
}

impl CachedToken {
    /// A token is fresh while the seconds elapsed since issue do not exceed
    /// `expires_in`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let elapsed_ms = now_ms.saturating_sub(self.created_at);
        let lifetime_ms = i64::try_from(self.token.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        elapsed_ms <= lifetime_ms
    }
}

/// Request body for registering a platform.
///
/// `url` and `clientId` are always required. The remaining fields are
/// required only when the pair has not been registered before; otherwise
/// whatever is supplied is merged into the existing record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub authentication_endpoint: Option<String>,
    pub access_token_endpoint: Option<String>,
    pub auth_config: Option<AuthConfigInput>,
}

impl RegisterRequest {
    /// The non-identifying fields as a patch for an existing platform.
    pub fn into_patch(self) -> PlatformPatch {
        PlatformPatch {
            url: None,
            client_id: None,
            name: self.name,
            authentication_endpoint: self.authentication_endpoint,
            access_token_endpoint: self.access_token_endpoint,
            auth_config: self.auth_config,
        }
    }
}

/// Partial update of a platform. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPatch {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub authentication_endpoint: Option<String>,
    pub access_token_endpoint: Option<String>,
    pub auth_config: Option<AuthConfigInput>,
}

impl PlatformPatch {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.client_id.is_none()
            && self.name.is_none()
            && self.authentication_endpoint.is_none()
            && self.access_token_endpoint.is_none()
            && self.auth_config.as_ref().map_or(true, AuthConfigInput::is_empty)
    }
}

/// Full projection of a platform: identity fields plus its public key and
/// status flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDescription {
    #[serde(flatten)]
    pub identity: PlatformIdentity,
    pub public_key: Option<String>,
    pub active: bool,
}

/// Either a single platform or every platform sharing a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UrlLookup {
    One(PlatformIdentity),
    Many(Vec<PlatformIdentity>),
}
