// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Validation of a platform's authentication configuration.
//!
//! A platform declares how the tool should verify messages it sends:
//!
//! | method    | key                                  |
//! |-----------|--------------------------------------|
//! | `RSA_KEY` | raw RSA public key                   |
//! | `JWK_KEY` | a single JWK                         |
//! | `JWK_SET` | URL of the platform's JWK set        |
//!
//! Method names are matched exactly; `rsa_key` is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    RsaKey,
    JwkKey,
    JwkSet,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 3] = [AuthMethod::RsaKey, AuthMethod::JwkKey, AuthMethod::JwkSet];

    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::RsaKey => "RSA_KEY",
            AuthMethod::JwkKey => "JWK_KEY",
            AuthMethod::JwkSet => "JWK_SET",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = AuthConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AuthConfigError::InvalidMethod(s.to_string()))
    }
}

/// Validated authentication configuration stored on a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    pub key: String,
}

/// Unvalidated authentication configuration as supplied by callers.
/// Either half may be omitted when patching an existing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfigInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl AuthConfigInput {
    pub fn new(method: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            key: Some(key.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.key.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthConfigError {
    #[error("invalid authentication method '{0}': expected one of RSA_KEY, JWK_KEY, JWK_SET")]
    InvalidMethod(String),

    #[error("authentication method is required")]
    MissingMethod,

    #[error("authentication key is required for method {0}")]
    MissingKey(AuthMethod),
}

/// Validate `input`, filling any omitted half from `existing`.
///
/// Pure: no I/O and no side effects.
pub fn validate(input: &AuthConfigInput, existing: Option<&AuthConfig>) -> Result<AuthConfig, AuthConfigError> {
    let method = match input.method.as_deref() {
        Some(raw) => raw.parse()?,
        None => existing.map(|c| c.method).ok_or(AuthConfigError::MissingMethod)?,
    };

    let key = match input.key.as_deref() {
        Some(key) => key,
        None => existing.map(|c| c.key.as_str()).unwrap_or_default(),
    };

    if key.trim().is_empty() {
        return Err(AuthConfigError::MissingKey(method));
    }

    Ok(AuthConfig {
        method,
        key: key.to_string(),
    })
}
