// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Error types for the platform registry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    auth_config::AuthConfigError, credentials::KeyGenError, store::StoreError,
    token_cache::IssuerError,
};

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingArgument,
    InvalidAuthConfig,
    DuplicateUrlClientId,
    NotFound,
    CollaboratorFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingArgument => "missing_argument",
            ErrorKind::InvalidAuthConfig => "invalid_auth_config",
            ErrorKind::DuplicateUrlClientId => "duplicate_url_client_id",
            ErrorKind::NotFound => "not_found",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
        }
    }
}

/// Errors returned by registry, credential, status and token operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid authentication config: {0}")]
    InvalidAuthConfig(#[from] AuthConfigError),

    #[error("Platform already registered for url={url} client_id={client_id}")]
    DuplicateUrlClientId { url: String, client_id: String },

    #[error("Platform not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Key generation failed: {0}")]
    KeyGeneration(#[from] KeyGenError),

    #[error("Token issuance failed: {0}")]
    Issuer(#[from] IssuerError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::MissingArgument(_) => ErrorKind::MissingArgument,
            RegistryError::InvalidAuthConfig(_) => ErrorKind::InvalidAuthConfig,
            RegistryError::DuplicateUrlClientId { .. } => ErrorKind::DuplicateUrlClientId,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Store(_) | RegistryError::KeyGeneration(_) | RegistryError::Issuer(_) => {
                ErrorKind::CollaboratorFailure
            }
        }
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::MissingArgument => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidAuthConfig => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::DuplicateUrlClientId => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::CollaboratorFailure => StatusCode::BAD_GATEWAY,
        };

        if kind == ErrorKind::CollaboratorFailure {
            tracing::error!(error = %self, "request failed in a collaborator");
        }

        error_body(status, self.to_string(), kind.as_str())
    }
}

/// Errors returned by the HTTP handlers: registry errors plus the admin-key
/// check, which only exists at the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or invalid registry key")]
    Unauthorized,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Registry(err) => err.into_response(),
            unauthorized => error_body(StatusCode::UNAUTHORIZED, unauthorized.to_string(), "unauthorized"),
        }
    }
}

fn error_body(status: StatusCode, message: String, kind: &str) -> Response {
    (status, Json(json!({ "error": message, "kind": kind }))).into_response()
}
