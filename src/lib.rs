// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Trust relationships between a tool and external platforms.
//!
//! - [`registry::PlatformRegistry`] registers, updates and deletes platforms
//!   together with their keypair and status flag.
//! - [`auth_config`] validates how a platform's messages are verified.
//! - [`token_cache::TokenCache`] caches access tokens per platform and scope
//!   and renews them through a [`token_cache::TokenIssuer`].
//! - [`store`] is the document persistence the components share.

pub mod auth;
pub mod auth_config;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
mod saga;
pub mod status;
pub mod store;
pub mod token_cache;

#[cfg(test)]
mod test_support;

pub use db::AppState;
pub use error::{ApiError, ErrorKind, RegistryError};
pub use registry::PlatformRegistry;
pub use token_cache::{TokenCache, TokenIssuer};
