// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Document persistence for the platform registry.
//!
//! The registry only ever needs single-record operations: read by filter,
//! replace (optionally upserting), merge-modify and delete. There is no
//! multi-record transaction; callers that touch several collections keep
//! their own compensation log (see [`crate::saga`]).
//!
//! Every backend MUST reject a write that would leave two `platform`
//! documents sharing the same (`url`, `clientId`) with
//! [`StoreError::Conflict`]. Registration relies on this to settle races
//! between concurrent first-time registrations of the same pair.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::{self, Debug};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Uniqueness constraint violated in {collection}: {detail}")]
    Conflict {
        collection: Collection,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// The document collections the registry writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Platform,
    PublicKey,
    PrivateKey,
    PlatformStatus,
    AccessToken,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Platform => "platform",
            Collection::PublicKey => "publickey",
            Collection::PrivateKey => "privatekey",
            Collection::PlatformStatus => "platformStatus",
            Collection::AccessToken => "accesstoken",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunctive field-equality predicate over top-level document fields.
///
/// An empty filter matches every document in the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Vec<(&'static str, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((field, value.into()));
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| doc.get(*field) == Some(expected))
    }

    /// The filter as a JSON object, suitable for containment queries.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

/// Persistence collaborator used by every registry component.
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// All documents matching `filter`. An empty vector means "not found".
    async fn get(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Replace the first document matching `filter` with `record`.
    ///
    /// When nothing matches, `record` is inserted if `upsert` is set and the
    /// call is a no-op otherwise. Returns the number of documents written,
    /// so `0` means nothing matched and nothing was inserted.
    async fn replace(
        &self,
        collection: Collection,
        filter: &Filter,
        record: Value,
        upsert: bool,
    ) -> Result<u64, StoreError>;

    /// Merge the top-level fields of `patch` into every matching document.
    /// Returns the number of documents touched.
    async fn modify(&self, collection: Collection, filter: &Filter, patch: Value) -> Result<u64, StoreError>;

    /// Remove every matching document. Returns the number removed.
    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;
}

/// Merge `patch` into `doc` field by field. Non-object patches are ignored.
pub(crate) fn merge_fields(doc: &mut Value, patch: &Value) {
    if let (Some(doc), Some(patch)) = (doc.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            doc.insert(k.clone(), v.clone());
        }
    }
}
