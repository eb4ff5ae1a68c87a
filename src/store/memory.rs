// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! In-memory document store.
//!
//! Suitable for development, tests and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{merge_fields, Collection, DocumentStore, Filter, StoreError};

/// In-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        collections.get(&collection).map_or(0, Vec::len)
    }
}

/// The unique (`url`, `clientId`) pair of a platform document.
fn platform_pair(doc: &Value) -> Option<(&Value, &Value)> {
    Some((doc.get("url")?, doc.get("clientId")?))
}

/// Reject `candidate` if another platform document (other than the one at
/// `skip`) already holds its (`url`, `clientId`).
fn check_unique(
    collection: Collection,
    docs: &[Value],
    candidate: &Value,
    skip: Option<usize>,
) -> Result<(), StoreError> {
    if collection != Collection::Platform {
        return Ok(());
    }
    let Some(pair) = platform_pair(candidate) else {
        return Ok(());
    };
    let clash = docs
        .iter()
        .enumerate()
        .any(|(i, doc)| Some(i) != skip && platform_pair(doc) == Some(pair));
    if clash {
        return Err(StoreError::Conflict {
            collection,
            detail: format!("url={} clientId={}", pair.0, pair.1),
        });
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        collection: Collection,
        filter: &Filter,
        record: Value,
        upsert: bool,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let docs = collections.entry(collection).or_default();

        match docs.iter().position(|d| filter.matches(d)) {
            Some(idx) => {
                check_unique(collection, docs, &record, Some(idx))?;
                docs[idx] = record;
                Ok(1)
            }
            None if upsert => {
                check_unique(collection, docs, &record, None)?;
                docs.push(record);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn modify(&self, collection: Collection, filter: &Filter, patch: Value) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let targets: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| filter.matches(d))
            .map(|(i, _)| i)
            .collect();

        // Validate every patched document before touching any of them.
        let mut patched = Vec::with_capacity(targets.len());
        for &idx in &targets {
            let mut doc = docs[idx].clone();
            merge_fields(&mut doc, &patch);
            check_unique(collection, docs, &doc, Some(idx))?;
            patched.push((idx, doc));
        }
        for (idx, doc) in patched {
            docs[idx] = doc;
        }
        Ok(targets.len() as u64)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}
