// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Test doubles for the store, key generator and token issuer.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::credentials::{GeneratedKeyPair, KeyGenError, KeyGenerator};
use crate::models::{AccessToken, PlatformIdentity};
use crate::store::{Collection, DocumentStore, Filter, MemoryStore, StoreError};
use crate::token_cache::{IssuerError, TokenIssuer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Replace,
    Modify,
    Delete,
}

/// [`MemoryStore`] that fails selected operations on selected collections.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    faults: Mutex<HashSet<(Op, Collection)>>,
    hide_platforms: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: Op, collection: Collection) {
        self.faults.lock().unwrap().insert((op, collection));
    }

    /// Make the next `platform` read come back empty, as if a concurrent
    /// write had not landed yet.
    pub fn hide_platforms_once(&self) {
        self.hide_platforms.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.faults.lock().unwrap().clear();
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.inner.len(collection)
    }

    fn check(&self, op: Op, collection: Collection) -> Result<(), StoreError> {
        if self.faults.lock().unwrap().contains(&(op, collection)) {
            return Err(StoreError::Database(format!("injected {op:?} failure on {collection}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        self.check(Op::Get, collection)?;
        if collection == Collection::Platform && self.hide_platforms.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        self.inner.get(collection, filter).await
    }

    async fn replace(
        &self,
        collection: Collection,
        filter: &Filter,
        record: Value,
        upsert: bool,
    ) -> Result<u64, StoreError> {
        self.check(Op::Replace, collection)?;
        self.inner.replace(collection, filter, record, upsert).await
    }

    async fn modify(&self, collection: Collection, filter: &Filter, patch: Value) -> Result<u64, StoreError> {
        self.check(Op::Modify, collection)?;
        self.inner.modify(collection, filter, patch).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        self.check(Op::Delete, collection)?;
        self.inner.delete(collection, filter).await
    }
}

/// Key generator that always fails.
#[derive(Debug)]
pub struct BrokenKeyGenerator;

impl KeyGenerator for BrokenKeyGenerator {
    fn generate(&self) -> Result<GeneratedKeyPair, KeyGenError> {
        Err(KeyGenError("entropy source unavailable".into()))
    }
}

/// Issuer that hands out numbered tokens and counts calls.
#[derive(Debug)]
pub struct CountingIssuer {
    pub calls: AtomicUsize,
    pub token_type: String,
    pub expires_in: u64,
}

impl CountingIssuer {
    pub fn new(token_type: &str, expires_in: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            token_type: token_type.into(),
            expires_in,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for CountingIssuer {
    async fn issue(&self, scopes: &str, identity: &PlatformIdentity) -> Result<AccessToken, IssuerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut extra = Map::new();
        extra.insert("access_token".into(), Value::from(format!("{}-{n}", identity.kid)));
        extra.insert("scope".into(), Value::from(scopes));
        Ok(AccessToken {
            token_type: self.token_type.clone(),
            expires_in: self.expires_in,
            extra,
        })
    }
}

/// Issuer whose token endpoint is always down.
#[derive(Debug)]
pub struct DownIssuer;

#[async_trait]
impl TokenIssuer for DownIssuer {
    async fn issue(&self, _scopes: &str, _identity: &PlatformIdentity) -> Result<AccessToken, IssuerError> {
        Err(IssuerError::new("token endpoint unreachable"))
    }
}
