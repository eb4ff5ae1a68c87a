// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>

//! Compensation log for multi-record mutations.
//!
//! The store offers no cross-record transaction, so each step of a
//! multi-record operation records the undo that reverses it. If a later
//! step fails, the log is unwound newest-first and the original error is
//! returned to the caller. Undo failures are logged, never retried, and
//! never replace the original error.

use serde_json::Value;
use tracing::{error, warn};

use crate::error::RegistryError;
use crate::store::{Collection, DocumentStore, Filter};

/// Reverse action for one applied step.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    Delete {
        collection: Collection,
        filter: Filter,
    },
    Modify {
        collection: Collection,
        filter: Filter,
        patch: Value,
    },
}

impl Undo {
    async fn apply(&self, store: &dyn DocumentStore) -> Result<(), crate::store::StoreError> {
        match self {
            Undo::Delete { collection, filter } => store.delete(*collection, filter).await.map(drop),
            Undo::Modify {
                collection,
                filter,
                patch,
            } => store.modify(*collection, filter, patch.clone()).await.map(drop),
        }
    }

    fn collection(&self) -> Collection {
        match self {
            Undo::Delete { collection, .. } | Undo::Modify { collection, .. } => *collection,
        }
    }
}

pub(crate) struct Compensation<'a> {
    store: &'a dyn DocumentStore,
    operation: &'static str,
    applied: Vec<Undo>,
}

impl<'a> Compensation<'a> {
    pub(crate) fn new(store: &'a dyn DocumentStore, operation: &'static str) -> Self {
        Self {
            store,
            operation,
            applied: Vec::new(),
        }
    }

    /// Record the undo for a step. Push before attempting the step when a
    /// failure could still have left a partial write behind.
    pub(crate) fn push(&mut self, undo: Undo) {
        self.applied.push(undo);
    }

    /// Reverse every recorded step, newest first. Returns the number of
    /// undo steps that failed.
    pub(crate) async fn unwind(self) -> usize {
        let mut failures = 0;
        for undo in self.applied.iter().rev() {
            if let Err(e) = undo.apply(self.store).await {
                failures += 1;
                error!(
                    operation = self.operation,
                    collection = %undo.collection(),
                    error = %e,
                    "compensation step failed"
                );
            }
        }
        if failures == 0 && !self.applied.is_empty() {
            warn!(
                operation = self.operation,
                steps = self.applied.len(),
                "rolled back partial operation"
            );
        }
        failures
    }

    /// Unwind and hand back `err` unchanged.
    pub(crate) async fn fail<T>(self, err: impl Into<RegistryError>) -> Result<T, RegistryError> {
        self.unwind().await;
        Err(err.into())
    }
}
