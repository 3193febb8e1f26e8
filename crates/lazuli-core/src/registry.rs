//! # Application Registry
//!
//! Per-session context object holding the registered models and the deferred
//! operations still waiting on models that have not registered yet.
//!
//! There is no process-wide registry: callers own an `AppRegistry`, mutate it
//! while their application loads, and treat it as read-only afterwards. The
//! checks in [`crate::checks`] take it by shared reference and never mutate
//! the pending set.
//!
//! ## Dispatch
//!
//! An operation queued against several models receives them one at a time:
//! each model that resolves is fixed as a partial layer around the operation
//! ([`Deferred::partial`]), and the operation is re-queued under its next
//! missing key. Once no keys remain, the innermost call runs with the
//! resolved models in naming order.

use crate::operation::{Deferred, Operand};
use crate::types::{ModelHandle, ModelKey};
use std::collections::BTreeMap;

// =============================================================================
// PENDING OPERATIONS
// =============================================================================

/// A deferred operation queued under one missing model key, together with the
/// keys it still needs after that one.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    op: Deferred,
    awaiting: Vec<ModelKey>,
}

impl PendingOperation {
    /// The queued operation chain.
    #[must_use]
    pub fn operation(&self) -> &Deferred {
        &self.op
    }

    /// Keys the operation still needs after the one it is queued under.
    #[must_use]
    pub fn awaiting(&self) -> &[ModelKey] {
        &self.awaiting
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registered models plus pending deferred operations, keyed by [`ModelKey`].
///
/// `BTreeMap` keys give deterministic iteration order for both models and
/// pending keys.
#[derive(Debug, Default)]
pub struct AppRegistry {
    models: BTreeMap<ModelKey, ModelHandle>,
    pending: BTreeMap<ModelKey, Vec<PendingOperation>>,
}

impl AppRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model and dispatch every operation pending on its key.
    pub fn register_model(&mut self, handle: ModelHandle) {
        let key = handle.key.clone();
        self.models.insert(key.clone(), handle);
        if let Some(operations) = self.pending.remove(&key) {
            for pending in operations {
                let op = Deferred::partial(
                    pending.op,
                    vec![Operand::Model(key.clone())],
                    BTreeMap::new(),
                );
                self.advance(op, pending.awaiting);
            }
        }
    }

    /// Look up a registered model.
    #[must_use]
    pub fn get_model(&self, key: &ModelKey) -> Option<&ModelHandle> {
        self.models.get(key)
    }

    /// Whether a model is registered under `key`.
    #[must_use]
    pub fn is_registered(&self, key: &ModelKey) -> bool {
        self.models.contains_key(key)
    }

    /// Registered models in key order.
    pub fn models(&self) -> impl Iterator<Item = &ModelHandle> {
        self.models.values()
    }

    /// Number of registered models.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Queue an operation to run once every named model is registered.
    ///
    /// Models already registered are fixed immediately; if all of them are,
    /// the operation runs before this returns.
    pub fn lazy_model_operation(&mut self, op: Deferred, keys: &[ModelKey]) {
        self.advance(op, keys.to_vec());
    }

    /// Supply registered models to `op` until a missing key stops it (queue
    /// there) or none remain (invoke).
    fn advance(&mut self, mut op: Deferred, mut awaiting: Vec<ModelKey>) {
        while !awaiting.is_empty() {
            let key = awaiting.remove(0);
            if self.models.contains_key(&key) {
                op = Deferred::partial(op, vec![Operand::Model(key)], BTreeMap::new());
            } else {
                self.pending
                    .entry(key)
                    .or_default()
                    .push(PendingOperation { op, awaiting });
                return;
            }
        }
        Self::invoke(&op);
    }

    fn invoke(op: &Deferred) {
        let unwrapped = op.unwrap_operation();
        let models = unwrapped.resolved_models();
        unwrapped.core.invoke(&models);
    }

    /// Keys with at least one pending operation, in key order.
    pub fn pending_keys(&self) -> impl Iterator<Item = &ModelKey> {
        self.pending.keys()
    }

    /// Operations pending under `key`, in registration order.
    #[must_use]
    pub fn pending_operations(&self, key: &ModelKey) -> &[PendingOperation] {
        self.pending.get(key).map_or(&[], Vec::as_slice)
    }

    /// Total number of pending operations across all keys.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Whether any operation is still pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
