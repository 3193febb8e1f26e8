//! # Deferred Operations
//!
//! A deferred operation is a callable queued against one or more model keys,
//! invoked once those models register. Operations that wait on several models
//! (or that fix arguments up front, like a signal connect) build up a chain of
//! partial-application layers around the innermost call.
//!
//! The chain is an explicit tagged union ([`Deferred`]): unwrapping is a loop
//! over the variants, and the intent of the innermost call is an
//! [`OperationKind`] assigned by the producer at the site where the operation
//! is created, so nothing downstream has to infer what a queued callable was
//! going to do.

use crate::dispatch::{ReceiverKind, SignalId};
use crate::types::ModelKey;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Maximum number of partial layers whose operands are accumulated during
/// unwrapping.
///
/// Chains are finite by construction (each layer owns its inner layer), so
/// termination is guaranteed; the cap only bounds how much operand state a
/// pathologically nested chain can accumulate.
pub const MAX_PARTIAL_DEPTH: usize = 64;

// =============================================================================
// OPERANDS
// =============================================================================

/// Positional or keyword argument captured by a partial layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A resolved model, supplied by the registry as the model registers.
    Model(ModelKey),
    /// A field, by its declared name.
    Field(String),
    /// Free-form text (e.g. a dispatch uid).
    Text(String),
    /// A boolean flag (e.g. the weak-connection flag).
    Flag(bool),
}

impl Operand {
    /// The resolved model carried by this operand, if any.
    #[must_use]
    pub fn as_model(&self) -> Option<&ModelKey> {
        match self {
            Self::Model(key) => Some(key),
            _ => None,
        }
    }

    /// The field name carried by this operand, if any.
    #[must_use]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            _ => None,
        }
    }
}

// =============================================================================
// OPERATION KIND
// =============================================================================

/// What a deferred operation will do once its models resolve.
///
/// Assigned by the producer when the operation is created, so the checker
/// never has to reconstruct intent from the callable itself. The enum is
/// exhaustive: shapes the checker has no special formatting for are `Other`
/// by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Resolve a related field's target class.
    ResolveRelatedField {
        /// The declared name of the field awaiting its target.
        field: String,
    },
    /// Connect a receiver to a signal once the sender model registers.
    SignalConnect {
        /// The signal being connected to.
        signal: SignalId,
        /// What kind of receiver was handed in.
        receiver: ReceiverKind,
        /// Module path where the connection was made.
        module: String,
    },
    /// Internal registry bookkeeping; known benign, suppressed by the
    /// checker.
    Bookkeeping,
    /// Anything else. Reported with the generic unhandled-reference message.
    Other {
        /// Human-readable description of the operation.
        description: String,
    },
}

// =============================================================================
// OPERATION CORE
// =============================================================================

/// Signature of the innermost deferred call. Receives the models that were
/// pending, in the order the operation named them.
pub type OperationFn = dyn Fn(&[ModelKey]);

/// The innermost callable of a deferred-operation chain: an explicit kind tag
/// plus the closure to run once all named models have registered.
#[derive(Clone)]
pub struct OperationCore {
    /// Producer-assigned intent tag.
    pub kind: OperationKind,
    run: Rc<OperationFn>,
}

impl fmt::Debug for OperationCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCore")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl OperationCore {
    /// Create a core with an explicit kind.
    #[must_use]
    pub fn new(kind: OperationKind, run: impl Fn(&[ModelKey]) + 'static) -> Self {
        Self {
            kind,
            run: Rc::new(run),
        }
    }

    /// A related-field resolution against a lazy target.
    #[must_use]
    pub fn resolve_related_field(
        field: impl Into<String>,
        run: impl Fn(&[ModelKey]) + 'static,
    ) -> Self {
        Self::new(
            OperationKind::ResolveRelatedField {
                field: field.into(),
            },
            run,
        )
    }

    /// A deferred signal connection.
    #[must_use]
    pub fn signal_connect(
        signal: SignalId,
        receiver: ReceiverKind,
        module: impl Into<String>,
        run: impl Fn(&[ModelKey]) + 'static,
    ) -> Self {
        Self::new(
            OperationKind::SignalConnect {
                signal,
                receiver,
                module: module.into(),
            },
            run,
        )
    }

    /// Known-benign registry bookkeeping; the checker produces no diagnostic
    /// for it.
    #[must_use]
    pub fn bookkeeping(run: impl Fn(&[ModelKey]) + 'static) -> Self {
        Self::new(OperationKind::Bookkeeping, run)
    }

    /// Any other deferred call.
    #[must_use]
    pub fn other(description: impl Into<String>, run: impl Fn(&[ModelKey]) + 'static) -> Self {
        Self::new(
            OperationKind::Other {
                description: description.into(),
            },
            run,
        )
    }

    /// Run the innermost call with the resolved models.
    pub fn invoke(&self, models: &[ModelKey]) {
        (self.run)(models);
    }
}

// =============================================================================
// DEFERRED CHAIN
// =============================================================================

/// A deferred operation: either the innermost call itself, or a partial layer
/// fixing extra operands around an inner operation.
#[derive(Debug, Clone)]
pub enum Deferred {
    /// The innermost call, waiting to be invoked.
    Call(OperationCore),
    /// A partial-application layer.
    Partial {
        /// The wrapped operation.
        inner: Box<Deferred>,
        /// Positional operands fixed by this layer.
        args: Vec<Operand>,
        /// Keyword operands fixed by this layer.
        kwargs: BTreeMap<String, Operand>,
    },
}

impl Deferred {
    /// Wrap a core as a chain of depth zero.
    #[must_use]
    pub fn call(core: OperationCore) -> Self {
        Self::Call(core)
    }

    /// Add a partial layer around an operation.
    #[must_use]
    pub fn partial(inner: Self, args: Vec<Operand>, kwargs: BTreeMap<String, Operand>) -> Self {
        Self::Partial {
            inner: Box::new(inner),
            args,
            kwargs,
        }
    }

    /// The innermost operation's kind.
    #[must_use]
    pub fn kind(&self) -> &OperationKind {
        let mut current = self;
        loop {
            match current {
                Self::Call(core) => return &core.kind,
                Self::Partial { inner, .. } => current = inner,
            }
        }
    }

    /// Unwrap the chain: recover the innermost core plus the accumulated
    /// positional and keyword operands.
    ///
    /// Walks from the outermost layer inward, appending positional operands
    /// and merging keyword operands; deeper layers override earlier keys.
    /// Layers past [`MAX_PARTIAL_DEPTH`] still get walked (the core must be
    /// found) but contribute no operands.
    #[must_use]
    pub fn unwrap_operation(&self) -> UnwrappedOperation<'_> {
        let mut args: Vec<&Operand> = Vec::new();
        let mut kwargs: BTreeMap<&str, &Operand> = BTreeMap::new();
        let mut current = self;
        let mut depth = 0usize;
        loop {
            match current {
                Self::Call(core) => return UnwrappedOperation { core, args, kwargs },
                Self::Partial {
                    inner,
                    args: layer_args,
                    kwargs: layer_kwargs,
                } => {
                    if depth < MAX_PARTIAL_DEPTH {
                        args.extend(layer_args.iter());
                        for (key, value) in layer_kwargs {
                            kwargs.insert(key.as_str(), value);
                        }
                    }
                    depth += 1;
                    current = inner;
                }
            }
        }
    }
}

/// Result of unwrapping a deferred chain.
#[derive(Debug)]
pub struct UnwrappedOperation<'a> {
    /// The innermost call.
    pub core: &'a OperationCore,
    /// Accumulated positional operands, outermost layer first.
    pub args: Vec<&'a Operand>,
    /// Accumulated keyword operands, deepest layer winning on collision.
    pub kwargs: BTreeMap<&'a str, &'a Operand>,
}

impl UnwrappedOperation<'_> {
    /// The resolved models among the positional operands, in the order the
    /// operation named them.
    ///
    /// Model layers accrete outward as models resolve, so the positional
    /// operands read newest-first; this reverses them back to naming order.
    #[must_use]
    pub fn resolved_models(&self) -> Vec<ModelKey> {
        let mut models: Vec<ModelKey> = self
            .args
            .iter()
            .filter_map(|operand| operand.as_model().cloned())
            .collect();
        models.reverse();
        models
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn noop_core() -> OperationCore {
        OperationCore::other("noop", |_| {})
    }

    #[test]
    fn unwrap_depth_zero_chain() {
        let op = Deferred::call(noop_core());
        let unwrapped = op.unwrap_operation();

        assert!(unwrapped.args.is_empty());
        assert!(unwrapped.kwargs.is_empty());
        assert!(matches!(
            unwrapped.core.kind,
            OperationKind::Other { ref description } if description == "noop"
        ));
    }

    #[test]
    fn unwrap_accumulates_args_outermost_first() {
        let inner = Deferred::partial(
            Deferred::call(noop_core()),
            vec![Operand::Model(ModelKey::new("a", "First"))],
            BTreeMap::new(),
        );
        let outer = Deferred::partial(
            inner,
            vec![Operand::Model(ModelKey::new("b", "Second"))],
            BTreeMap::new(),
        );

        let unwrapped = outer.unwrap_operation();
        assert_eq!(
            unwrapped.args,
            vec![
                &Operand::Model(ModelKey::new("b", "Second")),
                &Operand::Model(ModelKey::new("a", "First")),
            ]
        );
        // Naming order is the reverse of accretion order.
        assert_eq!(
            unwrapped.resolved_models(),
            vec![ModelKey::new("a", "First"), ModelKey::new("b", "Second")]
        );
    }

    #[test]
    fn unwrap_deeper_kwargs_override() {
        let mut inner_kwargs = BTreeMap::new();
        inner_kwargs.insert("field".to_owned(), Operand::Field("inner".into()));
        let inner = Deferred::partial(Deferred::call(noop_core()), vec![], inner_kwargs);

        let mut outer_kwargs = BTreeMap::new();
        outer_kwargs.insert("field".to_owned(), Operand::Field("outer".into()));
        outer_kwargs.insert("weak".to_owned(), Operand::Flag(true));
        let outer = Deferred::partial(inner, vec![], outer_kwargs);

        let unwrapped = outer.unwrap_operation();
        assert_eq!(
            unwrapped.kwargs.get("field"),
            Some(&&Operand::Field("inner".into()))
        );
        assert_eq!(unwrapped.kwargs.get("weak"), Some(&&Operand::Flag(true)));
    }

    #[test]
    fn unwrap_caps_operand_accumulation() {
        let mut op = Deferred::call(noop_core());
        for i in 0..(MAX_PARTIAL_DEPTH + 10) {
            op = Deferred::partial(
                op,
                vec![Operand::Text(format!("layer-{i}"))],
                BTreeMap::new(),
            );
        }

        let unwrapped = op.unwrap_operation();
        // The core is still reachable past the cap; only operand
        // accumulation stops.
        assert_eq!(unwrapped.args.len(), MAX_PARTIAL_DEPTH);
        assert!(matches!(unwrapped.core.kind, OperationKind::Other { .. }));
    }

    #[test]
    fn kind_reaches_innermost_core() {
        let core = OperationCore::resolve_related_field("shop.Order.customer", |_| {});
        let op = Deferred::partial(Deferred::call(core), vec![], BTreeMap::new());

        assert!(matches!(
            op.kind(),
            OperationKind::ResolveRelatedField { field } if field == "shop.Order.customer"
        ));
    }

    #[test]
    fn invoke_runs_innermost_closure() {
        let ran = Rc::new(Cell::new(0usize));
        let ran_inner = Rc::clone(&ran);
        let core = OperationCore::bookkeeping(move |models| {
            ran_inner.set(ran_inner.get() + models.len());
        });

        core.invoke(&[ModelKey::new("a", "b"), ModelKey::new("c", "d")]);
        assert_eq!(ran.get(), 2);
    }
}
