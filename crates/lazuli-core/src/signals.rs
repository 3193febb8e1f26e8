//! # Model Signals
//!
//! [`ModelSignal`] wraps a [`Signal`] and allows the sender to be specified
//! lazily, as a `"app_label.ModelName"` reference to a model that may not be
//! registered yet. The actual subscription is queued as a deferred operation
//! against that key and runs when the model registers; a concrete or omitted
//! sender connects with zero deferred keys, which the registry executes
//! immediately.
//!
//! [`ModelSignals`] is the built-in set of model lifecycle signals. The lazy
//! reference checker builds its signal-name reverse map from this set.

use crate::dispatch::{Receiver, Signal, SignalId};
use crate::operation::{Deferred, Operand, OperationCore};
use crate::registry::AppRegistry;
use crate::types::{LazuliError, ModelKey};
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// SENDER SPECIFICATION
// =============================================================================

/// How the sender of a subscription is specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderSpec {
    /// No sender filter: the receiver fires for every sender.
    Any,
    /// A concrete model key.
    Model(ModelKey),
    /// A lazy reference of the form `app_label.ModelName`.
    Lazy(String),
}

impl SenderSpec {
    /// A lazy reference sender.
    #[must_use]
    pub fn lazy(reference: impl Into<String>) -> Self {
        Self::Lazy(reference.into())
    }
}

impl From<ModelKey> for SenderSpec {
    fn from(key: ModelKey) -> Self {
        Self::Model(key)
    }
}

// =============================================================================
// MODEL SIGNAL
// =============================================================================

/// A [`Signal`] whose sender may be lazily specified by model reference
/// string.
#[derive(Debug)]
pub struct ModelSignal {
    inner: Rc<Signal>,
}

impl ModelSignal {
    /// Create a model signal declaring its providing args.
    #[must_use]
    pub fn new(providing_args: &[&str]) -> Self {
        Self {
            inner: Rc::new(Signal::new(providing_args)),
        }
    }

    /// The wrapped signal's id.
    #[must_use]
    pub fn id(&self) -> SignalId {
        self.inner.id()
    }

    /// The wrapped signal.
    #[must_use]
    pub fn signal(&self) -> &Signal {
        &self.inner
    }

    /// Subscribe `receiver`, deferring until the sender model registers if
    /// the sender is a lazy reference.
    ///
    /// The queued operation is a partial application of the real connect with
    /// the receiver, weak flag, and dispatch uid fixed. Fails only if a lazy
    /// reference string is malformed.
    pub fn connect(
        &self,
        registry: &mut AppRegistry,
        receiver: Receiver,
        sender: SenderSpec,
        weak: bool,
        dispatch_uid: Option<String>,
    ) -> Result<(), LazuliError> {
        let keys: Vec<ModelKey> = match &sender {
            SenderSpec::Any => Vec::new(),
            SenderSpec::Model(key) => vec![key.clone()],
            SenderSpec::Lazy(reference) => vec![ModelKey::parse(reference)?],
        };

        let signal = Rc::clone(&self.inner);
        let kind = receiver.kind.clone();
        let module = receiver.module.clone();
        let uid = dispatch_uid.clone();
        let core = OperationCore::signal_connect(self.inner.id(), kind, module, move |models| {
            signal.connect(receiver.clone(), models.first().cloned(), weak, uid.clone());
        });

        let mut kwargs = BTreeMap::new();
        kwargs.insert("weak".to_owned(), Operand::Flag(weak));
        if let Some(uid) = dispatch_uid {
            kwargs.insert("dispatch_uid".to_owned(), Operand::Text(uid));
        }
        let op = Deferred::partial(Deferred::call(core), Vec::new(), kwargs);
        registry.lazy_model_operation(op, &keys);
        Ok(())
    }

    /// Deliver an event, see [`Signal::send`].
    pub fn send(&self, sender: Option<&ModelKey>, args: &BTreeMap<String, String>) -> usize {
        self.inner.send(sender, args)
    }

    /// Number of live connections, see [`Signal::receiver_count`].
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.inner.receiver_count()
    }
}

// =============================================================================
// BUILT-IN SIGNAL SET
// =============================================================================

/// The built-in model lifecycle signals.
///
/// One instance per application-loading session, like the registry; the lazy
/// reference checker builds its name reverse map from this set.
#[derive(Debug)]
pub struct ModelSignals {
    /// Fires before a model instance is initialized.
    pub pre_init: ModelSignal,
    /// Fires after a model instance is initialized.
    pub post_init: ModelSignal,
    /// Fires before a model instance is saved.
    pub pre_save: ModelSignal,
    /// Fires after a model instance is saved.
    pub post_save: ModelSignal,
    /// Fires before a model instance is deleted.
    pub pre_delete: ModelSignal,
    /// Fires after a model instance is deleted.
    pub post_delete: ModelSignal,
    /// Fires when a many-to-many relation changes.
    pub m2m_changed: ModelSignal,
}

impl ModelSignals {
    /// Create the built-in set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pre_init: ModelSignal::new(&["instance", "args", "kwargs"]),
            post_init: ModelSignal::new(&["instance"]),
            pre_save: ModelSignal::new(&["instance", "raw", "using", "update_fields"]),
            post_save: ModelSignal::new(&["instance", "raw", "created", "using", "update_fields"]),
            pre_delete: ModelSignal::new(&["instance", "using"]),
            post_delete: ModelSignal::new(&["instance", "using"]),
            m2m_changed: ModelSignal::new(&[
                "action", "instance", "reverse", "model", "pk_set", "using",
            ]),
        }
    }

    /// The signals with their declared names, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ModelSignal)> {
        [
            ("pre_init", &self.pre_init),
            ("post_init", &self.post_init),
            ("pre_save", &self.pre_save),
            ("post_save", &self.post_save),
            ("pre_delete", &self.pre_delete),
            ("post_delete", &self.post_delete),
            ("m2m_changed", &self.m2m_changed),
        ]
        .into_iter()
    }

    /// Reverse map from signal id to declared name.
    ///
    /// Built once per checker invocation; looking up an id not in this set
    /// yields no name (the checker reports `unknown`).
    #[must_use]
    pub fn name_map(&self) -> BTreeMap<SignalId, &'static str> {
        self.iter().map(|(name, signal)| (signal.id(), name)).collect()
    }
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelHandle;
    use std::cell::Cell;

    fn noop_receiver(name: &str) -> Receiver {
        Receiver::function(name, "lazuli_core::signals::tests", |_| {})
    }

    #[test]
    fn concrete_sender_connects_immediately() {
        let mut registry = AppRegistry::new();
        registry.register_model(ModelHandle::new("shop", "Order"));
        let signal = ModelSignal::new(&["instance"]);

        signal
            .connect(
                &mut registry,
                noop_receiver("on_save"),
                SenderSpec::Model(ModelKey::new("shop", "Order")),
                false,
                None,
            )
            .expect("connect");

        assert_eq!(signal.receiver_count(), 1);
        assert!(!registry.has_pending());
    }

    #[test]
    fn omitted_sender_connects_immediately() {
        let mut registry = AppRegistry::new();
        let signal = ModelSignal::new(&["instance"]);

        signal
            .connect(
                &mut registry,
                noop_receiver("on_save"),
                SenderSpec::Any,
                false,
                None,
            )
            .expect("connect");

        assert_eq!(signal.receiver_count(), 1);
        assert!(!registry.has_pending());
    }

    #[test]
    fn lazy_sender_defers_until_model_registers() {
        let mut registry = AppRegistry::new();
        let signal = ModelSignal::new(&["instance"]);
        let hits = Rc::new(Cell::new(0));
        let hits_inner = Rc::clone(&hits);
        let receiver =
            Receiver::function("on_save", "lazuli_core::signals::tests", move |_| {
                hits_inner.set(hits_inner.get() + 1);
            });

        signal
            .connect(
                &mut registry,
                receiver,
                SenderSpec::lazy("shop.Order"),
                false,
                None,
            )
            .expect("connect");

        assert_eq!(signal.receiver_count(), 0);
        assert_eq!(registry.pending_count(), 1);

        registry.register_model(ModelHandle::new("shop", "Order"));
        assert_eq!(signal.receiver_count(), 1);
        assert!(!registry.has_pending());

        // The deferred connection is filtered to the resolved sender.
        let notified = signal.send(Some(&ModelKey::new("shop", "Order")), &BTreeMap::new());
        assert_eq!(notified, 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(
            signal.send(Some(&ModelKey::new("shop", "Invoice")), &BTreeMap::new()),
            0
        );
    }

    #[test]
    fn malformed_lazy_reference_is_an_error() {
        let mut registry = AppRegistry::new();
        let signal = ModelSignal::new(&["instance"]);

        let result = signal.connect(
            &mut registry,
            noop_receiver("on_save"),
            SenderSpec::lazy("not-a-reference"),
            false,
            None,
        );

        assert!(matches!(
            result,
            Err(LazuliError::InvalidModelReference { .. })
        ));
        assert!(!registry.has_pending());
    }

    #[test]
    fn dispatch_uid_survives_deferral() {
        let mut registry = AppRegistry::new();
        let signal = ModelSignal::new(&["instance"]);

        for _ in 0..2 {
            signal
                .connect(
                    &mut registry,
                    noop_receiver("on_save"),
                    SenderSpec::lazy("shop.Order"),
                    false,
                    Some("uid-1".into()),
                )
                .expect("connect");
        }
        registry.register_model(ModelHandle::new("shop", "Order"));

        // Both deferred connects ran, but the duplicate uid collapsed them.
        assert_eq!(signal.receiver_count(), 1);
    }

    #[test]
    fn name_map_covers_all_builtin_signals() {
        let signals = ModelSignals::new();
        let names = signals.name_map();

        assert_eq!(names.len(), 7);
        assert_eq!(names.get(&signals.post_init.id()), Some(&"post_init"));
        assert_eq!(names.get(&signals.m2m_changed.id()), Some(&"m2m_changed"));

        // A foreign signal has no name.
        let foreign = ModelSignal::new(&[]);
        assert_eq!(names.get(&foreign.id()), None);
    }

    #[test]
    fn providing_args_are_declared() {
        let signals = ModelSignals::new();
        assert_eq!(
            signals.post_save.signal().providing_args(),
            ["instance", "raw", "created", "using", "update_fields"]
        );
    }
}
