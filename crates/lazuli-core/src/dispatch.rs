//! # Dispatch Module
//!
//! Generic publish/subscribe channel.
//!
//! A [`Signal`] holds a list of connections; [`Signal::send`] delivers an
//! event to every live connection whose sender filter matches. Receivers
//! carry an explicit [`ReceiverKind`] established when the receiver is
//! created, so diagnostics never have to infer after the fact whether a
//! subscriber was a plain function or a callable instance.
//!
//! The core is single-threaded (startup and check phases run on one thread),
//! so connection lists live behind `RefCell` and callbacks are `Rc`-shared.

use crate::types::ModelKey;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide id allocator; ids only need to be unique, not stable across
/// runs.
static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// RECEIVERS
// =============================================================================

/// Signature of a receiver callback.
pub type ReceiverFn = dyn Fn(&SignalEvent);

/// What kind of subscriber a receiver is.
///
/// Recorded at the call site that creates the receiver; diagnostics use it
/// verbatim for their receiver description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverKind {
    /// A plain function.
    Function {
        /// The function's name.
        name: String,
    },
    /// An instance of a type that implements the call operator.
    CallableInstance {
        /// The type's name.
        class_name: String,
    },
}

impl ReceiverKind {
    /// Human-readable description used in diagnostics.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Function { name } => format!("The '{name}' function"),
            Self::CallableInstance { class_name } => {
                format!("An instance of the '{class_name}' class")
            }
        }
    }
}

/// A subscriber: its kind, the module path it originates from, and the
/// callback to deliver events to.
#[derive(Clone)]
pub struct Receiver {
    /// What kind of subscriber this is.
    pub kind: ReceiverKind,
    /// Module path where the receiver is defined.
    pub module: String,
    callback: Rc<ReceiverFn>,
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("kind", &self.kind)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

impl Receiver {
    /// A plain-function receiver.
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        module: impl Into<String>,
        callback: impl Fn(&SignalEvent) + 'static,
    ) -> Self {
        Self {
            kind: ReceiverKind::Function { name: name.into() },
            module: module.into(),
            callback: Rc::new(callback),
        }
    }

    /// A callable-instance receiver.
    #[must_use]
    pub fn instance(
        class_name: impl Into<String>,
        module: impl Into<String>,
        callback: impl Fn(&SignalEvent) + 'static,
    ) -> Self {
        Self {
            kind: ReceiverKind::CallableInstance {
                class_name: class_name.into(),
            },
            module: module.into(),
            callback: Rc::new(callback),
        }
    }

    /// Build a receiver around an existing shared callback.
    ///
    /// Needed for weak connections: the caller keeps the `Rc` and the
    /// connection expires when the caller drops it.
    #[must_use]
    pub fn from_callback(
        kind: ReceiverKind,
        module: impl Into<String>,
        callback: Rc<ReceiverFn>,
    ) -> Self {
        Self {
            kind,
            module: module.into(),
            callback,
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// An event delivered to receivers.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    /// The signal that fired.
    pub signal: SignalId,
    /// The sending model, if the sender was specified.
    pub sender: Option<ModelKey>,
    /// Named event arguments.
    pub args: BTreeMap<String, String>,
}

impl SignalEvent {
    /// Create an event with no arguments.
    #[must_use]
    pub fn new(signal: SignalId, sender: Option<ModelKey>) -> Self {
        Self {
            signal,
            sender,
            args: BTreeMap::new(),
        }
    }
}

// =============================================================================
// SIGNAL
// =============================================================================

/// Unique identifier for a signal within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(u64);

/// How a connection holds its callback.
enum CallbackSlot {
    /// The connection keeps the callback alive.
    Strong(Rc<ReceiverFn>),
    /// The connection expires once the caller drops the callback.
    Weak(Weak<ReceiverFn>),
}

impl CallbackSlot {
    fn upgrade(&self) -> Option<Rc<ReceiverFn>> {
        match self {
            Self::Strong(callback) => Some(Rc::clone(callback)),
            Self::Weak(callback) => callback.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Self::Strong(_) => true,
            Self::Weak(callback) => callback.strong_count() > 0,
        }
    }
}

struct Connection {
    kind: ReceiverKind,
    module: String,
    slot: CallbackSlot,
    sender: Option<ModelKey>,
    dispatch_uid: Option<String>,
}

/// A publish/subscribe channel.
pub struct Signal {
    id: SignalId,
    providing_args: Vec<String>,
    connections: RefCell<Vec<Connection>>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("providing_args", &self.providing_args)
            .field("receivers", &self.receiver_count())
            .finish()
    }
}

impl Signal {
    /// Create a signal declaring the argument names its events provide.
    #[must_use]
    pub fn new(providing_args: &[&str]) -> Self {
        Self {
            id: SignalId(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed)),
            providing_args: providing_args.iter().map(|&s| s.to_owned()).collect(),
            connections: RefCell::new(Vec::new()),
        }
    }

    /// This signal's process-unique id.
    #[must_use]
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Argument names this signal's events provide.
    #[must_use]
    pub fn providing_args(&self) -> &[String] {
        &self.providing_args
    }

    /// Subscribe a receiver, optionally filtered to one sender.
    ///
    /// A duplicate `dispatch_uid` for the same sender is ignored, so a module
    /// that connects its receivers on every import connects them once. With
    /// `weak` the connection holds the callback weakly; the caller must keep
    /// the `Rc` (see [`Receiver::from_callback`]) or the connection expires.
    pub fn connect(
        &self,
        receiver: Receiver,
        sender: Option<ModelKey>,
        weak: bool,
        dispatch_uid: Option<String>,
    ) {
        let mut connections = self.connections.borrow_mut();
        if let Some(uid) = &dispatch_uid
            && connections
                .iter()
                .any(|c| c.dispatch_uid.as_deref() == Some(uid) && c.sender == sender)
        {
            return;
        }
        let slot = if weak {
            CallbackSlot::Weak(Rc::downgrade(&receiver.callback))
        } else {
            CallbackSlot::Strong(receiver.callback)
        };
        connections.push(Connection {
            kind: receiver.kind,
            module: receiver.module,
            slot,
            sender,
            dispatch_uid,
        });
    }

    /// Remove the connection registered under `dispatch_uid` for the given
    /// sender. Returns whether anything was removed.
    pub fn disconnect(&self, dispatch_uid: &str, sender: Option<&ModelKey>) -> bool {
        let mut connections = self.connections.borrow_mut();
        let before = connections.len();
        connections.retain(|c| {
            c.dispatch_uid.as_deref() != Some(dispatch_uid) || c.sender.as_ref() != sender
        });
        connections.len() != before
    }

    /// Deliver an event to every live connection whose sender filter matches.
    ///
    /// Dead weak connections are pruned. Returns the number of receivers
    /// notified.
    pub fn send(&self, sender: Option<&ModelKey>, args: &BTreeMap<String, String>) -> usize {
        // Collect callbacks first: a receiver may connect or disconnect
        // reentrantly, which would collide with an outstanding borrow.
        let callbacks: Vec<Rc<ReceiverFn>> = {
            let mut connections = self.connections.borrow_mut();
            connections.retain(|c| c.slot.is_alive());
            connections
                .iter()
                .filter(|c| match (&c.sender, sender) {
                    (None, _) => true,
                    (Some(filter), Some(actual)) => filter == actual,
                    (Some(_), None) => false,
                })
                .filter_map(|c| c.slot.upgrade())
                .collect()
        };
        let event = SignalEvent {
            signal: self.id,
            sender: sender.cloned(),
            args: args.clone(),
        };
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    /// Number of live connections.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.connections
            .borrow()
            .iter()
            .filter(|c| c.slot.is_alive())
            .count()
    }

    /// Kind and module of every live connection, in connection order.
    /// Used by tests and by callers that report on their subscribers.
    #[must_use]
    pub fn receivers(&self) -> Vec<(ReceiverKind, String)> {
        self.connections
            .borrow()
            .iter()
            .filter(|c| c.slot.is_alive())
            .map(|c| (c.kind.clone(), c.module.clone()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
