//! # lazuli-core
//!
//! The deterministic model-registry diagnostic core for Lazuli - THE LOGIC.
//!
//! This crate implements lazy-reference resolution and reporting: model types
//! may be referenced by string (`"app_label.ModelName"`) before they are
//! registered, operations against them are deferred until they register, and
//! whatever is still pending at check time is reported as structured,
//! stably-ordered diagnostics.
//!
//! ## Architectural Constraints
//!
//! - Is a per-session context: no process-wide registry, callers own an
//!   [`AppRegistry`] and the [`ModelSignals`] set
//! - Is deterministic: `BTreeMap`/`BTreeSet` only, output sorted by message
//! - Is total: the checkers never fail; malformed or unknown deferred
//!   operations become diagnostics, not errors
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod checks;
pub mod dispatch;
pub mod operation;
pub mod registry;
pub mod signals;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CheckFn, CheckHook, Diagnostic, DiagnosticRef, LazuliError, ModelHandle, ModelKey, codes,
};

// =============================================================================
// RE-EXPORTS: Deferred Operations & Registry
// =============================================================================

pub use operation::{
    Deferred, MAX_PARTIAL_DEPTH, Operand, OperationCore, OperationFn, OperationKind,
    UnwrappedOperation,
};
pub use registry::{AppRegistry, PendingOperation};

// =============================================================================
// RE-EXPORTS: Dispatch & Signals
// =============================================================================

pub use dispatch::{Receiver, ReceiverFn, ReceiverKind, Signal, SignalEvent, SignalId};
pub use signals::{ModelSignal, ModelSignals, SenderSpec};

// =============================================================================
// RE-EXPORTS: Checks
// =============================================================================

pub use checks::{check_all_models, check_lazy_references};
