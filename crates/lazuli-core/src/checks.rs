//! # Model Checks
//!
//! Diagnostic checks over an [`AppRegistry`]:
//!
//! - [`check_all_models`] runs every registered model's check hook and
//!   reports hooks that were shadowed by something else.
//! - [`check_lazy_references`] reports every deferred operation still
//!   pending at check time, i.e. every lazy model reference that never
//!   resolved.
//!
//! Checks collect diagnostics, they never fail: one bad model or operation
//! never prevents diagnostics for the rest, and the registry is read but
//! never mutated.

use crate::dispatch::SignalId;
use crate::operation::{OperationKind, UnwrappedOperation};
use crate::registry::AppRegistry;
use crate::signals::ModelSignals;
use crate::types::{CheckHook, Diagnostic, DiagnosticRef, ModelKey, codes};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// MODEL CHECKS
// =============================================================================

/// Run every registered model's check hook.
///
/// A hook recorded as shadowed yields a single `models.E020` diagnostic;
/// custom hooks contribute whatever they return. Models are visited in key
/// order, so output is deterministic.
#[must_use]
pub fn check_all_models(registry: &AppRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for handle in registry.models() {
        match &handle.check_hook {
            CheckHook::Default => {}
            CheckHook::Custom(hook) => diagnostics.extend(hook(handle)),
            CheckHook::Shadowed { by } => diagnostics.push(Diagnostic::new(
                format!(
                    "The '{}.check()' class method is currently overridden by '{by}'.",
                    handle.object_name
                ),
                DiagnosticRef::Model(handle.key.clone()),
                codes::CHECK_HOOK_SHADOWED,
            )),
        }
    }
    diagnostics
}

// =============================================================================
// LAZY REFERENCE CHECKS
// =============================================================================

/// Report every lazy model reference that has not resolved.
///
/// Keys in `ignore` are skipped entirely (intentionally swappable models).
/// Returns diagnostics sorted ascending by message text; iteration order over
/// the pending map is already deterministic, but the contract is sorted
/// output, so sort anyway.
///
/// The empty-pending short-circuit is part of the contract: the signal-name
/// reverse map is only built when something is actually pending.
#[must_use]
pub fn check_lazy_references(
    registry: &AppRegistry,
    signals: &ModelSignals,
    ignore: Option<&BTreeSet<ModelKey>>,
) -> Vec<Diagnostic> {
    let pending: Vec<&ModelKey> = registry
        .pending_keys()
        .filter(|key| ignore.is_none_or(|set| !set.contains(*key)))
        .collect();
    if pending.is_empty() {
        return Vec::new();
    }

    let signal_names = signals.name_map();
    let mut diagnostics: Vec<Diagnostic> = pending
        .iter()
        .flat_map(|key| {
            registry.pending_operations(key).iter().filter_map(|op| {
                build_diagnostic(key, &op.operation().unwrap_operation(), &signal_names)
            })
        })
        .collect();
    diagnostics.sort_by(|a, b| a.message.cmp(&b.message));
    diagnostics
}

/// Format one pending operation, or nothing for suppressed kinds.
fn build_diagnostic(
    model: &ModelKey,
    operation: &UnwrappedOperation<'_>,
    signal_names: &BTreeMap<SignalId, &'static str>,
) -> Option<Diagnostic> {
    match &operation.core.kind {
        OperationKind::ResolveRelatedField { field } => {
            // The field operand fixed by the producing layer wins over the
            // kind's copy when both are present.
            let field = operation
                .kwargs
                .get("field")
                .and_then(|operand| operand.as_field())
                .unwrap_or(field);
            Some(Diagnostic::new(
                format!(
                    "The field {field} was declared with a lazy reference to '{model}', \
                     which is not installed."
                ),
                DiagnosticRef::Field(field.to_owned()),
                codes::LAZY_FIELD_REFERENCE,
            ))
        }
        OperationKind::SignalConnect {
            signal,
            receiver,
            module,
        } => {
            let signal_name = signal_names.get(signal).copied().unwrap_or("unknown");
            Some(Diagnostic::new(
                format!(
                    "{} was connected to the '{signal_name}' signal with a lazy reference \
                     to the '{model}' sender, which has not been installed.",
                    receiver.description()
                ),
                DiagnosticRef::Module(module.clone()),
                codes::LAZY_SIGNAL_CONNECT,
            ))
        }
        OperationKind::Bookkeeping => None,
        OperationKind::Other { description } => Some(Diagnostic::new(
            format!("Unhandled lazy reference to '{model}' found in {description}."),
            DiagnosticRef::Operation(description.clone()),
            codes::UNHANDLED_LAZY_REFERENCE,
        )),
    }
}

// =============================================================================
// TESTS
// =============================================================================
