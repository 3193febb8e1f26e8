//! # Core Type Definitions
//!
//! This module contains all core types for the Lazuli diagnostic substrate:
//! - Model identity (`ModelKey`) and registered-model records (`ModelHandle`)
//! - Structured diagnostics (`Diagnostic`, `DiagnosticRef`, category codes)
//! - Error types (`LazuliError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they key `BTreeMap`/`BTreeSet` collections
//! - Normalize model names on construction, so two keys built from the same
//!   reference string always compare equal

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

// =============================================================================
// MODEL KEY
// =============================================================================

/// Unique identifier for a model type: an application namespace plus a model
/// name, written `app_label.ModelName` in reference strings.
///
/// The model-name component is lowercased on construction. A lazy reference
/// written as `"shop.Order"` and a key built programmatically from
/// `("shop", "Order")` therefore always collide, which is what makes the
/// pending-operation map reliable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    /// Application namespace (left of the dot).
    pub app_label: String,
    /// Model name (right of the dot), stored lowercased.
    pub model_name: String,
}

impl ModelKey {
    /// Create a new key. The model name is lowercased.
    #[must_use]
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.into().to_lowercase(),
        }
    }

    /// Parse a lazy reference string of the form `app_label.ModelName`.
    ///
    /// Returns `LazuliError::InvalidModelReference` unless the string has
    /// exactly one dot separating two non-empty components.
    pub fn parse(reference: &str) -> Result<Self, LazuliError> {
        let mut parts = reference.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app_label), Some(model_name), None)
                if !app_label.is_empty() && !model_name.is_empty() =>
            {
                Ok(Self::new(app_label, model_name))
            }
            _ => Err(LazuliError::InvalidModelReference {
                reference: reference.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model_name)
    }
}

// =============================================================================
// MODEL HANDLE
// =============================================================================

/// Signature of a per-model check hook.
///
/// Hooks receive the handle they are attached to and return any number of
/// diagnostics; they must not panic.
pub type CheckFn = dyn Fn(&ModelHandle) -> Vec<Diagnostic>;

/// How a registered model participates in `check_all_models`.
///
/// The producer records how the hook slot looks at registration time, so the
/// structural `models.E020` condition is an explicit variant rather than
/// something reconstructed by reflection later.
#[derive(Clone)]
pub enum CheckHook {
    /// The model uses the default (empty) check hook.
    Default,
    /// The model supplies its own check hook; it runs during
    /// `check_all_models` and its diagnostics are collected.
    Custom(Rc<CheckFn>),
    /// The hook slot was clobbered by something that is not a check hook.
    /// Produces a single `models.E020` diagnostic.
    Shadowed {
        /// Description of whatever is sitting in the hook slot.
        by: String,
    },
}

impl fmt::Debug for CheckHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("CheckHook::Default"),
            Self::Custom(_) => f.write_str("CheckHook::Custom(..)"),
            Self::Shadowed { by } => write!(f, "CheckHook::Shadowed {{ by: {by:?} }}"),
        }
    }
}

/// A registered model: its key, its original-case object name, and its check
/// hook.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    /// The key this model is registered under.
    pub key: ModelKey,
    /// Original-case object name (e.g. `Order`), used in diagnostics.
    pub object_name: String,
    /// How this model participates in `check_all_models`.
    pub check_hook: CheckHook,
}

impl ModelHandle {
    /// Create a handle with the default check hook.
    #[must_use]
    pub fn new(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
        let object_name = object_name.into();
        Self {
            key: ModelKey::new(app_label, object_name.as_str()),
            object_name,
            check_hook: CheckHook::Default,
        }
    }

    /// Replace the check hook.
    #[must_use]
    pub fn with_check_hook(mut self, hook: CheckHook) -> Self {
        self.check_hook = hook;
        self
    }
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Stable category codes for diagnostics.
///
/// Consumers match and silence diagnostics by these strings; they must be
/// preserved verbatim.
pub mod codes {
    /// A deferred signal subscription names a model that never registered.
    pub const LAZY_SIGNAL_CONNECT: &str = "signals.E001";
    /// A related field's target class names a model that never registered.
    pub const LAZY_FIELD_REFERENCE: &str = "fields.E307";
    /// Any other deferred operation names a model that never registered.
    pub const UNHANDLED_LAZY_REFERENCE: &str = "models.E022";
    /// A model's check hook slot is shadowed by something else.
    pub const CHECK_HOOK_SHADOWED: &str = "models.E020";
}

/// Opaque reference to the thing a diagnostic is about, used by consumers to
/// locate the offending declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticRef {
    /// A registered model.
    Model(ModelKey),
    /// A field, by its declared name.
    Field(String),
    /// A module path (e.g. the module that connected a receiver).
    Module(String),
    /// A deferred operation, by its description.
    Operation(String),
}

/// A structured, machine-identifiable validation message.
///
/// Diagnostics are data, never errors: checks collect them and return the
/// whole batch. Display ordering is lexicographic by message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
    /// What the diagnostic is about.
    pub obj: DiagnosticRef,
    /// Stable category code, see [`codes`].
    pub code: String,
}

impl Diagnostic {
    /// Create a diagnostic with no hint.
    #[must_use]
    pub fn new(message: impl Into<String>, obj: DiagnosticRef, code: &str) -> Self {
        Self {
            message: message.into(),
            hint: None,
            obj,
            code: code.to_owned(),
        }
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Lazuli core.
///
/// - No silent failures
/// - Use `Result<T, LazuliError>` for fallible operations
/// - The core never panics; malformed deferred operations become
///   diagnostics, not errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LazuliError {
    /// A lazy reference string is not of the `app_label.ModelName` form.
    #[error("Invalid model reference '{reference}': must be of the form 'app_label.ModelName'")]
    InvalidModelReference {
        /// The offending reference string.
        reference: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
