//! Control surface over the watched-target registry.
//!
//! Transport layers decode inbound requests into a [`ControlOp`] once, at
//! the boundary, and hand it to [`ControlSurface::apply`]. Validation happens
//! here so a malformed request never reaches the registry.

use crate::models::{Target, TargetKey, TargetValidationError};
use crate::registry::WatchedTargetRegistry;
use std::sync::Arc;
use thiserror::Error;

/// A decoded control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOp {
    /// List every watched target.
    List,
    /// Add a target or replace its addresses.
    Upsert(Target),
    /// Stop watching a target.
    Remove(TargetKey),
}

/// Result of a successfully applied [`ControlOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The watched targets, ordered by key.
    Listed(Vec<Target>),
    /// The registry was updated; there is nothing to return.
    Applied,
}

/// A control request that was rejected before touching the registry.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ValidationError {
    #[from]
    source: TargetValidationError,
}

impl ValidationError {
    /// Name of the request field that failed validation.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.source.field()
    }
}

/// Maps control operations 1:1 onto registry operations.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    registry: Arc<WatchedTargetRegistry>,
}

impl ControlSurface {
    /// Creates a control surface writing to `registry`.
    #[must_use]
    pub fn new(registry: Arc<WatchedTargetRegistry>) -> Self {
        Self { registry }
    }

    /// Applies a control operation.
    ///
    /// An upsert with an empty address list is accepted and removes the
    /// target.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the target identity is incomplete.
    pub fn apply(&self, op: ControlOp) -> Result<ControlOutcome, ValidationError> {
        match op {
            ControlOp::List => Ok(ControlOutcome::Listed(self.registry.snapshot())),
            ControlOp::Upsert(target) => {
                target.validate_target()?;
                self.registry.upsert(target);
                Ok(ControlOutcome::Applied)
            }
            ControlOp::Remove(key) => {
                key.validate_key()?;
                self.registry.remove(&key);
                Ok(ControlOutcome::Applied)
            }
        }
    }
}
