//! Error types for reconciliation
//!
//! The first fatal error ends the current pass. Build errors leave the store
//! untouched; store errors after the artifact write (status update) leave the
//! artifact written.

use std::fmt;
use thiserror::Error;

use slo_rules_core::{BuildError, ObjectKey};

use crate::store::StoreError;

/// The store call a [`ReconcileError::Store`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    GetObjective,
    Get,
    Create,
    Update,
    UpdateStatus,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::GetObjective => "get_objective",
            Step::Get => "get",
            Step::Create => "create",
            Step::Update => "update",
            Step::UpdateStatus => "update_status",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Step::GetObjective | Step::Get => "get",
            Step::Create => "create",
            Step::Update => "update",
            Step::UpdateStatus => "update status of",
        };
        f.write_str(verb)
    }
}

/// Main error type for a reconciliation pass
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Building the artifact failed; nothing was written
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A store call failed
    #[error("failed to {step} {kind}: {source}")]
    Store {
        step: Step,
        kind: &'static str,
        #[source]
        source: StoreError,
    },

    /// The caller's shutdown signal fired first
    #[error("reconcile of {0} cancelled")]
    Cancelled(ObjectKey),
}

impl ReconcileError {
    pub fn store(step: Step, kind: &'static str, source: StoreError) -> Self {
        ReconcileError::Store { step, kind, source }
    }

    /// Label used in logs and metrics
    pub fn step_label(&self) -> &'static str {
        match self {
            ReconcileError::Build(_) => "build",
            ReconcileError::Store { step, .. } => step.as_str(),
            ReconcileError::Cancelled(_) => "cancelled",
        }
    }

    /// The underlying store error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReconcileError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for reconciliation
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slo_rules_core::RuleSourceError;

    #[test]
    fn test_store_error_display() {
        let err = ReconcileError::store(
            Step::Update,
            "ConfigMap",
            StoreError::Unavailable("etcd leader lost".into()),
        );
        assert_eq!(
            err.to_string(),
            "failed to update ConfigMap: store unavailable: etcd leader lost"
        );
        assert_eq!(err.step_label(), "update");
        assert!(err.store_error().is_some());
    }

    #[test]
    fn test_status_step_display() {
        let err = ReconcileError::store(
            Step::UpdateStatus,
            "ServiceLevelObjective",
            StoreError::Other("denied".into()),
        );
        assert!(err
            .to_string()
            .starts_with("failed to update status of ServiceLevelObjective"));
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: ReconcileError =
            BuildError::Burnrates(RuleSourceError::failed("no windows")).into();
        assert_eq!(err.to_string(), "failed to get burn rate rules: no windows");
        assert_eq!(err.step_label(), "build");
        assert!(err.store_error().is_none());
    }
}
