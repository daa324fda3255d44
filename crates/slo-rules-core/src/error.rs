//! Error types for rule synthesis
//!
//! Two layers: [`RuleSourceError`] is what the objective collaborator reports,
//! [`BuildError`] is what artifact assembly surfaces to the reconciler.

use thiserror::Error;

/// Errors reported by an objective's rule source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleSourceError {
    /// The objective has no grouping, so generic rules cannot be produced.
    ///
    /// Artifact assembly treats this as "skip the generic group".
    #[error("grouping is not supported for generic rules")]
    GroupingUnsupported,

    /// Any other failure while computing a rule group
    #[error("{0}")]
    Failed(String),
}

impl RuleSourceError {
    /// Create a generic failure
    pub fn failed(msg: impl Into<String>) -> Self {
        RuleSourceError::Failed(msg.into())
    }

    /// Whether this is the non-fatal grouping outcome
    pub fn is_grouping_unsupported(&self) -> bool {
        matches!(self, RuleSourceError::GroupingUnsupported)
    }
}

/// Errors raised while building an artifact
///
/// Any of these aborts construction; no partial artifact is returned.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The resource could not be turned into an objective
    #[error("failed to get objective: {0}")]
    Objective(#[source] RuleSourceError),

    #[error("failed to get increase rules: {0}")]
    IncreaseRules(#[source] RuleSourceError),

    #[error("failed to get burn rate rules: {0}")]
    Burnrates(#[source] RuleSourceError),

    #[error("failed to get generic rules: {0}")]
    GenericRules(#[source] RuleSourceError),

    /// Serializing the config bundle payload failed
    #[error("failed to marshal recording rule: {0}")]
    Marshal(#[from] serde_yaml::Error),
}

/// Result type alias for artifact building
pub type Result<T> = std::result::Result<T, BuildError>;
