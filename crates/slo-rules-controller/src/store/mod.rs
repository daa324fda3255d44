//! Object store collaborators
//!
//! The reconciler never talks to a concrete backend directly. Artifacts go
//! through [`ObjectStore`], SLO resources through [`ObjectiveStore`]. Both
//! report a distinguishable [`StoreError::NotFound`] so callers can branch
//! between create and update.
//!
//! # Implementations
//!
//! - [`memory::InMemoryStore`]: optimistic-concurrency store with an
//!   operation journal, for tests and one-shot CLI runs
//! - [`crate::client::RulerClient`]: the remote ruler HTTP API

pub mod memory;

pub use memory::{InMemoryStore, Operation, StoreOp};

use slo_rules_core::{ObjectKey, Resource, ServiceLevelObjective};
use thiserror::Error;

/// Errors that can occur when interacting with an object store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },

    /// Create was called for an object that already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: ObjectKey },

    /// The revision token did not match the stored one
    #[error("conflict on {kind} {key}: resource version {sent:?} does not match stored {stored:?}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        sent: Option<String>,
        stored: Option<String>,
    },

    /// The store refused or could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn not_found(kind: impl Into<String>, key: ObjectKey) -> Self {
        StoreError::NotFound {
            kind: kind.into(),
            key,
        }
    }

    /// Whether this is the benign "does not exist" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Serialization(format!("YAML error: {}", err))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for one artifact kind
///
/// `create` and `update` return the object as stored, including the
/// revision token the store assigned.
#[async_trait::async_trait]
pub trait ObjectStore<T: Resource>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> StoreResult<T>;

    async fn create(&self, object: &T) -> StoreResult<T>;

    /// Replace an existing object; the object's revision token must match
    async fn update(&self, object: &T) -> StoreResult<T>;
}

/// Read access to SLO resources plus their status sub-resource
#[async_trait::async_trait]
pub trait ObjectiveStore: Send + Sync {
    async fn get_objective(&self, key: &ObjectKey) -> StoreResult<ServiceLevelObjective>;

    /// Persist `objective.status`; the rest of the object is ignored
    async fn update_status(
        &self,
        objective: &ServiceLevelObjective,
    ) -> StoreResult<ServiceLevelObjective>;
}
