//! Get-or-create-then-update
//!
//! One algorithm serves every backend:
//!
//! 1. fetch the existing artifact by key
//! 2. on `NotFound`, create it and keep the revision token the store assigned
//! 3. on any other fetch error, stop
//! 4. copy the fetched (or freshly assigned) token onto the desired artifact
//! 5. update
//!
//! Because step 2 captures the post-create token, the update that follows a
//! create carries the store's current token and passes its concurrency check.
//! A token that went stale between fetch and update surfaces as a conflict
//! error; it is not retried here.

use slo_rules_core::Resource;

use crate::error::{ReconcileError, Result, Step};
use crate::store::ObjectStore;

/// Whether the artifact was new on this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

/// Make `store` hold `desired`
pub async fn upsert<T, S>(store: &S, mut desired: T) -> Result<UpsertOutcome>
where
    T: Resource,
    S: ObjectStore<T> + ?Sized,
{
    let key = desired.key();

    let (outcome, token) = match store.get(&key).await {
        Ok(existing) => (
            UpsertOutcome::Updated,
            existing.resource_version().map(str::to_owned),
        ),
        Err(e) if e.is_not_found() => {
            tracing::info!(
                kind = T::KIND,
                namespace = %key.namespace,
                name = %key.name,
                "Creating artifact"
            );
            let created = store
                .create(&desired)
                .await
                .map_err(|e| ReconcileError::store(Step::Create, T::KIND, e))?;
            (
                UpsertOutcome::Created,
                created.resource_version().map(str::to_owned),
            )
        }
        Err(e) => return Err(ReconcileError::store(Step::Get, T::KIND, e)),
    };

    desired.set_resource_version(token);

    tracing::info!(
        kind = T::KIND,
        namespace = %key.namespace,
        name = %key.name,
        resource_version = desired.resource_version().unwrap_or(""),
        "Updating artifact"
    );
    store
        .update(&desired)
        .await
        .map_err(|e| ReconcileError::store(Step::Update, T::KIND, e))?;

    Ok(outcome)
}
