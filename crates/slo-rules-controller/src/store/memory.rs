//! In-memory object store
//!
//! Mimics the API-server semantics the reconciler relies on: every write
//! gets a fresh resource version, updates must carry the current version,
//! creates of existing objects fail, and new objects get a UID. Each call is
//! appended to a journal so tests can inspect exactly what was sent.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use slo_rules_core::{ObjectKey, Resource, ServiceLevelObjective};

use super::{ObjectStore, ObjectiveStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
    UpdateStatus,
}

/// One journaled call: the operation, its target, and the revision token the
/// caller sent with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub operation: Operation,
    pub key: ObjectKey,
    pub resource_version: Option<String>,
}

struct State<T> {
    objects: HashMap<ObjectKey, T>,
    revision: u64,
    journal: Vec<StoreOp>,
    failures: HashMap<Operation, String>,
}

pub struct InMemoryStore<T> {
    state: Mutex<State<T>>,
}

impl<T: Resource> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                objects: HashMap::new(),
                revision: 0,
                journal: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    /// Seed an object without journaling; assigns version and UID
    pub async fn insert(&self, mut object: T) -> T {
        let mut state = self.state.lock().await;
        state.revision += 1;
        let version = state.revision.to_string();
        assign_identity(&mut object, version);
        state.objects.insert(object.key(), object.clone());
        object
    }

    /// Current stored copy, without journaling
    pub async fn peek(&self, key: &ObjectKey) -> Option<T> {
        self.state.lock().await.objects.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All calls made so far, oldest first
    pub async fn journal(&self) -> Vec<StoreOp> {
        self.state.lock().await.journal.clone()
    }

    /// Calls of one kind made so far
    pub async fn calls(&self, operation: Operation) -> Vec<StoreOp> {
        self.state
            .lock()
            .await
            .journal
            .iter()
            .filter(|op| op.operation == operation)
            .cloned()
            .collect()
    }

    /// Make the next call of `operation` fail with [`StoreError::Unavailable`]
    pub async fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .insert(operation, message.into());
    }

    /// Bump the stored object's version as if someone else had written it
    pub async fn touch(&self, key: &ObjectKey) -> bool {
        let mut state = self.state.lock().await;
        state.revision += 1;
        let version = state.revision.to_string();
        match state.objects.get_mut(key) {
            Some(object) => {
                object.set_resource_version(Some(version));
                true
            }
            None => false,
        }
    }
}

impl<T> State<T> {
    fn record(&mut self, operation: Operation, key: &ObjectKey, resource_version: Option<&str>) {
        self.journal.push(StoreOp {
            operation,
            key: key.clone(),
            resource_version: resource_version.map(str::to_owned),
        });
    }

    fn injected_failure(&mut self, operation: Operation) -> StoreResult<()> {
        match self.failures.remove(&operation) {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn next_version(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

fn assign_identity<T: Resource>(object: &mut T, version: String) {
    object.set_resource_version(Some(version));
    if let Some(meta) = object.meta_mut() {
        if meta.uid.is_none() {
            meta.uid = Some(Uuid::new_v4().to_string());
        }
    }
}

fn check_version<T: Resource>(sent: &T, stored: &T) -> StoreResult<()> {
    if sent.resource_version() == stored.resource_version() {
        return Ok(());
    }
    Err(StoreError::Conflict {
        kind: T::KIND.to_string(),
        key: sent.key(),
        sent: sent.resource_version().map(str::to_owned),
        stored: stored.resource_version().map(str::to_owned),
    })
}

#[async_trait]
impl<T: Resource> ObjectStore<T> for InMemoryStore<T> {
    async fn get(&self, key: &ObjectKey) -> StoreResult<T> {
        let mut state = self.state.lock().await;
        state.record(Operation::Get, key, None);
        state.injected_failure(Operation::Get)?;

        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(T::KIND, key.clone()))
    }

    async fn create(&self, object: &T) -> StoreResult<T> {
        let key = object.key();
        let mut state = self.state.lock().await;
        state.record(Operation::Create, &key, object.resource_version());
        state.injected_failure(Operation::Create)?;

        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: T::KIND.to_string(),
                key,
            });
        }

        let mut stored = object.clone();
        let version = state.next_version();
        assign_identity(&mut stored, version);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, object: &T) -> StoreResult<T> {
        let key = object.key();
        let mut state = self.state.lock().await;
        state.record(Operation::Update, &key, object.resource_version());
        state.injected_failure(Operation::Update)?;

        let existing = state
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::not_found(T::KIND, key.clone()))?;
        check_version(object, existing)?;
        let uid = existing.meta().and_then(|m| m.uid.clone());

        let mut stored = object.clone();
        stored.set_resource_version(Some(state.next_version()));
        if let Some(meta) = stored.meta_mut() {
            if meta.uid.is_none() {
                meta.uid = uid;
            }
        }
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ObjectiveStore for InMemoryStore<ServiceLevelObjective> {
    async fn get_objective(&self, key: &ObjectKey) -> StoreResult<ServiceLevelObjective> {
        self.get(key).await
    }

    async fn update_status(
        &self,
        objective: &ServiceLevelObjective,
    ) -> StoreResult<ServiceLevelObjective> {
        let key = objective.key();
        let mut state = self.state.lock().await;
        state.record(Operation::UpdateStatus, &key, objective.resource_version());
        state.injected_failure(Operation::UpdateStatus)?;

        let existing = state
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::not_found(ServiceLevelObjective::KIND, key.clone()))?;
        check_version(objective, existing)?;

        let mut stored = existing.clone();
        stored.status = objective.status.clone();
        stored.set_resource_version(Some(state.next_version()));
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}
