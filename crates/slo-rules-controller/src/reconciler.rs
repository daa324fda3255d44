//! Reconcile dispatcher
//!
//! One [`Reconciler`] serves one deployment and therefore one backend. A pass
//! fetches the objective, builds the backend's artifact, upserts it and then
//! records the backend in the objective's `status.type`.
//!
//! Passes hold no state of their own; running one twice against an unchanged
//! objective writes the same artifact twice.

use std::future::Future;
use std::sync::Arc;

use slo_rules_core::{
    ArtifactBuilder, Backend, BuildError, BuildOptions, ConfigMap, ObjectKey, ObjectiveCompiler,
    PrometheusRule, RemoteRuleGroup, ServiceLevelObjective,
};

use crate::client::RulerClient;
use crate::config::{ConfigError, ControllerConfig};
use crate::error::{ReconcileError, Result, Step};
use crate::metrics::ReconcileMetrics;
use crate::store::{InMemoryStore, ObjectStore, ObjectiveStore};
use crate::upsert::{upsert, UpsertOutcome};

/// The artifact store of the configured backend
#[derive(Clone)]
pub enum BackendStore {
    PrometheusRule(Arc<dyn ObjectStore<PrometheusRule>>),
    ConfigMap(Arc<dyn ObjectStore<ConfigMap>>),
    Mimir(Arc<dyn ObjectStore<RemoteRuleGroup>>),
}

impl BackendStore {
    pub fn backend(&self) -> Backend {
        match self {
            BackendStore::PrometheusRule(_) => Backend::PrometheusRule,
            BackendStore::ConfigMap(_) => Backend::ConfigMap,
            BackendStore::Mimir(_) => Backend::Mimir,
        }
    }

    /// Build the store of `config.backend`
    ///
    /// Mimir talks to the configured ruler. There is no cluster client, so
    /// PrometheusRule and ConfigMap artifacts land in an in-memory store.
    pub fn from_config(config: &ControllerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let store = match config.backend {
            Backend::PrometheusRule => {
                BackendStore::PrometheusRule(Arc::new(InMemoryStore::<PrometheusRule>::new()))
            }
            Backend::ConfigMap => BackendStore::ConfigMap(Arc::new(InMemoryStore::<ConfigMap>::new())),
            Backend::Mimir => {
                let ruler = config.ruler.clone().ok_or(ConfigError::MissingRulerUrl)?;
                let client =
                    RulerClient::with_config(ruler).map_err(|e| ConfigError::Ruler(e.to_string()))?;
                BackendStore::Mimir(Arc::new(client))
            }
        };
        tracing::debug!(backend = %config.backend, "Backend store ready");
        Ok(store)
    }
}

impl std::fmt::Debug for BackendStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BackendStore").field(&self.backend()).finish()
    }
}

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The objective no longer exists
    Skipped,
    Applied {
        backend: Backend,
        outcome: UpsertOutcome,
    },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Skipped => "skipped",
            ReconcileOutcome::Applied { outcome, .. } => outcome.as_str(),
        }
    }
}

pub struct Reconciler {
    objectives: Arc<dyn ObjectiveStore>,
    compiler: Arc<dyn ObjectiveCompiler>,
    backend: BackendStore,
    options: BuildOptions,
    metrics: Option<Arc<ReconcileMetrics>>,
}

impl Reconciler {
    pub fn new(
        objectives: Arc<dyn ObjectiveStore>,
        compiler: Arc<dyn ObjectiveCompiler>,
        backend: BackendStore,
        options: BuildOptions,
    ) -> Self {
        Self {
            objectives,
            compiler,
            backend,
            options,
            metrics: None,
        }
    }

    /// Take the build options from `config`
    ///
    /// `backend` must be the store of `config.backend`.
    pub fn from_config(
        config: &ControllerConfig,
        objectives: Arc<dyn ObjectiveStore>,
        compiler: Arc<dyn ObjectiveCompiler>,
        backend: BackendStore,
    ) -> std::result::Result<Self, ConfigError> {
        if backend.backend() != config.backend {
            return Err(ConfigError::BackendMismatch {
                configured: config.backend,
                store: backend.backend(),
            });
        }
        Ok(Self::new(objectives, compiler, backend, config.build_options()))
    }

    /// Build the backend store from `config` as well
    pub fn for_config(
        config: &ControllerConfig,
        objectives: Arc<dyn ObjectiveStore>,
        compiler: Arc<dyn ObjectiveCompiler>,
    ) -> std::result::Result<Self, ConfigError> {
        let backend = BackendStore::from_config(config)?;
        Self::from_config(config, objectives, compiler, backend)
    }

    pub fn with_metrics(mut self, metrics: Arc<ReconcileMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend.backend()
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Run one pass for the objective at `key`
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let backend = self.backend();
        let _timer = self
            .metrics
            .as_ref()
            .map(|m| m.start_timer(backend.as_str()));

        tracing::debug!(
            namespace = %key.namespace,
            name = %key.name,
            backend = %backend,
            "Reconciling"
        );

        let result = self.reconcile_inner(key).await;

        match &result {
            Ok(outcome) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_pass(backend.as_str(), outcome.as_str());
                }
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %key.namespace,
                    name = %key.name,
                    backend = %backend,
                    step = e.step_label(),
                    error = %e,
                    "Reconcile failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(backend.as_str(), e.step_label());
                }
            }
        }

        result
    }

    /// Run one pass unless `shutdown` resolves first
    ///
    /// Whatever call is in flight when `shutdown` fires is dropped.
    pub async fn reconcile_until<F>(&self, key: &ObjectKey, shutdown: F) -> Result<ReconcileOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.reconcile(key) => result,
            _ = shutdown => {
                tracing::info!(namespace = %key.namespace, name = %key.name, "Reconcile cancelled");
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(self.backend().as_str(), "cancelled");
                }
                Err(ReconcileError::Cancelled(key.clone()))
            }
        }
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let objective = match self.objectives.get_objective(key).await {
            Ok(objective) => objective,
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    namespace = %key.namespace,
                    name = %key.name,
                    "Objective not found, nothing to do"
                );
                return Ok(ReconcileOutcome::Skipped);
            }
            Err(e) => {
                return Err(ReconcileError::store(
                    Step::GetObjective,
                    ServiceLevelObjective::KIND,
                    e,
                ))
            }
        };

        let outcome = match &self.backend {
            BackendStore::PrometheusRule(store) => {
                let desired = self.build(&objective, |b| b.prometheus_rule())?;
                upsert(store.as_ref(), desired).await?
            }
            BackendStore::ConfigMap(store) => {
                let desired = self.build(&objective, |b| b.config_map())?;
                upsert(store.as_ref(), desired).await?
            }
            BackendStore::Mimir(store) => {
                let desired = self.build(&objective, |b| b.remote_rule_group())?;
                upsert(store.as_ref(), desired).await?
            }
        };

        self.write_status(objective).await?;

        Ok(ReconcileOutcome::Applied {
            backend: self.backend(),
            outcome,
        })
    }

    fn build<T, F>(&self, objective: &ServiceLevelObjective, f: F) -> Result<T>
    where
        F: FnOnce(&ArtifactBuilder<'_>) -> std::result::Result<T, BuildError>,
    {
        let source = self
            .compiler
            .compile(objective)
            .map_err(BuildError::Objective)?;
        let builder = ArtifactBuilder::new(objective, source.as_ref(), self.options);
        Ok(f(&builder)?)
    }

    async fn write_status(&self, mut objective: ServiceLevelObjective) -> Result<()> {
        let status_type = self.backend().status_type();
        objective.status.artifact_type = Some(status_type.to_string());

        tracing::debug!(
            namespace = objective.namespace(),
            name = objective.name(),
            status_type,
            "Updating objective status"
        );
        self.objectives
            .update_status(&objective)
            .await
            .map_err(|e| ReconcileError::store(Step::UpdateStatus, ServiceLevelObjective::KIND, e))?;
        Ok(())
    }
}
