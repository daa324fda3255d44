//! End-to-end reconciliation against in-memory stores

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use slo_rules_controller::store::Operation;
use slo_rules_controller::{
    BackendStore, InMemoryStore, ObjectStore, ReconcileError, ReconcileOutcome, Reconciler,
    StoreResult, UpsertOutcome,
};
use slo_rules_core::{
    Backend, BuildError, BuildOptions, ConfigMap, ObjectKey, ObjectMeta, ObjectiveCompiler,
    OwnerReference, PrecomputedCompiler, PrometheusRule, PrometheusRuleSpec, RemoteRuleGroup,
    Rule, RuleGroup, RuleNode, RuleSource, RuleSourceError, ServiceLevelObjective,
};

const NAMESPACE: &str = "team-a";
const NAME: &str = "orders-availability";

fn rules(with_generic: bool) -> Value {
    let mut rules = json!({
        "increase": {
            "name": "orders-availability-increase",
            "rules": [
                {"record": "http_requests:increase4w", "expr": "sum by (code) (increase(http_requests_total{job=\"orders\"}[4w]))"},
                {"alert": "SLOMetricAbsent", "expr": "absent(http_requests_total{job=\"orders\"}) == 1", "for": "2m",
                 "labels": {"severity": "critical"}}
            ]
        },
        "burnrates": {
            "name": "orders-availability",
            "rules": [
                {"alert": "ErrorBudgetBurn", "expr": "http_requests:burnrate5m > (14 * (1 - 0.995))", "for": "not-a-duration",
                 "labels": {"severity": "critical", "long": "1h", "short": "5m"},
                 "annotations": {"summary": "orders burning budget"}}
            ]
        }
    });
    if with_generic {
        rules["generic"] = json!({
            "name": "pyrra-orders-availability-generic",
            "rules": [{"record": "pyrra_objective", "expr": "vector(0.995)"}]
        });
    }
    rules
}

fn objective(with_generic: bool) -> ServiceLevelObjective {
    let mut meta = ObjectMeta::new(NAMESPACE, NAME);
    meta.labels.insert("team".to_string(), "orders".to_string());
    ServiceLevelObjective::new(
        meta,
        json!({"target": "99.5", "window": "4w", "rules": rules(with_generic)}),
    )
}

fn key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, NAME)
}

fn config_map_key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, "pyrra-recording-rule-orders-availability")
}

struct Harness<T: slo_rules_core::Resource> {
    objectives: Arc<InMemoryStore<ServiceLevelObjective>>,
    artifacts: Arc<InMemoryStore<T>>,
    reconciler: Reconciler,
    seeded: ServiceLevelObjective,
}

async fn seed(with_generic: bool) -> (Arc<InMemoryStore<ServiceLevelObjective>>, ServiceLevelObjective) {
    let objectives = Arc::new(InMemoryStore::<ServiceLevelObjective>::new());
    let seeded = objectives.insert(objective(with_generic)).await;
    (objectives, seeded)
}

async fn config_map_harness(options: BuildOptions, with_generic: bool) -> Harness<ConfigMap> {
    let (objectives, seeded) = seed(with_generic).await;
    let artifacts = Arc::new(InMemoryStore::<ConfigMap>::new());
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(PrecomputedCompiler),
        BackendStore::ConfigMap(artifacts.clone()),
        options,
    );
    Harness {
        objectives,
        artifacts,
        reconciler,
        seeded,
    }
}

async fn prometheus_rule_harness(options: BuildOptions, with_generic: bool) -> Harness<PrometheusRule> {
    let (objectives, seeded) = seed(with_generic).await;
    let artifacts = Arc::new(InMemoryStore::<PrometheusRule>::new());
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(PrecomputedCompiler),
        BackendStore::PrometheusRule(artifacts.clone()),
        options,
    );
    Harness {
        objectives,
        artifacts,
        reconciler,
        seeded,
    }
}

async fn remote_harness(options: BuildOptions) -> Harness<RemoteRuleGroup> {
    let (objectives, seeded) = seed(false).await;
    let artifacts = Arc::new(InMemoryStore::<RemoteRuleGroup>::new());
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(PrecomputedCompiler),
        BackendStore::Mimir(artifacts.clone()),
        options,
    );
    Harness {
        objectives,
        artifacts,
        reconciler,
        seeded,
    }
}

fn payload(config_map: &ConfigMap) -> PrometheusRuleSpec {
    let raw = &config_map.data["pyrra-recording-rule-orders-availability.rules.yaml"];
    serde_yaml::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_second_pass_updates_identical_artifact() {
    let h = config_map_harness(BuildOptions::default(), false).await;

    let first = h.reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(
        first,
        ReconcileOutcome::Applied {
            backend: Backend::ConfigMap,
            outcome: UpsertOutcome::Created,
        }
    );
    let after_first = h.artifacts.peek(&config_map_key()).await.unwrap();

    let second = h.reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(
        second,
        ReconcileOutcome::Applied {
            backend: Backend::ConfigMap,
            outcome: UpsertOutcome::Updated,
        }
    );
    let after_second = h.artifacts.peek(&config_map_key()).await.unwrap();
    assert_ne!(
        after_first.metadata.resource_version,
        after_second.metadata.resource_version
    );

    // byte-identical apart from the store's revision token
    let render = |mut artifact: ConfigMap| {
        slo_rules_core::Resource::set_resource_version(&mut artifact, None);
        serde_yaml::to_string(&artifact).unwrap()
    };
    assert_eq!(render(after_first), render(after_second));
    assert_eq!(h.artifacts.calls(Operation::Create).await.len(), 1);
    assert_eq!(h.artifacts.calls(Operation::Update).await.len(), 2);
}

#[tokio::test]
async fn test_owner_reference_matches_objective() {
    let h = prometheus_rule_harness(BuildOptions::default(), false).await;
    let seeded = h.seeded.clone();

    h.reconciler.reconcile(&key()).await.unwrap();

    let stored = h.artifacts.peek(&key()).await.unwrap();
    assert_eq!(
        stored.metadata.owner_references,
        vec![OwnerReference {
            api_version: "pyrra.dev/v1alpha1".to_string(),
            kind: "ServiceLevelObjective".to_string(),
            name: NAME.to_string(),
            uid: seeded.metadata.uid.clone().unwrap(),
            controller: Some(true),
        }]
    );
    assert_eq!(stored.metadata.labels["team"], "orders");
    assert_eq!(stored.metadata.namespace, NAMESPACE);
}

#[tokio::test]
async fn test_generic_rules_unsupported_yields_two_groups() {
    let options = BuildOptions {
        generic_rules: true,
        write_alerting_rules: false,
    };
    let h = prometheus_rule_harness(options, false).await;

    h.reconciler.reconcile(&key()).await.unwrap();

    let stored = h.artifacts.peek(&key()).await.unwrap();
    let names: Vec<&str> = stored.spec.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["orders-availability-increase", "orders-availability"]);
}

#[tokio::test]
async fn test_config_map_with_generic_rules() {
    let options = BuildOptions {
        generic_rules: true,
        write_alerting_rules: false,
    };
    let h = config_map_harness(options, true).await;

    h.reconciler.reconcile(&key()).await.unwrap();

    let stored = h.artifacts.peek(&config_map_key()).await.unwrap();
    assert_eq!(stored.metadata.name, "pyrra-recording-rule-orders-availability");
    assert_eq!(
        stored.data.keys().collect::<Vec<_>>(),
        vec!["pyrra-recording-rule-orders-availability.rules.yaml"]
    );

    let spec = payload(&stored);
    assert_eq!(spec.groups.len(), 3);
    assert_eq!(spec.groups[2].name, "pyrra-orders-availability-generic");
    // the engine format carries the source duration untouched
    match &spec.groups[1].rules[0] {
        Rule::Alerting(alert) => assert_eq!(alert.for_duration.as_deref(), Some("not-a-duration")),
        Rule::Recording(rule) => panic!("unexpected recording rule {}", rule.record),
    }
}

#[tokio::test]
async fn test_remote_group_without_alerting_rules() {
    let h = remote_harness(BuildOptions::default()).await;

    h.reconciler.reconcile(&key()).await.unwrap();

    let group = h.artifacts.peek(&ObjectKey::new(NAME, NAME)).await.unwrap();
    assert_eq!(group.name, NAME);
    assert_eq!(group.interval.to_string(), "30s");
    assert_eq!(group.rules.len(), 1);
    assert!(group.rules.iter().all(|r| !r.is_alert()));
    assert_eq!(
        group.rules[0].expr(),
        "sum by (code) (increase(http_requests_total{job=\"orders\"}[4w]))"
    );
}

#[tokio::test]
async fn test_remote_group_orders_increase_before_burnrate() {
    let objectives = Arc::new(InMemoryStore::<ServiceLevelObjective>::new());
    objectives
        .insert(ServiceLevelObjective::new(
            ObjectMeta::new(NAMESPACE, NAME),
            json!({"rules": {
                "increase": {"name": "inc", "rules": [
                    {"record": "a:increase", "expr": "sum(a)"},
                    {"alert": "AAbsent", "expr": "absent(a)"}
                ]},
                "burnrates": {"name": "burn", "rules": [
                    {"alert": "ABurn", "expr": "a:burnrate5m > 1"},
                    {"record": "a:burnrate5m", "expr": "rate(a[5m])"}
                ]}
            }}),
        ))
        .await;
    let groups = Arc::new(InMemoryStore::<RemoteRuleGroup>::new());
    let reconciler = Reconciler::new(
        objectives,
        Arc::new(PrecomputedCompiler),
        BackendStore::Mimir(groups.clone()),
        BuildOptions::default(),
    );

    reconciler.reconcile(&key()).await.unwrap();

    let group = groups.peek(&ObjectKey::new(NAME, NAME)).await.unwrap();
    let records: Vec<String> = group
        .rules
        .iter()
        .map(|r| match r {
            RuleNode::Record(node) => node.record.to_string(),
            RuleNode::Alert(node) => panic!("unexpected alert {}", node.alert),
        })
        .collect();
    assert_eq!(records, vec!["a:increase", "a:burnrate5m"]);
}

#[tokio::test]
async fn test_remote_group_alert_durations() {
    let options = BuildOptions {
        generic_rules: false,
        write_alerting_rules: true,
    };
    let h = remote_harness(options).await;

    h.reconciler.reconcile(&key()).await.unwrap();

    let group = h.artifacts.peek(&ObjectKey::new(NAME, NAME)).await.unwrap();
    let durations: Vec<String> = group
        .rules
        .iter()
        .filter_map(|r| match r {
            RuleNode::Alert(node) => Some(node.for_duration.to_string()),
            RuleNode::Record(_) => None,
        })
        .collect();
    // the malformed burn-rate duration falls back to five minutes
    assert_eq!(durations, vec!["2m", "5m"]);
}

#[tokio::test]
async fn test_missing_objective_is_a_noop() {
    let objectives = Arc::new(InMemoryStore::<ServiceLevelObjective>::new());
    let artifacts = Arc::new(InMemoryStore::<ConfigMap>::new());
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(PrecomputedCompiler),
        BackendStore::ConfigMap(artifacts.clone()),
        BuildOptions::default(),
    );

    let outcome = reconciler.reconcile(&key()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
    assert!(artifacts.journal().await.is_empty());
    assert!(objectives.calls(Operation::UpdateStatus).await.is_empty());
}

#[tokio::test]
async fn test_fetch_error_stops_pass() {
    let h = config_map_harness(BuildOptions::default(), false).await;
    h.artifacts.fail_next(Operation::Get, "connection refused").await;

    let err = h.reconciler.reconcile(&key()).await.unwrap_err();
    assert_eq!(err.step_label(), "get");

    let ops: Vec<Operation> = h
        .artifacts
        .journal()
        .await
        .into_iter()
        .map(|op| op.operation)
        .collect();
    assert_eq!(ops, vec![Operation::Get]);
    assert!(h.objectives.calls(Operation::UpdateStatus).await.is_empty());
}

#[tokio::test]
async fn test_update_after_create_carries_current_token() {
    let h = config_map_harness(BuildOptions::default(), false).await;

    h.reconciler.reconcile(&key()).await.unwrap();

    let creates = h.artifacts.calls(Operation::Create).await;
    let updates = h.artifacts.calls(Operation::Update).await;
    assert_eq!(creates[0].resource_version, None);
    // the first object written to a fresh store gets revision 1
    assert_eq!(updates[0].resource_version.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_status_type_per_backend() {
    let h = prometheus_rule_harness(BuildOptions::default(), false).await;
    h.reconciler.reconcile(&key()).await.unwrap();
    let slo = h.objectives.peek(&key()).await.unwrap();
    assert_eq!(slo.status.artifact_type.as_deref(), Some("PrometheusRule"));

    let h = config_map_harness(BuildOptions::default(), false).await;
    h.reconciler.reconcile(&key()).await.unwrap();
    let slo = h.objectives.peek(&key()).await.unwrap();
    assert_eq!(slo.status.artifact_type.as_deref(), Some("ConfigMap"));

    let h = remote_harness(BuildOptions::default()).await;
    h.reconciler.reconcile(&key()).await.unwrap();
    let slo = h.objectives.peek(&key()).await.unwrap();
    assert_eq!(slo.status.artifact_type.as_deref(), Some("MimirRule"));
}

#[tokio::test]
async fn test_status_failure_keeps_artifact() {
    let h = config_map_harness(BuildOptions::default(), false).await;
    h.objectives
        .fail_next(Operation::UpdateStatus, "status subresource unavailable")
        .await;

    let err = h.reconciler.reconcile(&key()).await.unwrap_err();
    assert_eq!(err.step_label(), "update_status");
    assert!(h.artifacts.peek(&config_map_key()).await.is_some());

    let slo = h.objectives.peek(&key()).await.unwrap();
    assert_eq!(slo.status.artifact_type, None);
}

/// Reports the stored object, then lets another writer bump its revision
struct RacingStore {
    inner: InMemoryStore<ConfigMap>,
}

#[async_trait]
impl ObjectStore<ConfigMap> for RacingStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<ConfigMap> {
        let found = self.inner.get(key).await?;
        self.inner.touch(key).await;
        Ok(found)
    }

    async fn create(&self, object: &ConfigMap) -> StoreResult<ConfigMap> {
        self.inner.create(object).await
    }

    async fn update(&self, object: &ConfigMap) -> StoreResult<ConfigMap> {
        self.inner.update(object).await
    }
}

#[tokio::test]
async fn test_stale_token_surfaces_as_conflict() {
    let (objectives, _) = seed(false).await;
    let store = Arc::new(RacingStore {
        inner: InMemoryStore::new(),
    });
    let reconciler = Reconciler::new(
        objectives,
        Arc::new(PrecomputedCompiler),
        BackendStore::ConfigMap(store.clone()),
        BuildOptions::default(),
    );

    // first pass creates; nothing to race with yet
    reconciler.reconcile(&key()).await.unwrap();

    let err = reconciler.reconcile(&key()).await.unwrap_err();
    assert_eq!(err.step_label(), "update");
    assert!(err.store_error().unwrap().is_conflict());
    // not retried
    assert_eq!(store.inner.calls(Operation::Update).await.len(), 2);
}

/// Never answers
struct StalledStore;

#[async_trait]
impl ObjectStore<PrometheusRule> for StalledStore {
    async fn get(&self, _key: &ObjectKey) -> StoreResult<PrometheusRule> {
        std::future::pending().await
    }

    async fn create(&self, _object: &PrometheusRule) -> StoreResult<PrometheusRule> {
        std::future::pending().await
    }

    async fn update(&self, _object: &PrometheusRule) -> StoreResult<PrometheusRule> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_pass() {
    let (objectives, _) = seed(false).await;
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(PrecomputedCompiler),
        BackendStore::PrometheusRule(Arc::new(StalledStore)),
        BuildOptions::default(),
    );

    let err = reconciler
        .reconcile_until(&key(), tokio::time::sleep(std::time::Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled(ref k) if *k == key()));
    assert!(objectives.calls(Operation::UpdateStatus).await.is_empty());
}

struct FailingSource {
    generic: RuleSourceError,
}

impl RuleSource for FailingSource {
    fn increase_rules(&self) -> Result<RuleGroup, RuleSourceError> {
        Ok(RuleGroup::new("inc", vec![]))
    }

    fn burnrates(&self) -> Result<RuleGroup, RuleSourceError> {
        Ok(RuleGroup::new("burn", vec![]))
    }

    fn generic_rules(&self) -> Result<RuleGroup, RuleSourceError> {
        Err(self.generic.clone())
    }
}

struct FailingCompiler;

impl ObjectiveCompiler for FailingCompiler {
    fn compile(
        &self,
        _objective: &ServiceLevelObjective,
    ) -> Result<Box<dyn RuleSource + Send + Sync>, RuleSourceError> {
        Ok(Box::new(FailingSource {
            generic: RuleSourceError::failed("label matcher missing"),
        }))
    }
}

#[tokio::test]
async fn test_generic_rule_failure_writes_nothing() {
    let (objectives, _) = seed(false).await;
    let artifacts = Arc::new(InMemoryStore::<PrometheusRule>::new());
    let reconciler = Reconciler::new(
        objectives.clone(),
        Arc::new(FailingCompiler),
        BackendStore::PrometheusRule(artifacts.clone()),
        BuildOptions {
            generic_rules: true,
            write_alerting_rules: false,
        },
    );

    let err = reconciler.reconcile(&key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Build(BuildError::GenericRules(_))));
    assert_eq!(
        err.to_string(),
        "failed to get generic rules: label matcher missing"
    );
    assert!(artifacts.journal().await.is_empty());
    assert!(objectives.calls(Operation::UpdateStatus).await.is_empty());
}
