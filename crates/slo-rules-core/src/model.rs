//! Rule and resource model
//!
//! [`Rule`] is the backend-agnostic rule definition produced by the objective
//! collaborator. Its serialized form is the rule-engine node shape
//! (`record`/`alert`, `expr`, `for`, `labels`, `annotations`), so the engine
//! and config-bundle artifacts embed it as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label and annotation sets keep a stable key order so artifacts serialize
/// identically on every reconciliation.
pub type Labels = BTreeMap<String, String>;

/// A recording rule: evaluates `expr` and stores the result as `record`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingRule {
    pub record: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

/// An alerting rule: fires `alert` once `expr` has held for `for_duration`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertingRule {
    pub alert: String,
    pub expr: String,
    /// Raw duration string as supplied by the objective; parsed per backend
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Labels,
}

/// A single rule definition
///
/// A map carrying both `record` and `alert` is neither and fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Recording(RecordingRule),
    Alerting(AlertingRule),
}

impl Rule {
    pub fn recording(record: impl Into<String>, expr: impl Into<String>) -> Self {
        Rule::Recording(RecordingRule {
            record: record.into(),
            expr: expr.into(),
            labels: Labels::new(),
        })
    }

    pub fn alerting(alert: impl Into<String>, expr: impl Into<String>) -> Self {
        Rule::Alerting(AlertingRule {
            alert: alert.into(),
            expr: expr.into(),
            for_duration: None,
            labels: Labels::new(),
            annotations: Labels::new(),
        })
    }

    /// Add a label (builder style)
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Rule::Recording(r) => r.labels.insert(key.into(), value.into()),
            Rule::Alerting(a) => a.labels.insert(key.into(), value.into()),
        };
        self
    }

    /// Set the `for` duration; has no effect on recording rules
    pub fn with_for(mut self, duration: impl Into<String>) -> Self {
        if let Rule::Alerting(a) = &mut self {
            a.for_duration = Some(duration.into());
        }
        self
    }

    /// Add an annotation; has no effect on recording rules
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Rule::Alerting(a) = &mut self {
            a.annotations.insert(key.into(), value.into());
        }
        self
    }

    pub fn expr(&self) -> &str {
        match self {
            Rule::Recording(r) => &r.expr,
            Rule::Alerting(a) => &a.expr,
        }
    }

    pub fn labels(&self) -> &Labels {
        match self {
            Rule::Recording(r) => &r.labels,
            Rule::Alerting(a) => &a.labels,
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, Rule::Alerting(_))
    }
}

/// A named, ordered collection of rules evaluated together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            interval: None,
            rules,
        }
    }
}

/// Namespace/name identity of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Structural link from an artifact to the resource that controls it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

/// Identity metadata shared by every stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Optimistic-concurrency token assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// An object that can live in an object store
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind name used in logs and errors
    const KIND: &'static str;

    fn key(&self) -> ObjectKey;

    /// Metadata, if the object carries any
    fn meta(&self) -> Option<&ObjectMeta>;

    fn meta_mut(&mut self) -> Option<&mut ObjectMeta>;

    fn resource_version(&self) -> Option<&str> {
        self.meta().and_then(|m| m.resource_version.as_deref())
    }

    /// Objects without metadata have no token; this is then a no-op.
    fn set_resource_version(&mut self, version: Option<String>) {
        if let Some(meta) = self.meta_mut() {
            meta.resource_version = version;
        }
    }
}

/// Status sub-resource of a [`ServiceLevelObjective`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveStatus {
    /// Artifact kind last written for this objective
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

/// The declarative SLO resource being reconciled
///
/// `spec` is opaque here: turning it into rule groups is the objective
/// collaborator's job (see [`crate::objective::ObjectiveCompiler`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLevelObjective {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: ObjectiveStatus,
}

impl ServiceLevelObjective {
    pub const API_VERSION: &'static str = "pyrra.dev/v1alpha1";
    pub const KIND: &'static str = "ServiceLevelObjective";

    pub fn new(metadata: ObjectMeta, spec: serde_json::Value) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata,
            spec,
            status: ObjectiveStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Controller owner reference pointing back at this resource
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone().unwrap_or_default(),
            controller: Some(true),
        }
    }
}

impl Resource for ServiceLevelObjective {
    const KIND: &'static str = "ServiceLevelObjective";

    fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    fn meta(&self) -> Option<&ObjectMeta> {
        Some(&self.metadata)
    }

    fn meta_mut(&mut self) -> Option<&mut ObjectMeta> {
        Some(&mut self.metadata)
    }
}
