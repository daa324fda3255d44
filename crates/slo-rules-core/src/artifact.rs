//! Materialized artifact shapes
//!
//! One variant per backend:
//!
//! - [`PrometheusRule`]: the rule-engine's native custom resource
//! - [`ConfigMap`]: a file-backed bundle holding the rule file text
//! - [`RemoteRuleGroup`]: a rule group pushed to a remote ruler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::duration::PromDuration;
use crate::model::{Labels, ObjectKey, ObjectMeta, Resource, RuleGroup};

pub const PROMETHEUS_RULE_API_VERSION: &str = "monitoring.coreos.com/v1";
pub const PROMETHEUS_RULE_KIND: &str = "PrometheusRule";
pub const CONFIG_MAP_API_VERSION: &str = "v1";
pub const CONFIG_MAP_KIND: &str = "ConfigMap";

/// Prefix of every generated config bundle name
pub const CONFIG_MAP_NAME_PREFIX: &str = "pyrra-recording-rule-";

/// Evaluation interval of every pushed rule group
pub const REMOTE_EVALUATION_INTERVAL: Duration = Duration::from_secs(30);

/// The backend a deployment writes artifacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    PrometheusRule,
    ConfigMap,
    Mimir,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::PrometheusRule, Backend::ConfigMap, Backend::Mimir];

    /// Tag written to the objective's `status.type`
    pub fn status_type(&self) -> &'static str {
        match self {
            Backend::PrometheusRule => "PrometheusRule",
            Backend::ConfigMap => "ConfigMap",
            Backend::Mimir => "MimirRule",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::PrometheusRule => "prometheus-rule",
            Backend::ConfigMap => "config-map",
            Backend::Mimir => "mimir",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "prometheus-rule" | "prometheusrule" | "prometheus" => Ok(Backend::PrometheusRule),
            "config-map" | "configmap" => Ok(Backend::ConfigMap),
            "mimir" | "mimir-rule" | "mimirrule" | "ruler" => Ok(Backend::Mimir),
            other => Err(format!(
                "unknown backend '{}', expected one of: prometheus-rule, config-map, mimir",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusRuleSpec {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

/// Rule-engine native rule object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusRule {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PrometheusRuleSpec,
}

impl PrometheusRule {
    pub fn new(metadata: ObjectMeta, spec: PrometheusRuleSpec) -> Self {
        Self {
            api_version: PROMETHEUS_RULE_API_VERSION.to_string(),
            kind: PROMETHEUS_RULE_KIND.to_string(),
            metadata,
            spec,
        }
    }
}

impl Resource for PrometheusRule {
    const KIND: &'static str = PROMETHEUS_RULE_KIND;

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

/// File-backed configuration bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(metadata: ObjectMeta, data: BTreeMap<String, String>) -> Self {
        Self {
            api_version: CONFIG_MAP_API_VERSION.to_string(),
            kind: CONFIG_MAP_KIND.to_string(),
            metadata,
            data,
        }
    }
}

impl Resource for ConfigMap {
    const KIND: &'static str = CONFIG_MAP_KIND;

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

/// A string emitted as a bare YAML scalar
///
/// serde_yaml writes plain scalars unless the text would resolve to another
/// type (`true`, `1.5`, `null`), and uses literal block style for multi-line
/// text, which is the textual form the ruler expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalarNode(String);

impl ScalarNode {
    pub fn new(value: impl Into<String>) -> Self {
        ScalarNode(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScalarNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording rule in ruler wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordNode {
    pub record: ScalarNode,
    pub expr: ScalarNode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

/// Alerting rule in ruler wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNode {
    pub alert: ScalarNode,
    pub expr: ScalarNode,
    #[serde(rename = "for", default, skip_serializing_if = "PromDuration::is_zero")]
    pub for_duration: PromDuration,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Labels,
}

/// One entry of a pushed rule group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Record(RecordNode),
    Alert(AlertNode),
}

impl RuleNode {
    pub fn is_alert(&self) -> bool {
        matches!(self, RuleNode::Alert(_))
    }

    pub fn expr(&self) -> &str {
        match self {
            RuleNode::Record(r) => r.expr.as_str(),
            RuleNode::Alert(a) => a.expr.as_str(),
        }
    }
}

/// Rule group stored in a remote ruler
///
/// `namespace` addresses the group in the ruler API and is not part of the
/// group document itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRuleGroup {
    #[serde(skip)]
    pub namespace: String,
    pub name: String,
    /// Zero when the ruler omits it and applies its default
    #[serde(default)]
    pub interval: PromDuration,
    #[serde(default)]
    pub rules: Vec<RuleNode>,
}

impl Resource for RemoteRuleGroup {
    const KIND: &'static str = "MimirRuleGroup";

    fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    fn meta(&self) -> Option<&ObjectMeta> {
        None
    }

    fn meta_mut(&mut self) -> Option<&mut ObjectMeta> {
        None
    }
}

/// A fully built artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    PrometheusRule(PrometheusRule),
    ConfigMap(ConfigMap),
    RemoteRuleGroup(RemoteRuleGroup),
}

impl Artifact {
    pub fn backend(&self) -> Backend {
        match self {
            Artifact::PrometheusRule(_) => Backend::PrometheusRule,
            Artifact::ConfigMap(_) => Backend::ConfigMap,
            Artifact::RemoteRuleGroup(_) => Backend::Mimir,
        }
    }

    pub fn key(&self) -> ObjectKey {
        match self {
            Artifact::PrometheusRule(r) => r.key(),
            Artifact::ConfigMap(c) => c.key(),
            Artifact::RemoteRuleGroup(g) => g.key(),
        }
    }

    /// Render the artifact document as YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        match self {
            Artifact::PrometheusRule(r) => serde_yaml::to_string(r),
            Artifact::ConfigMap(c) => serde_yaml::to_string(c),
            Artifact::RemoteRuleGroup(g) => serde_yaml::to_string(g),
        }
    }
}
