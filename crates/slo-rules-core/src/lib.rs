//! SLO rule synthesis
//!
//! Turns the rule groups derived from a Service-Level-Objective into one of
//! three artifact forms:
//!
//! - a native `PrometheusRule` object,
//! - a `ConfigMap` bundle carrying a `<name>.rules.yaml` rule file,
//! - a rule group pushed to a remote ruler (Mimir/Cortex ruler API).
//!
//! ## Architecture
//!
//! 1. **Model** (`model`): canonical [`Rule`] (a recording/alerting tagged
//!    union), [`RuleGroup`], object metadata and the SLO resource itself.
//!
//! 2. **Objective** (`objective`): the collaborator interface that yields the
//!    increase, burn-rate and generic rule groups.
//!
//! 3. **Translate** (`translate`): per-format rule nodes, including the
//!    remote ruler's typed `for` durations with a 5 minute fallback.
//!
//! 4. **Builder** (`builder`): assembles a complete [`Artifact`] with
//!    identity metadata and a controller owner reference.
//!
//! This crate performs no I/O. Storing artifacts is the job of
//! `slo-rules-controller`.
//!
//! ## Example
//!
//! ```rust
//! use slo_rules_core::{
//!     ArtifactBuilder, Backend, BuildOptions, ObjectMeta, PrecomputedRules, Rule, RuleGroup,
//!     ServiceLevelObjective,
//! };
//!
//! let slo = ServiceLevelObjective::new(
//!     ObjectMeta::new("team-a", "orders-availability"),
//!     serde_json::Value::Null,
//! );
//! let rules = PrecomputedRules {
//!     increase: RuleGroup::new("orders-increase", vec![Rule::recording("x:increase4w", "sum(x)")]),
//!     burnrates: RuleGroup::new("orders", vec![]),
//!     generic: None,
//! };
//!
//! let artifact = ArtifactBuilder::new(&slo, &rules, BuildOptions::default())
//!     .build(Backend::ConfigMap)
//!     .unwrap();
//! assert_eq!(artifact.key().name, "pyrra-recording-rule-orders-availability");
//! ```

pub mod artifact;
pub mod builder;
pub mod duration;
pub mod error;
pub mod model;
pub mod objective;
pub mod translate;

pub use artifact::{
    AlertNode, Artifact, Backend, ConfigMap, PrometheusRule, PrometheusRuleSpec, RecordNode,
    RemoteRuleGroup, RuleNode, ScalarNode,
};
pub use builder::{config_map_key, config_map_name, ArtifactBuilder, BuildOptions};
pub use duration::{format_duration, parse_duration, DurationError, PromDuration};
pub use error::{BuildError, RuleSourceError};
pub use model::{
    AlertingRule, Labels, ObjectKey, ObjectMeta, ObjectiveStatus, OwnerReference,
    RecordingRule, Resource, Rule, RuleGroup, ServiceLevelObjective,
};
pub use objective::{ObjectiveCompiler, PrecomputedCompiler, PrecomputedRules, RuleSource};
pub use translate::{
    resolve_for_duration, to_rule_node, to_rule_nodes, translate, FormatRuleNode, TargetFormat,
    DEFAULT_FOR_DURATION,
};
