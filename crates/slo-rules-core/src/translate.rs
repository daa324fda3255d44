//! Rule-set translation
//!
//! Converts canonical [`Rule`]s into the node shape of a target format. The
//! engine format (used by both the native rule object and the config bundle)
//! embeds the canonical rule unchanged; the remote format has its own node
//! type with typed durations and bare scalar fields.

use std::time::Duration;

use crate::artifact::{AlertNode, RecordNode, RuleNode, ScalarNode};
use crate::duration::{parse_duration, PromDuration};
use crate::model::Rule;

/// `for` duration used when an alert has none or it does not parse
pub const DEFAULT_FOR_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Native rule-engine node, also used inside config bundles
    Engine,
    /// Remote ruler node
    Remote,
}

/// A rule translated for one target format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatRuleNode {
    Engine(Rule),
    Remote(RuleNode),
}

pub fn translate(rule: &Rule, target: TargetFormat) -> FormatRuleNode {
    match target {
        TargetFormat::Engine => FormatRuleNode::Engine(rule.clone()),
        TargetFormat::Remote => FormatRuleNode::Remote(to_rule_node(rule)),
    }
}

/// Resolve an alert's `for` duration
///
/// A malformed value must not block rule delivery, so it degrades to
/// [`DEFAULT_FOR_DURATION`] with a warning.
pub fn resolve_for_duration(raw: Option<&str>) -> Duration {
    match raw {
        None => DEFAULT_FOR_DURATION,
        Some(value) => match parse_duration(value) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!(
                    value = value,
                    error = %e,
                    default = "5m",
                    "Invalid alert for duration, using default"
                );
                DEFAULT_FOR_DURATION
            }
        },
    }
}

/// Convert one rule into the remote ruler node shape
pub fn to_rule_node(rule: &Rule) -> RuleNode {
    match rule {
        Rule::Recording(r) => RuleNode::Record(RecordNode {
            record: ScalarNode::new(&r.record),
            expr: ScalarNode::new(&r.expr),
            labels: r.labels.clone(),
        }),
        Rule::Alerting(a) => RuleNode::Alert(AlertNode {
            alert: ScalarNode::new(&a.alert),
            expr: ScalarNode::new(&a.expr),
            for_duration: PromDuration(resolve_for_duration(a.for_duration.as_deref())),
            labels: a.labels.clone(),
            annotations: a.annotations.clone(),
        }),
    }
}

/// Convert a rule sequence, dropping alerting rules unless `write_alerting_rules`
///
/// Recording rules are never filtered and keep their relative order.
pub fn to_rule_nodes(rules: &[Rule], write_alerting_rules: bool) -> Vec<RuleNode> {
    rules
        .iter()
        .filter(|rule| write_alerting_rules || !rule.is_alerting())
        .map(to_rule_node)
        .collect()
}
