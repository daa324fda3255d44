//! Artifact assembly
//!
//! Pulls the increase, burn-rate and (optionally) generic rule groups from a
//! [`RuleSource`] and shapes them into the artifact for a [`Backend`]. Any
//! collaborator failure aborts the build; the one exception is a generic group
//! whose objective does not support grouping, which is simply left out.

use std::collections::BTreeMap;

use crate::artifact::{
    Artifact, Backend, ConfigMap, PrometheusRule, PrometheusRuleSpec, RemoteRuleGroup,
    CONFIG_MAP_NAME_PREFIX, REMOTE_EVALUATION_INTERVAL,
};
use crate::duration::PromDuration;
use crate::error::{BuildError, Result};
use crate::model::{ObjectMeta, RuleGroup, ServiceLevelObjective};
use crate::objective::RuleSource;
use crate::translate::to_rule_nodes;

/// Switches that shape the built artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Request generic/grouping rules in addition to increase and burn-rate rules
    pub generic_rules: bool,
    /// Forward alerting rules to the remote ruler
    pub write_alerting_rules: bool,
}

/// Name of the config bundle generated for an objective
pub fn config_map_name(objective_name: &str) -> String {
    format!("{}{}", CONFIG_MAP_NAME_PREFIX, objective_name)
}

/// Data key holding the rule file inside a config bundle
pub fn config_map_key(bundle_name: &str) -> String {
    format!("{}.rules.yaml", bundle_name)
}

/// Builds artifacts for one objective
pub struct ArtifactBuilder<'a> {
    objective: &'a ServiceLevelObjective,
    source: &'a dyn RuleSource,
    options: BuildOptions,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(
        objective: &'a ServiceLevelObjective,
        source: &'a dyn RuleSource,
        options: BuildOptions,
    ) -> Self {
        Self {
            objective,
            source,
            options,
        }
    }

    /// Build the artifact for `backend`
    pub fn build(&self, backend: Backend) -> Result<Artifact> {
        Ok(match backend {
            Backend::PrometheusRule => Artifact::PrometheusRule(self.prometheus_rule()?),
            Backend::ConfigMap => Artifact::ConfigMap(self.config_map()?),
            Backend::Mimir => Artifact::RemoteRuleGroup(self.remote_rule_group()?),
        })
    }

    /// Increase and burn-rate groups, plus the generic group when requested
    /// and supported
    pub fn rule_groups(&self) -> Result<Vec<RuleGroup>> {
        let increases = self
            .source
            .increase_rules()
            .map_err(BuildError::IncreaseRules)?;
        let burnrates = self.source.burnrates().map_err(BuildError::Burnrates)?;

        let mut groups = vec![increases, burnrates];

        if self.options.generic_rules {
            match self.source.generic_rules() {
                Ok(generic) => groups.push(generic),
                Err(e) if e.is_grouping_unsupported() => {
                    tracing::debug!(
                        namespace = self.objective.namespace(),
                        name = self.objective.name(),
                        "Grouping unsupported, skipping generic rules"
                    );
                }
                Err(e) => return Err(BuildError::GenericRules(e)),
            }
        }

        Ok(groups)
    }

    pub fn prometheus_rule(&self) -> Result<PrometheusRule> {
        let groups = self.rule_groups()?;
        Ok(PrometheusRule::new(
            self.metadata(self.objective.name()),
            PrometheusRuleSpec { groups },
        ))
    }

    pub fn config_map(&self) -> Result<ConfigMap> {
        let spec = PrometheusRuleSpec {
            groups: self.rule_groups()?,
        };
        let payload = serde_yaml::to_string(&spec)?;

        let name = config_map_name(self.objective.name());
        let mut data = BTreeMap::new();
        data.insert(config_map_key(&name), payload);

        Ok(ConfigMap::new(self.metadata(&name), data))
    }

    /// Flattened group for the remote ruler
    ///
    /// Increase rules come first, then burn-rate rules. Generic rules are not
    /// pushed.
    pub fn remote_rule_group(&self) -> Result<RemoteRuleGroup> {
        let increases = self
            .source
            .increase_rules()
            .map_err(BuildError::IncreaseRules)?;
        let burnrates = self.source.burnrates().map_err(BuildError::Burnrates)?;

        let write_alerts = self.options.write_alerting_rules;
        let mut rules = to_rule_nodes(&increases.rules, write_alerts);
        rules.extend(to_rule_nodes(&burnrates.rules, write_alerts));

        Ok(RemoteRuleGroup {
            namespace: self.objective.name().to_string(),
            name: self.objective.name().to_string(),
            interval: PromDuration(REMOTE_EVALUATION_INTERVAL),
            rules,
        })
    }

    fn metadata(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            namespace: self.objective.namespace().to_string(),
            uid: None,
            resource_version: None,
            labels: self.objective.metadata.labels.clone(),
            owner_references: vec![self.objective.owner_reference()],
        }
    }
}
