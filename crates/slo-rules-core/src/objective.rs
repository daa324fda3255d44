//! Objective collaborator interfaces
//!
//! The burn-rate mathematics lives outside this crate. The artifact builder
//! only needs something that can hand back the three logical rule groups,
//! which is what [`RuleSource`] describes. [`ObjectiveCompiler`] turns a stored
//! [`ServiceLevelObjective`] into such a source.

use serde::{Deserialize, Serialize};

use crate::error::RuleSourceError;
use crate::model::{RuleGroup, ServiceLevelObjective};

/// Produces the rule groups for one objective
pub trait RuleSource {
    /// Recording rules tracking traffic volume
    fn increase_rules(&self) -> Result<RuleGroup, RuleSourceError>;

    /// Multi-window burn-rate recording rules and their alerts
    fn burnrates(&self) -> Result<RuleGroup, RuleSourceError>;

    /// Generic/grouping rules
    ///
    /// Returns [`RuleSourceError::GroupingUnsupported`] when the objective
    /// cannot produce them; callers treat that as "no group".
    fn generic_rules(&self) -> Result<RuleGroup, RuleSourceError>;
}

/// Turns an SLO resource into a [`RuleSource`]
pub trait ObjectiveCompiler: Send + Sync {
    fn compile(
        &self,
        objective: &ServiceLevelObjective,
    ) -> Result<Box<dyn RuleSource + Send + Sync>, RuleSourceError>;
}

/// Rule groups that were computed ahead of time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecomputedRules {
    pub increase: RuleGroup,
    pub burnrates: RuleGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<RuleGroup>,
}

impl RuleSource for PrecomputedRules {
    fn increase_rules(&self) -> Result<RuleGroup, RuleSourceError> {
        Ok(self.increase.clone())
    }

    fn burnrates(&self) -> Result<RuleGroup, RuleSourceError> {
        Ok(self.burnrates.clone())
    }

    fn generic_rules(&self) -> Result<RuleGroup, RuleSourceError> {
        self.generic
            .clone()
            .ok_or(RuleSourceError::GroupingUnsupported)
    }
}

/// Reads [`PrecomputedRules`] from the resource's `spec.rules` field
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedCompiler;

impl PrecomputedCompiler {
    pub const SPEC_FIELD: &'static str = "rules";
}

impl ObjectiveCompiler for PrecomputedCompiler {
    fn compile(
        &self,
        objective: &ServiceLevelObjective,
    ) -> Result<Box<dyn RuleSource + Send + Sync>, RuleSourceError> {
        let raw = objective.spec.get(Self::SPEC_FIELD).ok_or_else(|| {
            RuleSourceError::failed(format!(
                "{} has no spec.{} field",
                objective.metadata.key(),
                Self::SPEC_FIELD
            ))
        })?;

        let rules: PrecomputedRules = serde_json::from_value(raw.clone()).map_err(|e| {
            RuleSourceError::failed(format!("invalid spec.{}: {}", Self::SPEC_FIELD, e))
        })?;

        Ok(Box::new(rules))
    }
}
