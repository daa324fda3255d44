//! Controller configuration
//!
//! Resolved once at startup and handed to the [`crate::Reconciler`].

use thiserror::Error;

use slo_rules_core::{Backend, BuildOptions};

use crate::client::RulerClientConfig;

pub const ENV_BACKEND: &str = "SLO_RULES_BACKEND";
pub const ENV_GENERIC_RULES: &str = "SLO_RULES_GENERIC_RULES";
pub const ENV_WRITE_ALERTING_RULES: &str = "SLO_RULES_WRITE_ALERTING_RULES";
pub const ENV_RULER_URL: &str = "SLO_RULES_RULER_URL";
pub const ENV_RULER_TENANT: &str = "SLO_RULES_RULER_TENANT";
pub const ENV_RULER_TIMEOUT_MS: &str = "SLO_RULES_RULER_TIMEOUT_MS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("backend mimir requires a ruler URL ({ENV_RULER_URL})")]
    MissingRulerUrl,

    #[error("ruler client: {0}")]
    Ruler(String),

    #[error("configured backend {configured} does not match the {store} store")]
    BackendMismatch { configured: Backend, store: Backend },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// The one artifact form this deployment produces
    pub backend: Backend,

    /// Also write the generic rule group when the objective supports it
    pub generic_rules: bool,

    /// Keep alerting rules in remote rule groups
    pub write_alerting_rules: bool,

    /// Remote ruler connection; required for [`Backend::Mimir`]
    pub ruler: Option<RulerClientConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::PrometheusRule,
            generic_rules: false,
            write_alerting_rules: false,
            ruler: None,
        }
    }
}

impl ControllerConfig {
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::new()
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup(ENV_BACKEND) {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid {
                var: ENV_BACKEND,
                message,
            })?,
            None => defaults.backend,
        };

        let ruler = match lookup(ENV_RULER_URL) {
            Some(base_url) => {
                let ruler_defaults = RulerClientConfig::default();
                Some(RulerClientConfig {
                    base_url,
                    tenant_id: lookup(ENV_RULER_TENANT).filter(|t| !t.is_empty()),
                    timeout_ms: lookup(ENV_RULER_TIMEOUT_MS)
                        .map(|v| v.parse().unwrap_or(ruler_defaults.timeout_ms))
                        .unwrap_or(ruler_defaults.timeout_ms),
                })
            }
            None => None,
        };

        let config = Self {
            backend,
            generic_rules: lookup(ENV_GENERIC_RULES)
                .map(|v| v.parse().unwrap_or(defaults.generic_rules))
                .unwrap_or(defaults.generic_rules),
            write_alerting_rules: lookup(ENV_WRITE_ALERTING_RULES)
                .map(|v| v.parse().unwrap_or(defaults.write_alerting_rules))
                .unwrap_or(defaults.write_alerting_rules),
            ruler,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == Backend::Mimir && self.ruler.is_none() {
            return Err(ConfigError::MissingRulerUrl);
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            generic_rules: self.generic_rules,
            write_alerting_rules: self.write_alerting_rules,
        }
    }
}

/// Builder for ControllerConfig
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ControllerConfig::default(),
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn generic_rules(mut self, enabled: bool) -> Self {
        self.config.generic_rules = enabled;
        self
    }

    pub fn write_alerting_rules(mut self, enabled: bool) -> Self {
        self.config.write_alerting_rules = enabled;
        self
    }

    pub fn ruler(mut self, ruler: RulerClientConfig) -> Self {
        self.config.ruler = Some(ruler);
        self
    }

    pub fn build(self) -> Result<ControllerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ControllerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.backend, Backend::PrometheusRule);
        assert!(!config.generic_rules);
        assert!(!config.write_alerting_rules);
        assert!(config.ruler.is_none());
        assert_eq!(config.build_options(), BuildOptions::default());
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = ControllerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_from_lookup_mimir() {
        let config = ControllerConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "mimir"),
            (ENV_WRITE_ALERTING_RULES, "true"),
            (ENV_GENERIC_RULES, "yes-please"),
            (ENV_RULER_URL, "http://mimir:8080"),
            (ENV_RULER_TENANT, "team-a"),
            (ENV_RULER_TIMEOUT_MS, "2500"),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Mimir);
        assert!(config.write_alerting_rules);
        // unparseable booleans fall back to the default
        assert!(!config.generic_rules);

        let ruler = config.ruler.unwrap();
        assert_eq!(ruler.base_url, "http://mimir:8080");
        assert_eq!(ruler.tenant_id.as_deref(), Some("team-a"));
        assert_eq!(ruler.timeout_ms, 2500);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_backend() {
        let err = ControllerConfig::from_lookup(lookup(&[(ENV_BACKEND, "grafana")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_BACKEND, .. }));
    }

    #[test]
    fn test_mimir_requires_ruler() {
        let err = ControllerConfig::from_lookup(lookup(&[(ENV_BACKEND, "mimir")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingRulerUrl);

        assert!(ControllerConfig::builder()
            .backend(Backend::Mimir)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder() {
        let config = ControllerConfig::builder()
            .backend(Backend::ConfigMap)
            .generic_rules(true)
            .build()
            .unwrap();

        assert_eq!(config.backend, Backend::ConfigMap);
        assert_eq!(
            config.build_options(),
            BuildOptions {
                generic_rules: true,
                write_alerting_rules: false,
            }
        );
    }
}
