//! CLI command definitions for `slo-rules`

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slo_rules_core::{
    ArtifactBuilder, Backend, BuildError, BuildOptions, ObjectiveCompiler, PrecomputedCompiler,
    ServiceLevelObjective,
};

use super::{CliError, ExitCode};
use crate::config::{
    ConfigError, ControllerConfig, ENV_BACKEND, ENV_GENERIC_RULES, ENV_RULER_TENANT,
    ENV_RULER_TIMEOUT_MS, ENV_RULER_URL, ENV_WRITE_ALERTING_RULES,
};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::InMemoryStore;

/// SLO rule synthesizer
///
/// Build recording and alerting rule artifacts from ServiceLevelObjective
/// resources and push them to a remote ruler.
#[derive(Parser, Debug)]
#[command(name = "slo-rules")]
#[command(about = "Synthesize and sync SLO rule groups", long_about = None)]
#[command(version)]
pub struct SloRulesCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: SloRulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum SloRulesCommands {
    /// Print the artifact an objective produces
    ///
    /// The objective must carry precomputed rule groups under `spec.rules`.
    Render {
        /// Path to the ServiceLevelObjective YAML file
        #[arg(short, long)]
        objective: PathBuf,

        /// Artifact form: prometheus-rule, config-map or mimir
        #[arg(short, long, default_value_t = Backend::PrometheusRule)]
        backend: Backend,

        /// Include generic rules when the objective supports them
        #[arg(long)]
        generic_rules: bool,

        /// Keep alerting rules in remote rule groups
        #[arg(long)]
        write_alerting_rules: bool,
    },

    /// Run one reconcile pass for an objective against the configured backend
    ///
    /// Flags override the SLO_RULES_* environment variables.
    Sync {
        /// Path to the ServiceLevelObjective YAML file
        #[arg(short, long)]
        objective: PathBuf,

        #[command(flatten)]
        args: SyncArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Backend: prometheus-rule, config-map or mimir
    #[arg(short, long)]
    pub backend: Option<Backend>,

    /// Base URL of the ruler
    #[arg(long)]
    pub ruler_url: Option<String>,

    /// Tenant sent as X-Scope-OrgID
    #[arg(long)]
    pub tenant: Option<String>,

    /// Include generic rules when the objective supports them
    #[arg(long)]
    pub generic_rules: bool,

    /// Keep alerting rules in remote rule groups
    #[arg(long)]
    pub write_alerting_rules: bool,

    /// Ruler request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl SyncArgs {
    /// Resolve the controller configuration, reading unset flags through `env`
    pub fn resolve<F>(&self, env: F) -> Result<ControllerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        ControllerConfig::from_lookup(|var| self.flag(var).or_else(|| env(var)))
    }

    fn flag(&self, var: &str) -> Option<String> {
        match var {
            ENV_BACKEND => self.backend.map(|b| b.to_string()),
            ENV_RULER_URL => self.ruler_url.clone(),
            ENV_RULER_TENANT => self.tenant.clone(),
            ENV_RULER_TIMEOUT_MS => self.timeout_ms.map(|t| t.to_string()),
            ENV_GENERIC_RULES => self.generic_rules.then(|| "true".to_string()),
            ENV_WRITE_ALERTING_RULES => self.write_alerting_rules.then(|| "true".to_string()),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    Text,
    Json,
}

/// Read a ServiceLevelObjective from a YAML file
pub fn load_objective(path: &Path) -> Result<ServiceLevelObjective, CliError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CliError::FileError(format!(
            "Failed to read objective file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let objective: ServiceLevelObjective = serde_yaml::from_str(&content).map_err(|e| {
        CliError::InvalidInput(format!("'{}' is not an objective: {}", path.display(), e))
    })?;

    if objective.name().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "'{}' has no metadata.name",
            path.display()
        )));
    }
    Ok(objective)
}

pub fn execute_render<W: Write>(
    objective: &Path,
    backend: Backend,
    options: BuildOptions,
    out: &mut W,
) -> Result<ExitCode, CliError> {
    let objective = load_objective(objective)?;
    let source = PrecomputedCompiler
        .compile(&objective)
        .map_err(BuildError::Objective)?;

    let artifact = ArtifactBuilder::new(&objective, source.as_ref(), options).build(backend)?;
    let yaml = artifact.to_yaml().map_err(BuildError::Marshal)?;

    out.write_all(yaml.as_bytes())?;
    Ok(ExitCode::Success)
}

/// One reconcile pass of the configured backend, aborted when `shutdown`
/// resolves
pub async fn execute_sync<F>(
    objective: &Path,
    config: &ControllerConfig,
    shutdown: F,
) -> Result<ExitCode, CliError>
where
    F: Future<Output = ()>,
{
    let objective = load_objective(objective)?;
    let key = objective.metadata.key();

    let objectives = Arc::new(InMemoryStore::<ServiceLevelObjective>::new());
    objectives.insert(objective).await;

    let reconciler = Reconciler::for_config(config, objectives, Arc::new(PrecomputedCompiler))?;

    match reconciler.reconcile_until(&key, shutdown).await? {
        ReconcileOutcome::Applied { backend, outcome } => {
            println!("{} {} {}", backend, key, outcome.as_str());
        }
        ReconcileOutcome::Skipped => {
            println!("objective {} not found", key);
        }
    }
    Ok(ExitCode::Success)
}
