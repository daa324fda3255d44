//! CLI module for the `slo-rules` binary
//!
//! `render` prints the artifact an objective would produce; `sync` runs one
//! reconcile pass against the backend resolved from flags and environment.

pub mod commands;

pub use commands::{LogFormat, SloRulesCli, SloRulesCommands, SyncArgs};

use thiserror::Error;

use slo_rules_core::BuildError;

use crate::config::ConfigError;
use crate::error::ReconcileError;
use crate::store::StoreError;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// The reconcile pass failed at a store call
    ReconcileError = 1,
    /// The pass was interrupted
    Cancelled = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// The objective's rules could not be built into an artifact
    BuildError = 5,
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    FileError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::FileError(_) => ExitCode::FileError,
            CliError::InvalidInput(_) | CliError::Config(_) => ExitCode::InvalidInput,
            CliError::Build(_) => ExitCode::BuildError,
            CliError::Reconcile(ReconcileError::Build(_)) => ExitCode::BuildError,
            CliError::Reconcile(ReconcileError::Cancelled(_)) => ExitCode::Cancelled,
            CliError::Reconcile(ReconcileError::Store { .. }) => ExitCode::ReconcileError,
            CliError::Store(_) => ExitCode::InvalidInput,
            CliError::Output(_) => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: SloRulesCli) -> Result<ExitCode, CliError> {
    match cli.command {
        SloRulesCommands::Render {
            objective,
            backend,
            generic_rules,
            write_alerting_rules,
        } => {
            let options = slo_rules_core::BuildOptions {
                generic_rules,
                write_alerting_rules,
            };
            let mut stdout = std::io::stdout().lock();
            commands::execute_render(&objective, backend, options, &mut stdout)
        }
        SloRulesCommands::Sync { objective, args } => {
            let config = args.resolve(|var| std::env::var(var).ok())?;
            commands::execute_sync(&objective, &config, shutdown_signal()).await
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
