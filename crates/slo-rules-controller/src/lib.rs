//! SLO rule controller
//!
//! Keeps the rule artifact of each ServiceLevelObjective in sync with its
//! store, for exactly one backend per deployment.
//!
//! ## Architecture
//!
//! 1. **Store** (`store/`): the [`ObjectStore`] and [`ObjectiveStore`]
//!    collaborator traits plus an in-memory implementation with
//!    optimistic concurrency.
//!
//! 2. **Client** (`client/`): HTTP client for the remote ruler configuration
//!    API, itself an [`ObjectStore`] of remote rule groups.
//!
//! 3. **Upsert** (`upsert`): get, create on miss, then update with the
//!    current revision token.
//!
//! 4. **Reconciler** (`reconciler`): fetches the objective, builds its
//!    artifact with `slo-rules-core`, upserts it and writes `status.type`.
//!
//! 5. **Metrics** (`metrics`) and **CLI** (`cli/`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slo_rules_controller::{BackendStore, InMemoryStore, Reconciler};
//! use slo_rules_core::{BuildOptions, ConfigMap, ObjectKey, PrecomputedCompiler, ServiceLevelObjective};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let objectives = Arc::new(InMemoryStore::<ServiceLevelObjective>::new());
//! let config_maps = Arc::new(InMemoryStore::<ConfigMap>::new());
//!
//! let reconciler = Reconciler::new(
//!     objectives,
//!     Arc::new(PrecomputedCompiler),
//!     BackendStore::ConfigMap(config_maps),
//!     BuildOptions::default(),
//! );
//! reconciler.reconcile(&ObjectKey::new("team-a", "orders-availability")).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod store;
pub mod upsert;

pub use cli::{ExitCode, SloRulesCli, SloRulesCommands};
pub use client::{RulerClient, RulerClientBuilder, RulerClientConfig};
pub use config::{ConfigError, ControllerConfig, ControllerConfigBuilder};
pub use error::{ReconcileError, Result, Step};
pub use metrics::{ReconcileMetrics, ReconcileMetricsRegistry};
pub use reconciler::{BackendStore, ReconcileOutcome, Reconciler};
pub use store::{InMemoryStore, ObjectStore, ObjectiveStore, StoreError, StoreResult};
pub use upsert::{upsert, UpsertOutcome};

/// Run the CLI application and map failures to an exit code
pub async fn run_cli(cli: SloRulesCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
