//! `slo-rules` CLI
//!
//! # Usage
//!
//! ```bash
//! # Print the ConfigMap an objective produces
//! slo-rules render --objective slo.yaml --backend config-map --generic-rules
//!
//! # Push the objective's rule group to a Mimir ruler
//! slo-rules sync --objective slo.yaml --ruler-url http://mimir:8080 --tenant team-a
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: A store or ruler call failed
//! - 2: Interrupted
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 5: Rules could not be built
//! - 10: Internal error

use clap::Parser;
use slo_rules_controller::cli::LogFormat;
use slo_rules_controller::{run_cli, SloRulesCli};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = SloRulesCli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}
