//! # CLI Interface
//!
//! Defines the command-line argument structure for `synthswap-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use synthswap_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

/// SynthSwap devnet node.
///
/// Hosts an in-memory chain with a deployed SynthSwap registry, serves the
/// JSON-RPC API and event stream, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "synthswap-node",
    about = "SynthSwap devnet node",
    version,
    propagate_version = true
)]
pub struct SynthSwapNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Write a devnet configuration file to edit and pass to `run`.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the built-in devnet layout is used.
    #[arg(long, short = 'c', env = "SYNTHSWAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the RPC and metrics listeners bind to.
    #[arg(long, env = "SYNTHSWAP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "SYNTHSWAP_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "SYNTHSWAP_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "SYNTHSWAP_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "SYNTHSWAP_LOG_LEVEL", default_value = crate::logging::DEFAULT_FILTER)]
    pub log_level: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the configuration file.
    #[arg(long, short = 'o', default_value = "synthswap.toml")]
    pub path: PathBuf,

    /// Overwrite the file if it already exists.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        SynthSwapNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = SynthSwapNodeCli::try_parse_from(["synthswap-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.rpc_port, 9841);
        assert_eq!(args.metrics_port, 9842);
        assert!(args.config.is_none());
    }

    #[test]
    fn init_takes_path_and_force() {
        let cli =
            SynthSwapNodeCli::try_parse_from(["synthswap-node", "init", "-o", "dev.toml", "--force"])
                .unwrap();
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.path, PathBuf::from("dev.toml"));
        assert!(args.force);
    }
}
