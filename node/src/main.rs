// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SynthSwap Devnet Node
//!
//! Entry point for the `synthswap-node` binary. Parses CLI arguments,
//! initializes logging and metrics, deploys the registry on an in-memory
//! chain, and serves the HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`: start the node
//! - `init`: write a devnet configuration file
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod devnet;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;

use cli::{Commands, SynthSwapNodeCli};
use config::NodeConfig;
use devnet::DevnetNode;
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SynthSwapNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the devnet and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format));

    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::devnet(),
    };
    tracing::info!(
        network = %config.network,
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        config = ?args.config,
        "starting synthswap-node"
    );

    // --- Chain and registry ---
    let (node, genesis_events) =
        DevnetNode::from_config(&config).context("failed to deploy devnet")?;

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to create prometheus registry")?);
    node_metrics.observe(&node);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let timestamp = node.chain.now();
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            synthswap_protocol::config::PROTOCOL_VERSION,
        ),
        network: config.network.clone(),
        node: Arc::new(Mutex::new(node)),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };
    for event in &genesis_events {
        tracing::debug!(?event, "genesis event");
    }
    app_state.broadcast(
        genesis_events
            .into_iter()
            .map(|event| api::NodeEvent::Position { timestamp, event }),
    );

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("{}:{}", args.host, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.host, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Chain clock ---
    // With block_time_secs = 0 the clock only moves through dev_advanceTime.
    let clock = (config.block_time_secs > 0).then(|| {
        tokio::spawn(api::clock_loop(
            app_state.clone(),
            Duration::from_secs(config.block_time_secs),
        ))
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    if let Some(clock) = clock {
        clock.abort();
    }
    tracing::info!("synthswap-node stopped");
    Ok(())
}

/// Writes the built-in devnet configuration to disk.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("synthswap_node=info", LogFormat::Pretty);

    let config = NodeConfig::devnet();
    config.write(&args.path, args.force)?;
    tracing::info!(path = %args.path.display(), "configuration written");

    println!("Configuration written.");
    println!("  Path     : {}", args.path.display());
    println!("  Network  : {}", config.network);
    println!("  Registry : {}", config.registry.address);
    println!("  Synths   : {}", config.pools.len());
    println!();
    println!("Start the node with: synthswap-node run -c {}", args.path.display());

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("synthswap-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", synthswap_protocol::config::PROTOCOL_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never fires and the
/// failure is logged.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
