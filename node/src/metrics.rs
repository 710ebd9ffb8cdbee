//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use synthswap_contracts::SwapError;

use crate::devnet::DevnetNode;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Committed registry operations, by operation name.
    pub operations_total: IntCounterVec,
    /// Reverted registry operations, by operation name and error kind.
    pub reverts_total: IntCounterVec,
    /// Positions currently minted.
    pub live_positions: IntGauge,
    /// Vaults deployed so far, tenanted or not.
    pub deployed_vaults: IntGauge,
    /// Vaults waiting in the recycle pool.
    pub free_vaults: IntGauge,
    /// Chain timestamp (unix seconds).
    pub chain_timestamp: IntGauge,
    /// Wall-clock time spent executing an RPC call against the chain.
    pub operation_latency_seconds: Histogram,
}

fn register<T: Collector + Clone + 'static>(registry: &Registry, metric: T) -> prometheus::Result<T> {
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("synthswap".into()), None)?;

        let operations_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("operations_total", "Registry operations that committed"),
                &["op"],
            )?,
        )?;
        let reverts_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("reverts_total", "Registry operations that reverted"),
                &["op", "kind"],
            )?,
        )?;
        let live_positions = register(
            &registry,
            IntGauge::new("live_positions", "Positions currently minted")?,
        )?;
        let deployed_vaults = register(
            &registry,
            IntGauge::new("deployed_vaults", "Vaults deployed by the registry")?,
        )?;
        let free_vaults = register(
            &registry,
            IntGauge::new("free_vaults", "Vaults waiting to be reused")?,
        )?;
        let chain_timestamp = register(
            &registry,
            IntGauge::new("chain_timestamp", "Current chain timestamp in unix seconds")?,
        )?;
        let operation_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "operation_latency_seconds",
                    "Time spent executing an RPC call against the chain",
                )
                .buckets(vec![
                    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            operations_total,
            reverts_total,
            live_positions,
            deployed_vaults,
            free_vaults,
            chain_timestamp,
            operation_latency_seconds,
        })
    }

    /// Counts the outcome of one registry operation.
    pub fn record<T>(&self, op: &str, result: &Result<T, SwapError>) {
        match result {
            Ok(_) => self.operations_total.with_label_values(&[op]).inc(),
            Err(err) => self
                .reverts_total
                .with_label_values(&[op, err.kind().as_str()])
                .inc(),
        }
    }

    /// Refreshes the gauges from the current node state.
    pub fn observe(&self, node: &DevnetNode) {
        let pool = node.swap.vault_pool();
        self.live_positions.set(node.swap.live_positions() as i64);
        self.deployed_vaults.set(pool.deployed_count() as i64);
        self.free_vaults.set(pool.free_count() as i64);
        self.chain_timestamp
            .set(i64::try_from(node.chain.now()).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
