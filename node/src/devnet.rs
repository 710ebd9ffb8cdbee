//! # Devnet Bootstrap
//!
//! Turns a [`NodeConfig`] into a live in-memory chain with a deployed
//! registry: assets registered, gate priced, pools seeded and added.

use std::sync::Arc;

use anyhow::{Context, Result};
use synthswap_contracts::{PositionEvent, SynthSwap};
use synthswap_protocol::chain::Chain;
use synthswap_protocol::exchange::FixedRatePool;
use synthswap_protocol::math::AssetPrice;
use synthswap_protocol::settlement::{DelayedSettlementGate, SettlementGate};
use tracing::info;

use crate::config::{parse_price, parse_units, NodeConfig};

/// The chain and the registry deployed on it. The API holds this behind a
/// single mutex, which serializes every transaction.
#[derive(Debug)]
pub struct DevnetNode {
    pub chain: Chain,
    pub swap: SynthSwap,
    /// Concrete handle to the gate, kept for price updates.
    pub gate: Arc<DelayedSettlementGate>,
}

impl DevnetNode {
    /// Builds the devnet described by `config`. Returns the node together
    /// with the events emitted while deploying it.
    pub fn from_config(config: &NodeConfig) -> Result<(Self, Vec<PositionEvent>)> {
        let mut chain = Chain::new(config.genesis_timestamp);

        for asset in &config.assets {
            chain
                .ledger_mut()
                .register_asset(asset.address, asset.symbol.clone(), asset.decimals)
                .with_context(|| format!("failed to register {}", asset.symbol))?;
        }

        let gate = Arc::new(
            DelayedSettlementGate::new(config.settlement.delay_secs, config.settlement.fee_bps)
                .context("failed to configure settlement gate")?,
        );
        for asset in &config.assets {
            if let Some(price) = &asset.synth_price {
                gate.set_price(
                    asset.address,
                    AssetPrice::new(parse_price(price)?, asset.decimals),
                );
            }
        }

        let dyn_gate: Arc<dyn SettlementGate> = gate.clone();
        let mut swap = SynthSwap::new(
            config.registry.address,
            dyn_gate,
            config.registry.initial_vaults,
        );

        for pool_config in &config.pools {
            let mut pool = FixedRatePool::new(pool_config.address, pool_config.fee_bps)
                .with_context(|| format!("failed to configure pool {}", pool_config.address))?;
            for coin in &pool_config.coins {
                let decimals = config.decimals_of(coin.asset);
                pool = pool.with_coin(coin.asset, AssetPrice::new(parse_price(&coin.price)?, decimals));

                let liquidity = parse_units(&coin.liquidity, decimals)?;
                if liquidity > 0 {
                    chain
                        .ledger_mut()
                        .mint(coin.asset, pool_config.address, liquidity)
                        .with_context(|| {
                            format!("failed to seed {} into pool {}", coin.asset, pool_config.address)
                        })?;
                }
            }
            swap.add_synth(pool_config.synth, Arc::new(pool))
                .with_context(|| format!("failed to add synth {}", pool_config.synth))?;
        }

        info!(
            network = %config.network,
            registry = %config.registry.address,
            synths = config.pools.len(),
            vaults = swap.vault_pool().deployed_count(),
            "devnet deployed"
        );
        let events = swap.take_events();
        Ok((Self { chain, swap, gate }, events))
    }
}
