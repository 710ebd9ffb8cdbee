//! # Node Configuration
//!
//! The devnet is described by a single TOML file: where the registry lives,
//! how many vaults it pre-deploys, the settlement gate's delay, fee and synth
//! prices, and every pool together with its coins and seed liquidity.
//!
//! Prices and liquidity are written as decimal strings of whole units
//! (`"60000"`, `"1.1"`) because TOML integers stop at `i64::MAX` and an
//! 18-decimal balance blows past that almost immediately.
//!
//! ```toml
//! network = "devnet"
//! genesis_timestamp = 1600000000
//! block_time_secs = 0
//!
//! [registry]
//! address = "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a"
//! initial_vaults = 3
//!
//! [settlement]
//! delay_secs = 300
//! fee_bps = 30
//!
//! [[assets]]
//! address = "0x1010101010101010101010101010101010101010"
//! symbol = "sUSD"
//! decimals = 18
//! synth_price = "1"
//!
//! [[pools]]
//! address = "0x3030303030303030303030303030303030303030"
//! synth = "0x1010101010101010101010101010101010101010"
//! fee_bps = 4
//! coins = [
//!     { asset = "0x1010101010101010101010101010101010101010", price = "1", liquidity = "1000000000" },
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use alloy_primitives::Address;
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use synthswap_protocol::config::{
    DEFAULT_INITIAL_VAULTS, DEFAULT_SETTLEMENT_DELAY_SECS, DEVNET_GENESIS_TIMESTAMP, MAX_FEE_BPS,
    NATIVE_ASSET, NATIVE_DECIMALS,
};
use synthswap_protocol::Amount;

/// Decimal places of every configured price.
const PRICE_DECIMALS: u8 = 18;

/// Full devnet description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network identifier reported by `/status`.
    pub network: String,
    /// Chain clock at startup.
    pub genesis_timestamp: u64,
    /// Seconds added to the chain clock on every tick. `0` leaves the clock
    /// to `dev_advanceTime`.
    #[serde(default)]
    pub block_time_secs: u64,
    pub registry: RegistryConfig,
    pub settlement: SettlementConfig,
    /// Tokens to register on the ledger. The native asset is always present.
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
    /// Pools to deploy and add, in order.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub address: Address,
    #[serde(default = "default_initial_vaults")]
    pub initial_vaults: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default = "default_delay")]
    pub delay_secs: u64,
    #[serde(default)]
    pub fee_bps: u32,
}

/// A ledger token. Setting `synth_price` makes it a synth the gate trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synth_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub address: Address,
    /// Synth the pool is added for.
    pub synth: Address,
    #[serde(default)]
    pub fee_bps: u32,
    pub coins: Vec<PoolCoinConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCoinConfig {
    pub asset: Address,
    /// Unit-of-account price of one whole token.
    pub price: String,
    /// Whole tokens minted to the pool at startup.
    #[serde(default = "zero")]
    pub liquidity: String,
}

fn default_initial_vaults() -> usize {
    DEFAULT_INITIAL_VAULTS
}

fn default_delay() -> u64 {
    DEFAULT_SETTLEMENT_DELAY_SECS
}

fn zero() -> String {
    "0".into()
}

impl NodeConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Writes the config as TOML, refusing to clobber an existing file
    /// unless `force` is set.
    pub fn write(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let body = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Structural checks that do not need a running chain.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.network.is_empty(), "network must not be empty");
        ensure!(
            !self.registry.address.is_zero(),
            "registry address must not be zero"
        );
        ensure!(
            self.settlement.fee_bps <= MAX_FEE_BPS,
            "settlement fee {} bps exceeds maximum {}",
            self.settlement.fee_bps,
            MAX_FEE_BPS
        );

        let mut known = HashSet::from([NATIVE_ASSET]);
        let mut synths = HashSet::new();
        for asset in &self.assets {
            ensure!(
                asset.address != NATIVE_ASSET,
                "the native asset is built in and must not be listed"
            );
            ensure!(
                known.insert(asset.address),
                "asset {} listed twice",
                asset.address
            );
            if let Some(price) = &asset.synth_price {
                let parsed = parse_price(price)
                    .with_context(|| format!("bad synth_price for {}", asset.symbol))?;
                ensure!(parsed > 0, "synth_price for {} must be positive", asset.symbol);
                synths.insert(asset.address);
            }
        }

        let mut pools = HashSet::new();
        let mut routed = HashSet::new();
        for pool in &self.pools {
            ensure!(pools.insert(pool.address), "pool {} listed twice", pool.address);
            ensure!(
                synths.contains(&pool.synth),
                "pool {} is for {}, which has no synth_price",
                pool.address,
                pool.synth
            );
            ensure!(
                pool.fee_bps <= MAX_FEE_BPS,
                "pool {} fee {} bps exceeds maximum {}",
                pool.address,
                pool.fee_bps,
                MAX_FEE_BPS
            );
            ensure!(
                pool.coins.iter().any(|c| c.asset == pool.synth),
                "pool {} does not list its synth",
                pool.address
            );
            for coin in &pool.coins {
                ensure!(
                    known.contains(&coin.asset),
                    "pool {} lists unknown asset {}",
                    pool.address,
                    coin.asset
                );
                ensure!(
                    routed.insert(coin.asset),
                    "asset {} is listed by more than one pool",
                    coin.asset
                );
                parse_price(&coin.price)
                    .with_context(|| format!("bad price for {} in pool {}", coin.asset, pool.address))?;
                parse_units(&coin.liquidity, self.decimals_of(coin.asset))
                    .with_context(|| format!("bad liquidity for {} in pool {}", coin.asset, pool.address))?;
            }
        }
        Ok(())
    }

    /// Decimals of a configured asset (or the native asset).
    pub fn decimals_of(&self, asset: Address) -> u8 {
        if asset == NATIVE_ASSET {
            return NATIVE_DECIMALS;
        }
        self.assets
            .iter()
            .find(|a| a.address == asset)
            .map(|a| a.decimals)
            .unwrap_or(NATIVE_DECIMALS)
    }

    /// Built-in four-class devnet: USD, BTC, ETH and EUR, each with a synth
    /// and a pool that trades it against the class's plain coins.
    pub fn devnet() -> Self {
        let synth = |byte: u8, symbol: &str, price: &str| AssetConfig {
            address: Address::repeat_byte(byte),
            symbol: symbol.into(),
            decimals: 18,
            synth_price: Some(price.into()),
        };
        let coin = |byte: u8, symbol: &str, decimals: u8| AssetConfig {
            address: Address::repeat_byte(byte),
            symbol: symbol.into(),
            decimals,
            synth_price: None,
        };
        let listed = |asset: Address, price: &str| PoolCoinConfig {
            asset,
            price: price.into(),
            liquidity: "1000000000".into(),
        };
        let pool = |byte: u8, synth: u8, coins: Vec<PoolCoinConfig>| PoolConfig {
            address: Address::repeat_byte(byte),
            synth: Address::repeat_byte(synth),
            fee_bps: 4,
            coins,
        };
        let at = Address::repeat_byte;

        Self {
            network: "devnet".into(),
            genesis_timestamp: DEVNET_GENESIS_TIMESTAMP,
            block_time_secs: 0,
            registry: RegistryConfig {
                address: at(0x5a),
                initial_vaults: DEFAULT_INITIAL_VAULTS,
            },
            settlement: SettlementConfig {
                delay_secs: DEFAULT_SETTLEMENT_DELAY_SECS,
                fee_bps: 30,
            },
            assets: vec![
                synth(0x10, "sUSD", "1"),
                synth(0x11, "sBTC", "60000"),
                synth(0x12, "sETH", "3000"),
                synth(0x13, "sEUR", "1.1"),
                coin(0x20, "DAI", 18),
                coin(0x21, "USDT", 6),
                coin(0x22, "WBTC", 8),
                coin(0x23, "EURS", 2),
            ],
            pools: vec![
                pool(
                    0x30,
                    0x10,
                    vec![listed(at(0x10), "1"), listed(at(0x20), "1"), listed(at(0x21), "1")],
                ),
                pool(0x31, 0x11, vec![listed(at(0x11), "60000"), listed(at(0x22), "60000")]),
                pool(0x32, 0x12, vec![listed(at(0x12), "3000"), listed(NATIVE_ASSET, "3000")]),
                pool(0x33, 0x13, vec![listed(at(0x13), "1.1"), listed(at(0x23), "1.1")]),
            ],
        }
    }
}

/// Parses a decimal string of whole units into base units with `decimals`
/// places. Extra fractional digits are an error, not a rounding.
pub fn parse_units(value: &str, decimals: u8) -> Result<Amount> {
    let value = value.trim();
    let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
    ensure!(
        !whole.is_empty() || !frac.is_empty(),
        "empty amount {value:?}"
    );
    ensure!(
        whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()),
        "amount {value:?} is not a non-negative decimal"
    );
    ensure!(
        frac.len() <= usize::from(decimals),
        "amount {value:?} has more than {decimals} decimal places"
    );

    let scale = 10u128
        .checked_pow(u32::from(decimals))
        .context("decimals out of range")?;
    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().with_context(|| format!("amount {value:?} is too large"))?
    };
    let frac_scaled: Amount = if frac.is_empty() {
        0
    } else {
        let padding = 10u128.pow(u32::from(decimals) - frac.len() as u32);
        frac.parse::<Amount>()
            .with_context(|| format!("amount {value:?} is too precise"))?
            * padding
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_scaled))
        .with_context(|| format!("amount {value:?} overflows"))
}

/// [`parse_units`] for prices, which are always 18-decimal fixed point.
pub fn parse_price(value: &str) -> Result<Amount> {
    parse_units(value, PRICE_DECIMALS)
}
