//! zb-config
//!
//! Market registry, network lookup and daemon configuration.
//!
//! The built-in registry carries the deployed markets. An optional YAML file
//! can add markets, override a built-in market by name, and tune the
//! runtime (polling interval, indexed source endpoint, chain snapshot
//! directory, selection persistence file).
//!
//! Missing addresses are configuration defects and fail fast with
//! [`ConfigError`]; they are never papered over at runtime.

pub mod selection;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use selection::{
    FileSelectionPersistence, MarketSelection, MemorySelectionPersistence, SelectionPersistence,
    SelectionStore,
};

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 60;

pub const CHAIN_ID_MAINNET: u64 = 1;
pub const CHAIN_ID_SEPOLIA: u64 = 11_155_111;
pub const CHAIN_ID_BASE_SEPOLIA: u64 = 84_532;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Market name is not in the registry.
    UnknownMarket(String),
    /// No network configuration exists for this chain id.
    UnknownChain(u64),
    /// A contract address required by the requested operation is not
    /// configured for the market.
    MissingAddress {
        market: String,
        field: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownMarket(m) => write!(f, "unknown market '{m}'"),
            ConfigError::UnknownChain(id) => write!(f, "no network config for chain id {id}"),
            ConfigError::MissingAddress { market, field } => {
                write!(f, "market '{market}' has no {field} address configured")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Market config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MarketAddresses {
    pub lending_pool_address_provider: String,
    pub lending_pool: String,
    pub ui_pool_data_provider: String,
    #[serde(default)]
    pub ui_incentive_data_provider: Option<String>,
    pub wallet_balance_provider: String,
    #[serde(default)]
    pub weth_gateway: Option<String>,
    #[serde(default)]
    pub faucet: Option<String>,
    #[serde(default)]
    pub collector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct EnabledFeatures {
    pub incentives: bool,
    pub faucet: bool,
    pub governance: bool,
    pub staking: bool,
    pub liquidity_swap: bool,
    pub collateral_repay: bool,
    pub debt_switch: bool,
    pub switch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Registry key, e.g. `test_sepolia_v3`.
    pub market: String,
    pub market_title: String,
    pub chain_id: u64,
    #[serde(default)]
    pub v3: bool,
    #[serde(default)]
    pub permit_disabled: bool,
    #[serde(default)]
    pub is_fork: bool,
    #[serde(default)]
    pub enabled_features: EnabledFeatures,
    pub addresses: MarketAddresses,
}

impl MarketConfig {
    /// The pool address markets are matched and reserve ids are keyed on.
    pub fn pool_address(&self) -> &str {
        &self.addresses.lending_pool
    }

    pub fn pool_address_provider(&self) -> &str {
        &self.addresses.lending_pool_address_provider
    }

    /// Address of the UI incentive data provider.
    ///
    /// Only call this when incentives are enabled for the market; an absent
    /// address is a configuration defect.
    pub fn incentives_provider_address(&self) -> Result<&str, ConfigError> {
        match self.addresses.ui_incentive_data_provider.as_deref() {
            Some(a) if !a.trim().is_empty() => Ok(a),
            _ => Err(ConfigError::MissingAddress {
                market: self.market.clone(),
                field: "UI_INCENTIVE_DATA_PROVIDER",
            }),
        }
    }
}

/// The built-in Sepolia test deployment.
pub fn sepolia_test_market() -> MarketConfig {
    MarketConfig {
        market: "test_sepolia_v3".to_string(),
        market_title: "Sepolia UBC Testnet".to_string(),
        chain_id: CHAIN_ID_SEPOLIA,
        v3: true,
        permit_disabled: true,
        is_fork: false,
        enabled_features: EnabledFeatures::default(),
        addresses: MarketAddresses {
            lending_pool_address_provider: "0xc183d9509425B9f1e08320AE1612C2Ee7de7EC4D".to_string(),
            lending_pool: "0xAf29b85C97B28490E00A090bD1b4B552c69C7559".to_string(),
            ui_pool_data_provider: "0xA5728cB73986B769c8141C19D4bD3A9BF6C31A12".to_string(),
            ui_incentive_data_provider: Some(
                "0x0932948A40a71f9217aD514f846CFfEa8900bF5B".to_string(),
            ),
            wallet_balance_provider: "0x8202E2Ca522c5C28684E6cE23019C48Bc839fa4D".to_string(),
            weth_gateway: Some("0x730Bf3DA68B0Fd3b580Db20823b0bbE5CC58891D".to_string()),
            faucet: Some("0x7CC720646eeaEA8a90cfEBeB311e2352266C94F1".to_string()),
            collector: Some("0xBF47C98efB6a1F2eb52454b4D0404D486Db841D4".to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered set of configured markets. The first entry is the default
/// selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRegistry {
    markets: Vec<MarketConfig>,
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MarketRegistry {
    pub fn builtin() -> Self {
        Self {
            markets: vec![sepolia_test_market()],
        }
    }

    pub fn from_markets(markets: Vec<MarketConfig>) -> Self {
        Self { markets }
    }

    /// Insert `market`, replacing any existing entry with the same name in
    /// place (registry order is preserved).
    pub fn upsert(&mut self, market: MarketConfig) {
        match self.markets.iter_mut().find(|m| m.market == market.market) {
            Some(slot) => *slot = market,
            None => self.markets.push(market),
        }
    }

    pub fn get(&self, name: &str) -> Result<&MarketConfig, ConfigError> {
        self.markets
            .iter()
            .find(|m| m.market == name)
            .ok_or_else(|| ConfigError::UnknownMarket(name.to_string()))
    }

    pub fn first(&self) -> Option<&MarketConfig> {
        self.markets.first()
    }

    pub fn markets(&self) -> &[MarketConfig] {
        &self.markets
    }

    pub fn find_by_chain_id(&self, chain_id: u64) -> Option<&MarketConfig> {
        self.markets.iter().find(|m| m.chain_id == chain_id)
    }
}

// ---------------------------------------------------------------------------
// Network config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub base_asset_symbol: String,
    pub wrapped_base_asset_symbol: String,
    pub is_testnet: bool,
    pub is_fork: bool,
    /// For forks: the chain the fork was taken from.
    pub underlying_chain_id: Option<u64>,
}

impl NetworkConfig {
    fn eth(name: &str, is_testnet: bool) -> Self {
        Self {
            name: name.to_string(),
            base_asset_symbol: "ETH".to_string(),
            wrapped_base_asset_symbol: "WETH".to_string(),
            is_testnet,
            is_fork: false,
            underlying_chain_id: None,
        }
    }

    /// True iff `symbol` is the network's wrapped base asset (case-insensitive).
    pub fn is_wrapped_base_asset(&self, symbol: &str) -> bool {
        symbol.eq_ignore_ascii_case(&self.wrapped_base_asset_symbol)
    }
}

/// Network configuration for a chain id.
pub fn network_config(chain_id: u64) -> Result<NetworkConfig, ConfigError> {
    match chain_id {
        CHAIN_ID_MAINNET => Ok(NetworkConfig::eth("Ethereum", false)),
        CHAIN_ID_SEPOLIA => Ok(NetworkConfig::eth("Ethereum Sepolia", true)),
        CHAIN_ID_BASE_SEPOLIA => Ok(NetworkConfig::eth("Base Sepolia", true)),
        other => Err(ConfigError::UnknownChain(other)),
    }
}

// ---------------------------------------------------------------------------
// Daemon config file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub polling_interval_secs: u64,
    /// GraphQL endpoint of the indexed market source. `None` disables the
    /// indexed source; every market then resolves through the fallback path.
    pub indexed_source_url: Option<String>,
    /// Directory of JSON chain snapshots for the file-backed chain sources.
    pub chain_data_dir: Option<PathBuf>,
    /// Where the last selected market is remembered.
    pub selection_file: Option<PathBuf>,
    /// Added or overriding markets.
    pub markets: Vec<MarketConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            indexed_source_url: None,
            chain_data_dir: None,
            selection_file: None,
            markets: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = serde_yaml::from_str(s).context("parse config yaml")?;
        if cfg.polling_interval_secs == 0 {
            anyhow::bail!("CONFIG_INVALID: polling_interval_secs must be > 0");
        }
        for m in &cfg.markets {
            network_config(m.chain_id)
                .with_context(|| format!("market '{}' references unsupported chain", m.market))?;
        }
        Ok(cfg)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Built-in registry with this file's markets applied on top.
    pub fn registry(&self) -> MarketRegistry {
        let mut reg = MarketRegistry::builtin();
        for m in &self.markets {
            reg.upsert(m.clone());
        }
        reg
    }
}

/// Load the daemon config. `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    let cfg = AppConfig::from_yaml_str(&s)
        .with_context(|| format!("load config file: {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        markets = cfg.markets.len(),
        polling_interval_secs = cfg.polling_interval_secs,
        "config loaded"
    );
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
