//! Market selection state.
//!
//! The active market is an immutable [`MarketSelection`] value owned by a
//! single [`SelectionStore`]. Changing the market goes through
//! [`SelectionStore::select`], which produces a new selection with a higher
//! epoch and remembers the choice through an injected
//! [`SelectionPersistence`] port.
//!
//! The epoch lets downstream consumers discard results fetched for a
//! selection that is no longer active.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{network_config, ConfigError, MarketConfig, MarketRegistry, NetworkConfig};

// ---------------------------------------------------------------------------
// Persistence port
// ---------------------------------------------------------------------------

/// Remembers the last selected market name across restarts.
pub trait SelectionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, market: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSelection {
    selected_market: String,
}

/// JSON file persistence (`{"selected_market": "..."}`).
#[derive(Debug, Clone)]
pub struct FileSelectionPersistence {
    path: PathBuf,
}

impl FileSelectionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SelectionPersistence for FileSelectionPersistence {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read selection file: {}", self.path.display()))?;
        let p: PersistedSelection = serde_json::from_str(&s)
            .with_context(|| format!("parse selection file: {}", self.path.display()))?;
        Ok(Some(p.selected_market))
    }

    fn save(&self, market: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create selection dir: {}", dir.display()))?;
            }
        }
        let body = serde_json::to_string_pretty(&PersistedSelection {
            selected_market: market.to_string(),
        })?;
        fs::write(&self.path, body)
            .with_context(|| format!("write selection file: {}", self.path.display()))
    }
}

/// In-process persistence, for tests and for runs without a selection file.
#[derive(Debug, Default)]
pub struct MemorySelectionPersistence {
    inner: Mutex<Option<String>>,
}

impl MemorySelectionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saved(market: &str) -> Self {
        Self {
            inner: Mutex::new(Some(market.to_string())),
        }
    }
}

impl SelectionPersistence for MemorySelectionPersistence {
    fn load(&self) -> Result<Option<String>> {
        let g = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("selection mutex poisoned"))?;
        Ok(g.clone())
    }

    fn save(&self, market: &str) -> Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("selection mutex poisoned"))?;
        *g = Some(market.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Selection value
// ---------------------------------------------------------------------------

/// The active market together with its network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSelection {
    /// Increments on every successful [`SelectionStore::select`].
    pub epoch: u64,
    pub market: MarketConfig,
    pub network: NetworkConfig,
}

impl MarketSelection {
    fn new(epoch: u64, market: &MarketConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            epoch,
            market: market.clone(),
            network: network_config(market.chain_id)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.market.market
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SelectionStore {
    registry: MarketRegistry,
    persistence: Box<dyn SelectionPersistence>,
    current: MarketSelection,
}

impl SelectionStore {
    /// Restore the persisted selection if it names a registered market,
    /// otherwise start at the first registered market.
    pub fn restore(
        registry: MarketRegistry,
        persistence: Box<dyn SelectionPersistence>,
    ) -> Result<Self> {
        let saved = match persistence.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "could not load persisted market selection; using default");
                None
            }
        };

        let market = match saved.as_deref().map(|name| registry.get(name)) {
            Some(Ok(m)) => m,
            Some(Err(e)) => {
                warn!(error = %e, "persisted market no longer configured; using default");
                registry.first().context("market registry is empty")?
            }
            None => registry.first().context("market registry is empty")?,
        };

        let current = MarketSelection::new(0, market)?;
        info!(market = %current.name(), chain_id = current.market.chain_id, "market selection restored");

        Ok(Self {
            registry,
            persistence,
            current,
        })
    }

    pub fn current(&self) -> &MarketSelection {
        &self.current
    }

    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }

    /// Switch to `name`, returning the new selection.
    ///
    /// Unknown names are rejected and leave the current selection untouched.
    /// A persistence failure is logged but does not undo the switch.
    pub fn select(&mut self, name: &str) -> Result<MarketSelection, ConfigError> {
        let market = self.registry.get(name)?;
        let next = MarketSelection::new(self.current.epoch + 1, market)?;

        if let Err(e) = self.persistence.save(name) {
            warn!(market = %name, error = %e, "failed to persist market selection");
        }

        info!(market = %name, epoch = next.epoch, "market selected");
        self.current = next.clone();
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MarketAddresses, CHAIN_ID_BASE_SEPOLIA};

    fn custom_market() -> MarketConfig {
        MarketConfig {
            market: "custom_base_sepolia".to_string(),
            market_title: "Custom".to_string(),
            chain_id: CHAIN_ID_BASE_SEPOLIA,
            v3: true,
            permit_disabled: false,
            is_fork: false,
            enabled_features: Default::default(),
            addresses: MarketAddresses {
                lending_pool_address_provider: "0x11".to_string(),
                lending_pool: "0x12".to_string(),
                ui_pool_data_provider: "0x13".to_string(),
                ui_incentive_data_provider: None,
                wallet_balance_provider: "0x14".to_string(),
                weth_gateway: None,
                faucet: None,
                collector: None,
            },
        }
    }

    fn registry() -> MarketRegistry {
        let mut reg = MarketRegistry::builtin();
        reg.upsert(custom_market());
        reg
    }

    #[test]
    fn restore_defaults_to_first_market() {
        let store =
            SelectionStore::restore(registry(), Box::new(MemorySelectionPersistence::new()))
                .unwrap();
        assert_eq!(store.current().name(), "test_sepolia_v3");
        assert_eq!(store.current().epoch, 0);
    }

    #[test]
    fn restore_uses_persisted_market() {
        let p = MemorySelectionPersistence::with_saved("custom_base_sepolia");
        let store = SelectionStore::restore(registry(), Box::new(p)).unwrap();
        assert_eq!(store.current().name(), "custom_base_sepolia");
        assert_eq!(store.current().network.name, "Base Sepolia");
    }

    #[test]
    fn restore_ignores_stale_persisted_market() {
        let p = MemorySelectionPersistence::with_saved("proto_removed_v3");
        let store = SelectionStore::restore(registry(), Box::new(p)).unwrap();
        assert_eq!(store.current().name(), "test_sepolia_v3");
    }

    #[test]
    fn select_produces_new_selection_and_bumps_epoch() {
        let mut store =
            SelectionStore::restore(registry(), Box::new(MemorySelectionPersistence::new()))
                .unwrap();
        let before = store.current().clone();

        let next = store.select("custom_base_sepolia").unwrap();
        assert_eq!(next.epoch, before.epoch + 1);
        assert_eq!(store.current(), &next);
        // The old value is untouched.
        assert_eq!(before.name(), "test_sepolia_v3");
    }

    #[test]
    fn select_unknown_market_keeps_current() {
        let mut store =
            SelectionStore::restore(registry(), Box::new(MemorySelectionPersistence::new()))
                .unwrap();
        let err = store.select("nope").unwrap_err();
        assert_eq!(err, ConfigError::UnknownMarket("nope".to_string()));
        assert_eq!(store.current().epoch, 0);
        assert_eq!(store.current().name(), "test_sepolia_v3");
    }

    #[test]
    fn file_persistence_round_trips_across_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("selection.json");

        let mut store = SelectionStore::restore(
            registry(),
            Box::new(FileSelectionPersistence::new(&path)),
        )
        .unwrap();
        store.select("custom_base_sepolia").unwrap();
        assert!(path.exists());

        let restored = SelectionStore::restore(
            registry(),
            Box::new(FileSelectionPersistence::new(&path)),
        )
        .unwrap();
        assert_eq!(restored.current().name(), "custom_base_sepolia");
    }

    #[test]
    fn corrupt_selection_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        fs::write(&path, "not json").unwrap();

        let store =
            SelectionStore::restore(registry(), Box::new(FileSelectionPersistence::new(&path)))
                .unwrap();
        assert_eq!(store.current().name(), "test_sepolia_v3");
    }
}
