//! File-backed chain sources.
//!
//! For deployments without an indexer or a contract reader, chain snapshots
//! are dropped as JSON files under a per-market directory:
//!
//! ```text
//! <chain_data_dir>/<market>/reserves.json       ReservesData
//! <chain_data_dir>/<market>/incentives.json     [ReserveIncentiveRecord]
//! <chain_data_dir>/<market>/emodes.json         [RawEmode]
//! <chain_data_dir>/<market>/users/<account>.json UserReservesData
//! ```
//!
//! Files are re-read on every fetch, so replacing a file is picked up on the
//! next poll. A missing `emodes.json` means the market has no e-modes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;
use zb_config::MarketConfig;
use zb_md::{IncentivesDataProvider, PoolDataProvider, ProviderError, UserReservesProvider};
use zb_schemas::{RawEmode, ReserveIncentiveRecord, ReservesData, UserReservesData};

#[derive(Debug, Clone)]
pub struct FileChainSource {
    dir: PathBuf,
}

impl FileChainSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn market_dir(&self, market: &MarketConfig) -> PathBuf {
        self.dir.join(&market.market)
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProviderError> {
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Transport(format!("read {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = body.len(), "chain snapshot read");
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("{}: {e}", path.display())))
    }

    async fn read_json_or_default<T: DeserializeOwned + Default>(
        path: &Path,
    ) -> Result<T, ProviderError> {
        match tokio::fs::metadata(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            _ => Self::read_json(path).await,
        }
    }
}

#[async_trait::async_trait]
impl PoolDataProvider for FileChainSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_reserves(&self, market: &MarketConfig) -> Result<ReservesData, ProviderError> {
        Self::read_json(&self.market_dir(market).join("reserves.json")).await
    }

    async fn fetch_emodes(&self, market: &MarketConfig) -> Result<Vec<RawEmode>, ProviderError> {
        Self::read_json_or_default(&self.market_dir(market).join("emodes.json")).await
    }
}

#[async_trait::async_trait]
impl IncentivesDataProvider for FileChainSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_incentives(
        &self,
        market: &MarketConfig,
        _provider_address: &str,
    ) -> Result<Vec<ReserveIncentiveRecord>, ProviderError> {
        Self::read_json_or_default(&self.market_dir(market).join("incentives.json")).await
    }
}

#[async_trait::async_trait]
impl UserReservesProvider for FileChainSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_user_reserves(
        &self,
        market: &MarketConfig,
        account: &str,
    ) -> Result<UserReservesData, ProviderError> {
        let path = self
            .market_dir(market)
            .join("users")
            .join(format!("{}.json", account.to_lowercase()));
        Self::read_json_or_default(&path).await
    }
}
