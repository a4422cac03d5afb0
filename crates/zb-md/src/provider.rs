//! Source boundary for market data.
//!
//! One trait per independently polled source. Implementations only fetch;
//! they do not format, transform or reconcile. All traits are object safe so
//! the runtime can hold `Arc<dyn ...>` without knowing the concrete type.

use std::fmt;

use zb_config::{ConfigError, MarketConfig};
use zb_schemas::{Market, RawEmode, ReserveIncentiveRecord, ReservesData, UserReservesData};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a source may return. Transport, API and decode failures are
/// per-source and retried on the next poll; `Config` is a defect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream returned an application-level error.
    Api { code: Option<i64>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required address or setting is missing.
    Config(ConfigError),
}

impl ProviderError {
    pub fn is_config(&self) -> bool {
        matches!(self, ProviderError::Config(_))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "source api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "source api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ConfigError> for ProviderError {
    fn from(e: ConfigError) -> Self {
        ProviderError::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Indexed source
// ---------------------------------------------------------------------------

/// Query context for the indexed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedMarketsRequest {
    pub chain_id: u64,
    pub pool_address: String,
    /// Account whose `userState` should be populated, if any.
    pub user: Option<String>,
}

impl IndexedMarketsRequest {
    pub fn for_market(market: &MarketConfig, user: Option<&str>) -> Self {
        Self {
            chain_id: market.chain_id,
            pool_address: market.pool_address().to_string(),
            user: user.map(str::to_string),
        }
    }
}

/// Pre-aggregated market snapshots. May return markets other than the one
/// requested; matching is the reconciler's job.
#[async_trait::async_trait]
pub trait IndexedMarketSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_markets(&self, req: &IndexedMarketsRequest) -> Result<Vec<Market>, ProviderError>;
}

// ---------------------------------------------------------------------------
// On-chain sources
// ---------------------------------------------------------------------------

/// UI pool data provider reads for one market.
#[async_trait::async_trait]
pub trait PoolDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reserves and base-currency reference data.
    async fn fetch_reserves(&self, market: &MarketConfig) -> Result<ReservesData, ProviderError>;

    /// E-mode categories. Empty for markets without e-modes.
    async fn fetch_emodes(&self, market: &MarketConfig) -> Result<Vec<RawEmode>, ProviderError>;
}

/// UI incentive data provider reads. Callers go through
/// [`fetch_reserve_incentives`] so the feature gate is applied.
#[async_trait::async_trait]
pub trait IncentivesDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_incentives(
        &self,
        market: &MarketConfig,
        provider_address: &str,
    ) -> Result<Vec<ReserveIncentiveRecord>, ProviderError>;
}

/// Per-account reserve positions.
#[async_trait::async_trait]
pub trait UserReservesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_user_reserves(
        &self,
        market: &MarketConfig,
        account: &str,
    ) -> Result<UserReservesData, ProviderError>;
}

/// Incentives for `market`, honoring the market's feature flag.
///
/// Disabled markets get an empty list without calling `provider`. Enabled
/// markets without an incentive provider address fail with
/// [`ProviderError::Config`].
pub async fn fetch_reserve_incentives(
    provider: &dyn IncentivesDataProvider,
    market: &MarketConfig,
) -> Result<Vec<ReserveIncentiveRecord>, ProviderError> {
    if !market.enabled_features.incentives {
        return Ok(Vec::new());
    }
    let address = market.incentives_provider_address()?;
    provider.fetch_incentives(market, address).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zb_config::MarketRegistry;

    #[derive(Default)]
    struct CountingIncentives {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IncentivesDataProvider for CountingIncentives {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_incentives(
            &self,
            _market: &MarketConfig,
            provider_address: &str,
        ) -> Result<Vec<ReserveIncentiveRecord>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ReserveIncentiveRecord {
                underlying_asset: provider_address.to_string(),
                ..Default::default()
            }])
        }
    }

    fn market() -> MarketConfig {
        MarketRegistry::builtin().first().unwrap().clone()
    }

    #[tokio::test]
    async fn disabled_incentives_make_no_call() {
        let p = CountingIncentives::default();
        let m = market();
        assert!(!m.enabled_features.incentives);

        let out = fetch_reserve_incentives(&p, &m).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enabled_incentives_call_provider_with_address() {
        let p = CountingIncentives::default();
        let mut m = market();
        m.enabled_features.incentives = true;

        let out = fetch_reserve_incentives(&p, &m).await.unwrap();
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            out[0].underlying_asset,
            "0x0932948A40a71f9217aD514f846CFfEa8900bF5B"
        );
    }

    #[tokio::test]
    async fn enabled_incentives_without_address_fail_fast() {
        let p = CountingIncentives::default();
        let mut m = market();
        m.enabled_features.incentives = true;
        m.addresses.ui_incentive_data_provider = None;

        let err = fetch_reserve_incentives(&p, &m).await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            err.to_string(),
            "config error: market 'test_sepolia_v3' has no UI_INCENTIVE_DATA_PROVIDER address configured"
        );
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::Api {
            code: Some(400),
            message: "bad query".to_string(),
        };
        assert_eq!(err.to_string(), "source api error code=400: bad query");
        let err = ProviderError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn indexed_request_for_market() {
        let req = IndexedMarketsRequest::for_market(&market(), Some("0xUser"));
        assert_eq!(req.chain_id, 11_155_111);
        assert_eq!(req.pool_address, "0xAf29b85C97B28490E00A090bD1b4B552c69C7559");
        assert_eq!(req.user.as_deref(), Some("0xUser"));
    }
}
