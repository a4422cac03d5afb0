//! Scripted source implementations.
//!
//! Each fetch consumes the next scripted step; once the script runs out the
//! last step repeats. A `Pending` step never resolves, like a request that
//! hangs forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use zb_config::MarketConfig;
use zb_md::{
    IncentivesDataProvider, IndexedMarketSource, IndexedMarketsRequest, PoolDataProvider,
    ProviderError, UserReservesProvider,
};
use zb_schemas::{Market, RawEmode, ReserveIncentiveRecord, ReservesData, UserReservesData};

#[derive(Debug, Clone)]
pub enum Step<T> {
    Ok(T),
    Err(ProviderError),
    Pending,
}

#[derive(Debug)]
pub struct Script<T> {
    steps: Mutex<VecDeque<Step<T>>>,
    last: Mutex<Step<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(Step::Pending),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(vec![Step::Ok(value)])
    }

    pub fn err(e: ProviderError) -> Self {
        Self::new(vec![Step::Err(e)])
    }

    pub fn pending() -> Self {
        Self::new(vec![Step::Pending])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step<T> {
        let mut steps = self.steps.lock().unwrap_or_else(|p| p.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(step) = steps.pop_front() {
            *last = step;
        }
        last.clone()
    }

    pub async fn next(&self) -> Result<T, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Ok(v) => Ok(v),
            Step::Err(e) => Err(e),
            Step::Pending => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub struct ScriptedIndexed {
    pub markets: Script<Vec<Market>>,
}

impl ScriptedIndexed {
    pub fn new(markets: Script<Vec<Market>>) -> Self {
        Self { markets }
    }
}

#[async_trait::async_trait]
impl IndexedMarketSource for ScriptedIndexed {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_markets(&self, _req: &IndexedMarketsRequest) -> Result<Vec<Market>, ProviderError> {
        self.markets.next().await
    }
}

pub struct ScriptedPoolData {
    pub reserves: Script<ReservesData>,
    pub emodes: Script<Vec<RawEmode>>,
}

impl ScriptedPoolData {
    pub fn new(reserves: Script<ReservesData>, emodes: Script<Vec<RawEmode>>) -> Self {
        Self { reserves, emodes }
    }
}

#[async_trait::async_trait]
impl PoolDataProvider for ScriptedPoolData {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_reserves(&self, _market: &MarketConfig) -> Result<ReservesData, ProviderError> {
        self.reserves.next().await
    }

    async fn fetch_emodes(&self, _market: &MarketConfig) -> Result<Vec<RawEmode>, ProviderError> {
        self.emodes.next().await
    }
}

pub struct ScriptedIncentives {
    pub records: Script<Vec<ReserveIncentiveRecord>>,
}

impl ScriptedIncentives {
    pub fn new(records: Script<Vec<ReserveIncentiveRecord>>) -> Self {
        Self { records }
    }
}

#[async_trait::async_trait]
impl IncentivesDataProvider for ScriptedIncentives {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_incentives(
        &self,
        _market: &MarketConfig,
        _provider_address: &str,
    ) -> Result<Vec<ReserveIncentiveRecord>, ProviderError> {
        self.records.next().await
    }
}

pub struct ScriptedUserReserves {
    pub reserves: Script<UserReservesData>,
}

impl ScriptedUserReserves {
    pub fn new(reserves: Script<UserReservesData>) -> Self {
        Self { reserves }
    }
}

#[async_trait::async_trait]
impl UserReservesProvider for ScriptedUserReserves {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_user_reserves(
        &self,
        _market: &MarketConfig,
        _account: &str,
    ) -> Result<UserReservesData, ProviderError> {
        self.reserves.next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn steps_then_repeat_last() {
        let s = Script::new(vec![
            Step::Err(ProviderError::Transport("x".to_string())),
            Step::Ok(1u32),
        ]);
        assert!(s.next().await.is_err());
        assert_eq!(s.next().await.unwrap(), 1);
        assert_eq!(s.next().await.unwrap(), 1);
        assert_eq!(s.calls(), 3);
    }

    #[tokio::test]
    async fn pending_never_resolves() {
        let s: Script<u32> = Script::pending();
        let r = tokio::time::timeout(Duration::from_millis(20), s.next()).await;
        assert!(r.is_err());
    }

    #[tokio::test]
    async fn empty_script_is_pending() {
        let s: Script<u32> = Script::new(vec![]);
        let r = tokio::time::timeout(Duration::from_millis(20), s.next()).await;
        assert!(r.is_err());
    }
}
