//! Market reconciler.
//!
//! Combines the latest state of every source into one [`AppDataView`].
//! Evaluation never blocks and never fails: an unresolved or failed source
//! only keeps the parts that depend on it unavailable.
//!
//! Derived artifacts (formatted reserves, e-modes, aggregate metrics, the
//! fallback market, the id-enriched indexed market) are memoized by the
//! pointer identity of their `Arc` inputs. A source that re-publishes the
//! same `Arc` costs nothing; a new `Arc` recomputes.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use zb_config::{MarketConfig, MarketSelection, NetworkConfig};
use zb_md::aggregate::parse_usd;
use zb_md::{build_fallback_market, compute_aggregate_metrics, format_emodes, format_reserves};
use zb_md::{AggregateMetrics, FallbackMarket};
use zb_schemas::{
    reserve_id, FormattedEmode, FormattedReserve, Market, RawEmode, ReserveIncentiveRecord,
    ReservesData, UserReservesData,
};

use crate::machine::{classify, ClassifyInputs, IndexedStatus, ReconcileState};
use crate::source::{SourceError, SourceKind, SourceState};
use crate::view::AppDataView;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Latest state of every source for one market selection.
#[derive(Debug, Clone)]
pub struct ReconcileInputs {
    pub epoch: u64,
    pub market: MarketConfig,
    pub network: NetworkConfig,
    /// Connected account. Without one, user reserves are not required.
    pub account: Option<String>,

    pub indexed: SourceState<Vec<Market>>,
    pub reserves: SourceState<ReservesData>,
    pub incentives: SourceState<Vec<ReserveIncentiveRecord>>,
    pub emodes: SourceState<Vec<RawEmode>>,
    pub user_reserves: SourceState<UserReservesData>,
}

impl ReconcileInputs {
    /// All sources pending for `selection`.
    pub fn pending(selection: &MarketSelection, account: Option<String>) -> Self {
        Self {
            epoch: selection.epoch,
            market: selection.market.clone(),
            network: selection.network.clone(),
            account,
            indexed: SourceState::Pending,
            reserves: SourceState::Pending,
            incentives: SourceState::Pending,
            emodes: SourceState::Pending,
            user_reserves: SourceState::Pending,
        }
    }

    fn errors(&self) -> Vec<SourceError> {
        let all = [
            (SourceKind::Indexed, self.indexed.error()),
            (SourceKind::Reserves, self.reserves.error()),
            (SourceKind::Incentives, self.incentives.error()),
            (SourceKind::Emodes, self.emodes.error()),
            (SourceKind::UserReserves, self.user_reserves.error()),
        ];
        all.into_iter()
            .filter_map(|(source, e)| {
                e.map(|e| SourceError {
                    source,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn raw_pending(&self) -> bool {
        self.reserves.is_pending() || self.incentives.is_pending() || self.emodes.is_pending()
    }

    fn user_pending(&self) -> bool {
        self.account.is_some() && self.user_reserves.is_pending()
    }
}

// ---------------------------------------------------------------------------
// Memo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Everything derived from the three raw chain sources.
#[derive(Debug)]
struct RawMemo {
    reserves: Arc<ReservesData>,
    incentives: Arc<Vec<ReserveIncentiveRecord>>,
    emodes: Arc<Vec<RawEmode>>,
    pool: String,
    network: NetworkConfig,

    formatted: Arc<Vec<FormattedReserve>>,
    e_modes: Arc<BTreeMap<u8, FormattedEmode>>,
    metrics: Arc<AggregateMetrics>,
    /// Built on first use; most refreshes of an indexed market never need it.
    fallback: Option<Arc<FallbackMarket>>,
}

impl RawMemo {
    fn matches(
        &self,
        reserves: &Arc<ReservesData>,
        incentives: &Arc<Vec<ReserveIncentiveRecord>>,
        emodes: &Arc<Vec<RawEmode>>,
        pool: &str,
        network: &NetworkConfig,
    ) -> bool {
        Arc::ptr_eq(&self.reserves, reserves)
            && Arc::ptr_eq(&self.incentives, incentives)
            && Arc::ptr_eq(&self.emodes, emodes)
            && self.pool == pool
            && &self.network == network
    }
}

#[derive(Debug)]
struct IndexedMemo {
    markets: Arc<Vec<Market>>,
    pool: String,
    matched: Option<Arc<Market>>,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Reconciler {
    raw: Option<RawMemo>,
    indexed: Option<IndexedMemo>,
    stats: CacheStats,
    last_state: Option<(u64, ReconcileState)>,
}

/// The matching indexed market with every reserve id assigned.
fn enrich_indexed(markets: &[Market], pool: &str) -> Option<Market> {
    let found = markets.iter().find(|m| m.has_address(pool))?;
    let mut market = found.clone();
    for r in market
        .supply_reserves
        .iter_mut()
        .chain(market.borrow_reserves.iter_mut())
    {
        r.id = reserve_id(&found.address, &r.underlying_token.address);
    }
    Some(market)
}

/// Sum of `borrowInfo.total.usd` over the market's borrow reserves, and
/// whether any value was unparseable.
fn indexed_total_borrows(market: &Market) -> (Decimal, bool) {
    let mut total = Decimal::ZERO;
    let mut degraded = false;
    for r in &market.borrow_reserves {
        let Some(b) = &r.borrow_info else { continue };
        match parse_usd(&b.total.usd) {
            Some(v) => match total.checked_add(v) {
                Some(sum) => total = sum,
                None => {
                    warn!(reserve = %r.id, usd = %b.total.usd, "indexed borrow total overflows; counted as zero");
                    degraded = true;
                }
            },
            None => {
                warn!(reserve = %r.id, usd = %b.total.usd, "unparseable indexed borrow total counted as zero");
                degraded = true;
            }
        }
    }
    (total, degraded)
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memo hits and misses for the raw-source derivations.
    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    fn indexed_market(&mut self, markets: &Arc<Vec<Market>>, pool: &str) -> Option<Arc<Market>> {
        if let Some(m) = &self.indexed {
            if Arc::ptr_eq(&m.markets, markets) && m.pool == pool {
                return m.matched.clone();
            }
        }
        let matched = enrich_indexed(markets, pool).map(Arc::new);
        debug!(
            pool = %pool,
            markets = markets.len(),
            matched = matched.is_some(),
            "indexed markets scanned"
        );
        self.indexed = Some(IndexedMemo {
            markets: Arc::clone(markets),
            pool: pool.to_string(),
            matched: matched.clone(),
        });
        matched
    }

    fn raw_memo(&mut self, inputs: &ReconcileInputs) -> Option<&mut RawMemo> {
        let (Some(reserves), Some(incentives), Some(emodes)) = (
            inputs.reserves.value(),
            inputs.incentives.value(),
            inputs.emodes.value(),
        ) else {
            return None;
        };
        let pool = inputs.market.pool_address();

        let hit = self
            .raw
            .as_ref()
            .is_some_and(|m| m.matches(reserves, incentives, emodes, pool, &inputs.network));

        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            let formatted = format_reserves(&reserves.reserves_data, incentives, &inputs.network);
            let metrics = compute_aggregate_metrics(&formatted);
            let e_modes = format_emodes(&reserves.reserves_data, emodes);
            self.raw = Some(RawMemo {
                reserves: Arc::clone(reserves),
                incentives: Arc::clone(incentives),
                emodes: Arc::clone(emodes),
                pool: pool.to_string(),
                network: inputs.network.clone(),
                formatted: Arc::new(formatted),
                e_modes: Arc::new(e_modes),
                metrics: Arc::new(metrics),
                fallback: None,
            });
        }
        self.raw.as_mut()
    }

    /// Compute the view for `inputs`.
    pub fn evaluate(&mut self, inputs: &ReconcileInputs) -> AppDataView {
        let pool = inputs.market.pool_address().to_string();

        let (indexed_status, indexed_market) = match &inputs.indexed {
            SourceState::Pending => (IndexedStatus::Pending, None),
            SourceState::Failed(_) => (IndexedStatus::NoMatch, None),
            SourceState::Ready(markets) | SourceState::Stale { value: markets, .. } => {
                match self.indexed_market(markets, &pool) {
                    Some(m) => (IndexedStatus::Matched, Some(m)),
                    None => (IndexedStatus::NoMatch, None),
                }
            }
        };

        let raw = self.raw_memo(inputs).map(|memo| {
            let fallback = memo
                .fallback
                .get_or_insert_with(|| {
                    Arc::new(build_fallback_market(&memo.formatted, &memo.pool, &memo.network))
                })
                .clone();
            (
                Arc::clone(&memo.formatted),
                Arc::clone(&memo.e_modes),
                Arc::clone(&memo.metrics),
                fallback,
            )
        });

        let state = classify(ClassifyInputs {
            indexed: indexed_status,
            raw_available: raw.is_some(),
        });

        let mut view = AppDataView::initial(inputs.market.market.clone(), inputs.epoch);
        view.state = state;
        view.errors = inputs.errors();

        let mut shows_fallback = false;
        match (state, &indexed_market, &raw) {
            (ReconcileState::UsingIndexed, Some(m), _) => {
                let (total, degraded) = indexed_total_borrows(m);
                view.market = Some(Market::clone(m));
                view.total_borrows = Some(total);
                view.degraded = degraded;
                view.e_mode_categories = m.e_mode_categories.clone();
                view.user_state = m.user_state.clone();
            }
            // While the indexed source is still pending, raw data is shown
            // provisionally.
            (ReconcileState::UsingFallback | ReconcileState::IndexedPending, _, Some((_, _, _, fb))) => {
                view.market = Some(fb.market.clone());
                shows_fallback = true;
            }
            _ => {}
        }

        if let Some((formatted, e_modes, metrics, _)) = &raw {
            if view.total_borrows.is_none() {
                view.total_borrows = Some(metrics.total_borrows);
            }
            // Raw USD values only feed the exposed numbers through the fallback.
            if shows_fallback {
                view.degraded |= metrics.is_degraded();
            }
            view.reserves = formatted.as_ref().clone();
            view.e_modes = e_modes.as_ref().clone();
        }

        if let Some(m) = &view.market {
            view.supply_reserves = m.supply_reserves.clone();
            view.borrow_reserves = m.borrow_reserves.clone();
        }

        if let Some(data) = inputs.reserves.value() {
            let base = &data.base_currency_data;
            if !base.market_reference_currency_price_in_usd.trim().is_empty() {
                view.market_reference_price_in_usd =
                    base.market_reference_currency_price_in_usd.clone();
            }
            view.market_reference_currency_decimals = base.market_reference_currency_decimals;
        }

        if inputs.account.is_some() {
            if let Some(user) = inputs.user_reserves.value() {
                view.user_reserves = user.user_reserves.clone();
                view.user_emode_category_id = user.user_emode_category_id;
            }
        }

        view.loading = view.market.is_none() || inputs.raw_pending() || inputs.user_pending();

        self.log_transition(inputs, &view);
        view
    }

    fn log_transition(&mut self, inputs: &ReconcileInputs, view: &AppDataView) {
        let key = (inputs.epoch, view.state);
        if self.last_state == Some(key) {
            return;
        }
        info!(
            market = %inputs.market.market,
            epoch = inputs.epoch,
            state = view.state.as_str(),
            loading = view.loading,
            supply = view.supply_reserves.len(),
            borrow = view.borrow_reserves.len(),
            "reconcile state changed"
        );
        self.last_state = Some(key);
    }
}
