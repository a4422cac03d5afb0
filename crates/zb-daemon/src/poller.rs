//! Source polling and the reconcile loop.
//!
//! Every source runs in its own task on its own interval and publishes its
//! latest [`SourceState`], tagged with the selection epoch it was fetched
//! for, on a `watch` channel. A single reconcile task wakes on any channel
//! change, folds the current-epoch states into [`ReconcileInputs`], and
//! publishes the resulting view.
//!
//! Changing the selection aborts the pollers and respawns them for the new
//! epoch. A slot never goes back to an older epoch, and anything still in
//! flight for the old epoch is dropped by the reconcile task's
//! [`EpochWatermark`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use zb_config::MarketSelection;
use zb_md::{
    fetch_reserve_incentives, IncentivesDataProvider, IndexedMarketSource, IndexedMarketsRequest,
    PoolDataProvider, ProviderError, UserReservesProvider,
};
use zb_reconcile::{
    AppDataView, EpochFreshness, EpochTagged, EpochWatermark, ReconcileInputs, Reconciler,
    SourceKind, SourceState,
};
use zb_schemas::{Market, RawEmode, ReserveIncentiveRecord, ReservesData, UserReservesData};

use crate::state::{AppState, BusMsg};

/// A source state tagged with the selection epoch it belongs to.
pub type Tagged<T> = EpochTagged<SourceState<T>>;

type Slot<T> = Arc<watch::Sender<Tagged<T>>>;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The providers the daemon polls.
#[derive(Clone)]
pub struct Sources {
    /// `None` disables the indexed source; every market then resolves
    /// through the fallback path.
    pub indexed: Option<Arc<dyn IndexedMarketSource>>,
    pub pool: Arc<dyn PoolDataProvider>,
    pub incentives: Arc<dyn IncentivesDataProvider>,
    pub user_reserves: Arc<dyn UserReservesProvider>,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Latest-value channels, one per source.
pub struct SourceChannels {
    pub indexed: Slot<Vec<Market>>,
    pub reserves: Slot<ReservesData>,
    pub incentives: Slot<Vec<ReserveIncentiveRecord>>,
    pub emodes: Slot<Vec<RawEmode>>,
    pub user_reserves: Slot<UserReservesData>,
}

fn slot<T>(epoch: u64) -> Slot<T> {
    let (tx, _rx) = watch::channel(EpochTagged::new(epoch, SourceState::Pending));
    Arc::new(tx)
}

/// Store `next` in the slot unless the slot already belongs to a newer
/// epoch. Returns whether the value was stored.
fn publish<T>(tx: &watch::Sender<Tagged<T>>, next: Tagged<T>) -> bool {
    tx.send_if_modified(move |cur| {
        if next.epoch < cur.epoch {
            return false;
        }
        *cur = next;
        true
    })
}

impl SourceChannels {
    pub fn new(epoch: u64) -> Self {
        Self {
            indexed: slot(epoch),
            reserves: slot(epoch),
            incentives: slot(epoch),
            emodes: slot(epoch),
            user_reserves: slot(epoch),
        }
    }

    /// Mark every source pending for `epoch`.
    pub fn reset(&self, epoch: u64) {
        self.indexed.send_replace(EpochTagged::new(epoch, SourceState::Pending));
        self.reserves.send_replace(EpochTagged::new(epoch, SourceState::Pending));
        self.incentives.send_replace(EpochTagged::new(epoch, SourceState::Pending));
        self.emodes.send_replace(EpochTagged::new(epoch, SourceState::Pending));
        self.user_reserves.send_replace(EpochTagged::new(epoch, SourceState::Pending));
    }

    fn subscribe(&self) -> SourceReceivers {
        SourceReceivers {
            indexed: self.indexed.subscribe(),
            reserves: self.reserves.subscribe(),
            incentives: self.incentives.subscribe(),
            emodes: self.emodes.subscribe(),
            user_reserves: self.user_reserves.subscribe(),
        }
    }
}

struct SourceReceivers {
    indexed: watch::Receiver<Tagged<Vec<Market>>>,
    reserves: watch::Receiver<Tagged<ReservesData>>,
    incentives: watch::Receiver<Tagged<Vec<ReserveIncentiveRecord>>>,
    emodes: watch::Receiver<Tagged<Vec<RawEmode>>>,
    user_reserves: watch::Receiver<Tagged<UserReservesData>>,
}

impl SourceReceivers {
    /// Wait for any source to publish. `false` once a channel has closed.
    async fn changed(&mut self) -> bool {
        tokio::select! {
            r = self.indexed.changed() => r.is_ok(),
            r = self.reserves.changed() => r.is_ok(),
            r = self.incentives.changed() => r.is_ok(),
            r = self.emodes.changed() => r.is_ok(),
            r = self.user_reserves.changed() => r.is_ok(),
        }
    }

    fn apply(&mut self, watermark: &EpochWatermark, inputs: &mut ReconcileInputs) {
        take(&mut self.indexed, watermark, &mut inputs.indexed, SourceKind::Indexed);
        take(&mut self.reserves, watermark, &mut inputs.reserves, SourceKind::Reserves);
        take(&mut self.incentives, watermark, &mut inputs.incentives, SourceKind::Incentives);
        take(&mut self.emodes, watermark, &mut inputs.emodes, SourceKind::Emodes);
        take(
            &mut self.user_reserves,
            watermark,
            &mut inputs.user_reserves,
            SourceKind::UserReserves,
        );
    }
}

fn take<T>(
    rx: &mut watch::Receiver<Tagged<T>>,
    watermark: &EpochWatermark,
    slot: &mut SourceState<T>,
    kind: SourceKind,
) {
    let tagged = rx.borrow_and_update();
    match watermark.accept(&*tagged) {
        EpochFreshness::Current => *slot = tagged.value.clone(),
        other => debug!(source = %kind, freshness = ?other, "ignoring update for another selection"),
    }
}

// ---------------------------------------------------------------------------
// Pollers
// ---------------------------------------------------------------------------

/// Poll `fetch` every `interval` and publish the result on `tx`, tagged with
/// `epoch`.
///
/// - A failure after a successful fetch publishes `Stale`: the last value
///   stays usable and the error is reported.
/// - A configuration error is published once and stops the poller; retrying
///   cannot fix it.
/// - The poller exits once its slot has moved on to a newer epoch.
pub fn spawn_source_poller<T, F, Fut>(
    kind: SourceKind,
    epoch: u64,
    interval: Duration,
    tx: Slot<T>,
    fetch: F,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<Arc<T>> = None;

        loop {
            ticker.tick().await;
            let (state, stop) = match fetch().await {
                Ok(v) => {
                    let v = Arc::new(v);
                    last = Some(Arc::clone(&v));
                    debug!(source = %kind, epoch, "source refreshed");
                    (SourceState::Ready(v), false)
                }
                Err(e) if e.is_config() => {
                    error!(source = %kind, epoch, error = %e, "source misconfigured; polling stopped");
                    (SourceState::Failed(e), true)
                }
                Err(e) => match &last {
                    Some(value) => {
                        warn!(source = %kind, epoch, error = %e, "source refresh failed; keeping last value");
                        (
                            SourceState::Stale {
                                value: Arc::clone(value),
                                error: e,
                            },
                            false,
                        )
                    }
                    None => {
                        warn!(source = %kind, epoch, error = %e, "source fetch failed");
                        (SourceState::Failed(e), false)
                    }
                },
            };

            if !publish(&tx, EpochTagged::new(epoch, state)) {
                debug!(source = %kind, epoch, "slot moved to a newer selection; poller exiting");
                return;
            }
            if stop {
                return;
            }
        }
    })
}

/// Reset every channel to pending for `selection` and spawn one poller per
/// source.
///
/// Without an indexed source the indexed channel resolves immediately with
/// no markets. Without an account the user-reserves source is not polled.
pub fn spawn_pollers(
    sources: &Sources,
    channels: &SourceChannels,
    selection: &MarketSelection,
    account: Option<&str>,
    interval: Duration,
) -> Vec<JoinHandle<()>> {
    let epoch = selection.epoch;
    channels.reset(epoch);
    let mut handles = Vec::with_capacity(5);

    match &sources.indexed {
        Some(src) => {
            let src = Arc::clone(src);
            let req = IndexedMarketsRequest::for_market(&selection.market, account);
            handles.push(spawn_source_poller(
                SourceKind::Indexed,
                epoch,
                interval,
                Arc::clone(&channels.indexed),
                move || {
                    let src = Arc::clone(&src);
                    let req = req.clone();
                    async move { src.fetch_markets(&req).await }
                },
            ));
        }
        None => {
            publish(
                &channels.indexed,
                EpochTagged::new(epoch, SourceState::ready(Vec::new())),
            );
        }
    }

    let pool = Arc::clone(&sources.pool);
    let market = selection.market.clone();
    handles.push(spawn_source_poller(
        SourceKind::Reserves,
        epoch,
        interval,
        Arc::clone(&channels.reserves),
        move || {
            let pool = Arc::clone(&pool);
            let market = market.clone();
            async move { pool.fetch_reserves(&market).await }
        },
    ));

    let pool = Arc::clone(&sources.pool);
    let market = selection.market.clone();
    handles.push(spawn_source_poller(
        SourceKind::Emodes,
        epoch,
        interval,
        Arc::clone(&channels.emodes),
        move || {
            let pool = Arc::clone(&pool);
            let market = market.clone();
            async move { pool.fetch_emodes(&market).await }
        },
    ));

    let incentives = Arc::clone(&sources.incentives);
    let market = selection.market.clone();
    handles.push(spawn_source_poller(
        SourceKind::Incentives,
        epoch,
        interval,
        Arc::clone(&channels.incentives),
        move || {
            let incentives = Arc::clone(&incentives);
            let market = market.clone();
            async move { fetch_reserve_incentives(incentives.as_ref(), &market).await }
        },
    ));

    if let Some(account) = account {
        let users = Arc::clone(&sources.user_reserves);
        let market = selection.market.clone();
        let account = account.to_string();
        handles.push(spawn_source_poller(
            SourceKind::UserReserves,
            epoch,
            interval,
            Arc::clone(&channels.user_reserves),
            move || {
                let users = Arc::clone(&users);
                let market = market.clone();
                let account = account.clone();
                async move { users.fetch_user_reserves(&market, &account).await }
            },
        ));
    }

    info!(
        market = %selection.name(),
        epoch,
        pollers = handles.len(),
        interval_secs = interval.as_secs_f64(),
        "source pollers started"
    );
    handles
}

// ---------------------------------------------------------------------------
// Reconcile loop
// ---------------------------------------------------------------------------

/// Recompute the view whenever the selection or any source changes, and
/// publish it when it differs from the last one.
pub fn spawn_reconcile_loop(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut selection_rx = state.selection.subscribe();
        let mut sources = state.channels.subscribe();

        let first = selection_rx.borrow_and_update().clone();
        let mut watermark = EpochWatermark::new(first.epoch);
        let mut inputs = ReconcileInputs::pending(&first, state.account.clone());
        let mut reconciler = Reconciler::new();

        loop {
            let selection = selection_rx.borrow_and_update().clone();
            if selection.epoch > watermark.current() {
                watermark.advance(selection.epoch);
                inputs = ReconcileInputs::pending(&selection, state.account.clone());
                debug!(market = %selection.name(), epoch = selection.epoch, "reconcile inputs reset");
            }

            sources.apply(&watermark, &mut inputs);
            publish_view(&state, reconciler.evaluate(&inputs));

            let open = tokio::select! {
                r = selection_rx.changed() => r.is_ok(),
                open = sources.changed() => open,
            };
            if !open {
                warn!("reconcile loop stopped: channel closed");
                break;
            }
        }
    })
}

fn publish_view(state: &AppState, view: AppDataView) {
    if **state.view.borrow() == view {
        return;
    }
    state.view.send_replace(Arc::new(view.clone()));
    let _ = state.bus.send(BusMsg::View(Box::new(view)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
