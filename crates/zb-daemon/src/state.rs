//! Shared runtime state for zb-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The selection store is
//! the only mutable piece behind a lock; everything else is published through
//! channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use zb_config::{ConfigError, MarketSelection, SelectionStore};
use zb_reconcile::AppDataView;

use crate::poller::{spawn_pollers, spawn_reconcile_loop, SourceChannels, Sources};

// ---------------------------------------------------------------------------
// BusMsg (SSE event bus payload)
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    View(Box<AppDataView>),
    Selection { market: String, epoch: u64 },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::View(_) => "view",
            BusMsg::Selection { .. } => "selection",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

struct Pollers {
    sources: Sources,
    interval: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Registry plus the active selection.
    pub store: Arc<RwLock<SelectionStore>>,
    /// Latest selection, for the reconcile loop.
    pub selection: watch::Sender<MarketSelection>,
    pub channels: SourceChannels,
    /// Latest view model.
    pub view: watch::Sender<Arc<AppDataView>>,
    /// Account whose positions are tracked, if any.
    pub account: Option<String>,
    pollers: Option<Pollers>,
}

impl AppState {
    /// State without sources: nothing is polled and every source stays
    /// pending.
    pub fn new(store: SelectionStore) -> Self {
        Self::build(store, None, None)
    }

    pub fn with_sources(
        store: SelectionStore,
        sources: Sources,
        interval: Duration,
        account: Option<String>,
    ) -> Self {
        let pollers = Pollers {
            sources,
            interval,
            handles: Mutex::new(Vec::new()),
        };
        Self::build(store, Some(pollers), account)
    }

    fn build(store: SelectionStore, pollers: Option<Pollers>, account: Option<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let current = store.current().clone();
        let (selection, _) = watch::channel(current.clone());
        let (view, _) = watch::channel(Arc::new(AppDataView::initial(
            current.name(),
            current.epoch,
        )));

        Self {
            bus,
            build: BuildInfo {
                service: "zb-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store: Arc::new(RwLock::new(store)),
            selection,
            channels: SourceChannels::new(current.epoch),
            view,
            account,
            pollers,
        }
    }

    /// Spawn the reconcile loop and the pollers for the current selection.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let current = self.selection.borrow().clone();
        self.restart_pollers(&current);
        spawn_reconcile_loop(Arc::clone(self))
    }

    pub fn current_view(&self) -> Arc<AppDataView> {
        self.view.borrow().clone()
    }

    /// Switch the active market.
    ///
    /// Unknown names leave everything untouched. On success the pollers are
    /// respawned for the new epoch and a `selection` event is broadcast.
    pub async fn select(&self, name: &str) -> Result<MarketSelection, ConfigError> {
        let next = {
            let mut store = self.store.write().await;
            let next = store.select(name)?;
            self.selection.send_replace(next.clone());
            self.restart_pollers(&next);
            next
        };

        let _ = self.bus.send(BusMsg::Selection {
            market: next.name().to_string(),
            epoch: next.epoch,
        });
        Ok(next)
    }

    fn restart_pollers(&self, selection: &MarketSelection) {
        let Some(p) = &self.pollers else {
            self.channels.reset(selection.epoch);
            return;
        };
        let mut handles = p.handles.lock().unwrap_or_else(|e| e.into_inner());
        for h in handles.drain(..) {
            h.abort();
        }
        *handles = spawn_pollers(
            &p.sources,
            &self.channels,
            selection,
            self.account.as_deref(),
            p.interval,
        );
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}
