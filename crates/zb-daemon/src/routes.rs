//! Axum router and HTTP handlers for zb-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. The API is read-only apart from market selection.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use zb_config::ConfigError;
use zb_reconcile::AppDataView;

use crate::{
    api_types::{
        ErrorResponse, HealthResponse, MarketSummary, MarketsResponse, SelectRequest,
        SelectResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/markets", get(markets))
        .route("/v1/market", get(market))
        .route("/v1/market/select", post(select_market))
        .route("/v1/stream", get(stream_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/markets
// ---------------------------------------------------------------------------

pub(crate) async fn markets(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let store = st.store.read().await;
    let current = store.current();
    let markets = store
        .registry()
        .markets()
        .iter()
        .map(|m| MarketSummary::from_config(m, current.name()))
        .collect();

    Json(MarketsResponse {
        markets,
        selected: current.name().to_string(),
        epoch: current.epoch,
    })
}

// ---------------------------------------------------------------------------
// GET /v1/market
// ---------------------------------------------------------------------------

pub(crate) async fn market(State(st): State<Arc<AppState>>) -> Json<AppDataView> {
    Json(AppDataView::clone(&st.current_view()))
}

// ---------------------------------------------------------------------------
// POST /v1/market/select
// ---------------------------------------------------------------------------

pub(crate) async fn select_market(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> Response {
    match st.select(&req.market).await {
        Ok(sel) => {
            info!(market = %sel.name(), epoch = sel.epoch, "market/select");
            (
                StatusCode::OK,
                Json(SelectResponse {
                    market: sel.name().to_string(),
                    chain_id: sel.market.chain_id,
                    epoch: sel.epoch,
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = match e {
                ConfigError::UnknownMarket(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            warn!(market = %req.market, error = %e, "market/select refused");
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

/// The current view first, then every bus message as it is published.
pub(crate) async fn stream_handler(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let first = BusMsg::View(Box::new(AppDataView::clone(&st.current_view())));
    let events = stream::iter(to_event(&first).map(Ok)).chain(broadcast_to_sse(rx));

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn to_event(msg: &BusMsg) -> Option<Event> {
    let data = serde_json::to_string(msg).ok()?;
    Some(Event::default().event(msg.event_name()).data(data))
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => to_event(&m).map(Ok),
            Err(_) => None, // lagged / closed
        }
    })
}
