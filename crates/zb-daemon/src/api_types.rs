//! Request and response types for the zb-daemon HTTP endpoints.
//!
//! The view model itself (`GET /v1/market`) is `zb_reconcile::AppDataView`;
//! only the envelopes around it live here.

use serde::{Deserialize, Serialize};
use zb_config::MarketConfig;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// /v1/markets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market: String,
    pub market_title: String,
    pub chain_id: u64,
    pub pool_address: String,
    pub selected: bool,
}

impl MarketSummary {
    pub fn from_config(m: &MarketConfig, selected: &str) -> Self {
        Self {
            market: m.market.clone(),
            market_title: m.market_title.clone(),
            chain_id: m.chain_id,
            pool_address: m.pool_address().to_string(),
            selected: m.market == selected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketSummary>,
    /// Name of the active market.
    pub selected: String,
    pub epoch: u64,
}

// ---------------------------------------------------------------------------
// /v1/market/select
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub market: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    pub market: String,
    pub chain_id: u64,
    pub epoch: u64,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
