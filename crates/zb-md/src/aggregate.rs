//! Market-wide USD totals.
//!
//! Sums are exact (`rust_decimal`), so `total_available_liquidity` is always
//! `total_market_size - total_borrows` to the last digit. A negative result
//! means the upstream data is inconsistent.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zb_schemas::FormattedReserve;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_market_size: Decimal,
    pub total_borrows: Decimal,
    pub total_available_liquidity: Decimal,
    /// Symbols of reserves whose USD values could not be parsed and were
    /// counted as zero.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_reserves: Vec<String>,
}

impl AggregateMetrics {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_reserves.is_empty()
    }
}

/// Parse a USD decimal string. Empty or malformed input is `None`.
pub fn parse_usd(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

pub fn compute_aggregate_metrics(reserves: &[FormattedReserve]) -> AggregateMetrics {
    let mut out = AggregateMetrics::default();

    for f in reserves {
        let r = &f.reserve;
        let liquidity = parse_usd(&r.total_liquidity_usd);
        let debt = parse_usd(&r.total_debt_usd);

        let mut degraded = liquidity.is_none() || debt.is_none();
        if degraded {
            warn!(
                symbol = %r.symbol,
                liquidity_usd = %r.total_liquidity_usd,
                debt_usd = %r.total_debt_usd,
                "unparseable USD value counted as zero"
            );
        }

        let size = out.total_market_size.checked_add(liquidity.unwrap_or_default());
        let borrows = out.total_borrows.checked_add(debt.unwrap_or_default());
        match (size, borrows) {
            (Some(size), Some(borrows)) => {
                out.total_market_size = size;
                out.total_borrows = borrows;
            }
            _ => {
                warn!(symbol = %r.symbol, "USD total overflows; reserve counted as zero");
                degraded = true;
            }
        }

        if degraded {
            out.degraded_reserves.push(r.symbol.clone());
        }
    }

    out.total_available_liquidity = match out.total_market_size.checked_sub(out.total_borrows) {
        Some(v) => v,
        None => {
            warn!(
                size = %out.total_market_size,
                borrows = %out.total_borrows,
                "available liquidity overflows; reported as zero"
            );
            Decimal::ZERO
        }
    };

    if out.total_available_liquidity.is_sign_negative() && !out.total_available_liquidity.is_zero() {
        warn!(
            size = %out.total_market_size,
            borrows = %out.total_borrows,
            "borrows exceed market size; upstream data inconsistent"
        );
    }
    debug!(
        reserves = reserves.len(),
        size = %out.total_market_size,
        borrows = %out.total_borrows,
        "aggregate metrics computed"
    );
    out
}
