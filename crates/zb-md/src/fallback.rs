//! Fallback market builder.
//!
//! Builds a complete [`Market`] from contract-sourced reserves for markets
//! the indexed source does not know about (custom or unindexed
//! deployments). Never fails; an empty reserve list yields an empty market
//! with zero totals.

use tracing::info;
use zb_config::NetworkConfig;
use zb_schemas::{FormattedReserve, Market, Reserve};

use crate::aggregate::{compute_aggregate_metrics, AggregateMetrics};
use crate::transform::transform_reserve;

/// A synthesized market together with the metrics it was built from.
///
/// `metrics.total_borrows` is kept here because [`Market`] carries only size
/// and available liquidity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackMarket {
    pub market: Market,
    pub metrics: AggregateMetrics,
}

pub fn build_fallback_market(
    reserves: &[FormattedReserve],
    pool_address: &str,
    network: &NetworkConfig,
) -> FallbackMarket {
    let metrics = compute_aggregate_metrics(reserves);

    let supply_reserves: Vec<Reserve> = reserves
        .iter()
        .map(|r| transform_reserve(r, network, pool_address))
        .collect();
    let borrow_reserves: Vec<Reserve> = supply_reserves
        .iter()
        .filter(|r| r.is_borrowable())
        .cloned()
        .collect();

    info!(
        market = %pool_address,
        supply = supply_reserves.len(),
        borrow = borrow_reserves.len(),
        size = %metrics.total_market_size,
        available = %metrics.total_available_liquidity,
        "fallback market built"
    );

    FallbackMarket {
        market: Market {
            address: pool_address.to_lowercase(),
            total_market_size: metrics.total_market_size,
            total_available_liquidity: metrics.total_available_liquidity,
            supply_reserves,
            borrow_reserves,
            e_mode_categories: Vec::new(),
            user_state: None,
        },
        metrics,
    }
}
