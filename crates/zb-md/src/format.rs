//! Joins the independently fetched chain sources into formatted reserves.
//!
//! The pool data provider, the incentives provider and the e-mode query are
//! separate sources. Before any reserve can be transformed they are combined:
//! each reserve receives the incentive entries for its underlying asset and
//! the wrapped-base-asset flag, and the list is put in display order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, warn};
use zb_config::NetworkConfig;
use zb_schemas::{
    FormattedEmode, FormattedReserve, RawEmode, RawReserve, ReserveIncentiveRecord,
    ReserveIncentives,
};

use crate::normalizer::{normalize_liquidation_bonus, normalize_or_zero, BPS_DECIMALS};

/// Sort key: total liquidity USD, unparseable values last.
fn liquidity_usd(r: &FormattedReserve) -> Option<Decimal> {
    Decimal::from_str(r.reserve.total_liquidity_usd.trim()).ok()
}

/// Display order: largest total liquidity (USD) first, ties by symbol.
fn display_order(a: &FormattedReserve, b: &FormattedReserve) -> Ordering {
    match (liquidity_usd(a), liquidity_usd(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.reserve.symbol.cmp(&b.reserve.symbol))
}

/// Attach incentives (matched case-insensitively on underlying asset) and the
/// wrapped-base-asset flag to every reserve. Pool order is kept.
///
/// Reserves without an incentive record get empty incentive lists.
pub fn join_incentives(
    reserves: &[RawReserve],
    incentives: &[ReserveIncentiveRecord],
    network: &NetworkConfig,
) -> Vec<FormattedReserve> {
    let by_asset: HashMap<String, &ReserveIncentives> = incentives
        .iter()
        .map(|rec| (rec.underlying_asset.to_lowercase(), &rec.incentives))
        .collect();

    reserves
        .iter()
        .map(|r| FormattedReserve {
            reserve: r.clone(),
            incentives: by_asset
                .get(&r.underlying_asset.to_lowercase())
                .map(|i| (*i).clone())
                .unwrap_or_default(),
            is_wrapped_base_asset: network.is_wrapped_base_asset(&r.symbol),
        })
        .collect()
}

/// [`join_incentives`], then sorted for display.
pub fn format_reserves(
    reserves: &[RawReserve],
    incentives: &[ReserveIncentiveRecord],
    network: &NetworkConfig,
) -> Vec<FormattedReserve> {
    let mut out = join_incentives(reserves, incentives, network);
    out.sort_by(display_order);
    debug!(reserves = out.len(), "formatted reserves");
    out
}

/// Symbols of the reserves whose bit is set in `bitmap`. Bit `i` refers to
/// the reserve with id `i`. Reserves without an id fall back to their
/// position in the pool list.
fn assets_in_bitmap(bitmap: &str, reserves: &[RawReserve], emode_id: u8) -> Vec<String> {
    let trimmed = bitmap.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let Ok(bits) = trimmed.parse::<u128>() else {
        warn!(emode_id, bitmap = %bitmap, "unparseable e-mode bitmap; treating as empty");
        return Vec::new();
    };
    reserves
        .iter()
        .enumerate()
        .filter(|(pos, r)| {
            let bit = r.id.map_or(*pos, usize::from);
            bit < 128 && bits & (1u128 << bit) != 0
        })
        .map(|(_, r)| r.symbol.clone())
        .collect()
}

/// E-mode categories keyed by id, with normalized risk parameters.
pub fn format_emodes(reserves: &[RawReserve], emodes: &[RawEmode]) -> BTreeMap<u8, FormattedEmode> {
    emodes
        .iter()
        .map(|e| {
            let cfg = &e.e_mode;
            let formatted = FormattedEmode {
                id: e.id,
                label: cfg.label.clone(),
                ltv: normalize_or_zero(&cfg.ltv, BPS_DECIMALS),
                liquidation_threshold: normalize_or_zero(&cfg.liquidation_threshold, BPS_DECIMALS),
                liquidation_bonus: normalize_liquidation_bonus(&cfg.liquidation_bonus)
                    .unwrap_or_else(|_| "0".to_string()),
                collateral_assets: assets_in_bitmap(&cfg.collateral_bitmap, reserves, e.id),
                borrowable_assets: assets_in_bitmap(&cfg.borrowable_bitmap, reserves, e.id),
            };
            (e.id, formatted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zb_config::{network_config, CHAIN_ID_SEPOLIA};
    use zb_schemas::{RawEmodeConfig, RawIncentive};

    fn reserve(symbol: &str, asset: &str, liq_usd: &str) -> RawReserve {
        RawReserve {
            symbol: symbol.to_string(),
            underlying_asset: asset.to_string(),
            total_liquidity_usd: liq_usd.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn joins_incentives_case_insensitively() {
        let net = network_config(CHAIN_ID_SEPOLIA).unwrap();
        let reserves = vec![reserve("DAI", "0xDAI", "10")];
        let incentives = vec![ReserveIncentiveRecord {
            underlying_asset: "0xdai".to_string(),
            incentives: ReserveIncentives {
                a_incentives_data: vec![RawIncentive {
                    reward_token_address: "0xR".to_string(),
                    reward_token_symbol: "R".to_string(),
                    incentive_apr: "0.1".to_string(),
                }],
                v_incentives_data: vec![],
            },
        }];

        let out = format_reserves(&reserves, &incentives, &net);
        assert_eq!(out[0].incentives.a_incentives_data.len(), 1);
    }

    #[test]
    fn join_keeps_pool_order() {
        let net = network_config(CHAIN_ID_SEPOLIA).unwrap();
        let reserves = vec![reserve("A", "0x1", "1"), reserve("B", "0x2", "100")];
        let out = join_incentives(&reserves, &[], &net);
        assert_eq!(out[0].reserve.symbol, "A");
        assert_eq!(out[1].reserve.symbol, "B");
    }

    #[test]
    fn missing_incentive_record_yields_empty_lists() {
        let net = network_config(CHAIN_ID_SEPOLIA).unwrap();
        let out = format_reserves(&[reserve("DAI", "0x1", "1")], &[], &net);
        assert_eq!(out[0].incentives, ReserveIncentives::default());
    }

    #[test]
    fn sorted_by_liquidity_desc_then_symbol() {
        let net = network_config(CHAIN_ID_SEPOLIA).unwrap();
        let reserves = vec![
            reserve("USDC", "0x1", "500"),
            reserve("WETH", "0x2", "9000"),
            reserve("BAD", "0x3", "n/a"),
            reserve("AAVE", "0x4", "500"),
        ];
        let out = format_reserves(&reserves, &[], &net);
        let symbols: Vec<_> = out.iter().map(|r| r.reserve.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["WETH", "AAVE", "USDC", "BAD"]);
        assert!(out[0].is_wrapped_base_asset);
        assert!(!out[1].is_wrapped_base_asset);
    }

    #[test]
    fn emode_bitmaps_resolve_pool_order_symbols() {
        let reserves = vec![
            reserve("WETH", "0x1", "1"),
            reserve("wstETH", "0x2", "1"),
            reserve("USDC", "0x3", "1"),
        ];
        let emodes = vec![RawEmode {
            id: 1,
            e_mode: RawEmodeConfig {
                label: "ETH correlated".to_string(),
                ltv: "9300".to_string(),
                liquidation_threshold: "9500".to_string(),
                liquidation_bonus: "10100".to_string(),
                collateral_bitmap: "3".to_string(),
                borrowable_bitmap: "1".to_string(),
            },
        }];

        let out = format_emodes(&reserves, &emodes);
        let e = &out[&1];
        assert_eq!(e.ltv, "0.93");
        assert_eq!(e.liquidation_threshold, "0.95");
        assert_eq!(e.liquidation_bonus, "0.01");
        assert_eq!(e.collateral_assets, vec!["WETH", "wstETH"]);
        assert_eq!(e.borrowable_assets, vec!["WETH"]);
    }

    #[test]
    fn emode_bitmaps_follow_reserve_ids() {
        // Reserve 1 was dropped from the pool list; the list position of
        // USDC is 1 but its id is 2.
        let mut weth = reserve("WETH", "0x1", "1");
        weth.id = Some(0);
        let mut usdc = reserve("USDC", "0x3", "1");
        usdc.id = Some(2);
        let mut far = reserve("FAR", "0x9", "1");
        far.id = Some(200);
        let emodes = vec![RawEmode {
            id: 1,
            e_mode: RawEmodeConfig {
                collateral_bitmap: "4".to_string(),
                borrowable_bitmap: "2".to_string(),
                ..Default::default()
            },
        }];

        let out = format_emodes(&[weth, usdc, far], &emodes);
        assert_eq!(out[&1].collateral_assets, vec!["USDC"]);
        assert!(out[&1].borrowable_assets.is_empty());
    }

    #[test]
    fn bad_emode_bitmap_is_empty() {
        let emodes = vec![RawEmode {
            id: 2,
            e_mode: RawEmodeConfig {
                collateral_bitmap: "zz".to_string(),
                ..Default::default()
            },
        }];
        let out = format_emodes(&[reserve("A", "0x1", "1")], &emodes);
        assert!(out[&2].collateral_assets.is_empty());
        assert_eq!(out[&2].ltv, "0");
    }
}
