//! Reserve transformer: one formatted raw reserve to one canonical [`Reserve`].
//!
//! Pure and deterministic. Identical input and network config always yield
//! an equal output value. Unparseable bps/ray parameters are coerced to
//! `"0"`; token amounts and USD values are passed through as published by
//! the pool data provider, which already humanizes them.

use tracing::debug;
use zb_config::NetworkConfig;
use zb_schemas::{
    reserve_id, BorrowInfo, BorrowingState, Currency, DecimalValue, FormattedReserve,
    IsolationModeConfig, PercentValue, RawReserve, Reserve, SupplyInfo, TokenAmount,
};

use crate::incentives::map_incentives;
use crate::normalizer::{normalize_liquidation_bonus, normalize_or_zero, BPS_DECIMALS, RAY_DECIMALS};

/// Prefix used in derived interest-bearing token names.
pub const PROTOCOL_NAME: &str = "Zaibots";

/// Frozen takes precedence over paused.
pub fn borrowing_state(is_frozen: bool, is_paused: bool) -> BorrowingState {
    if is_frozen {
        BorrowingState::Disabled
    } else if is_paused {
        BorrowingState::Paused
    } else {
        BorrowingState::Enabled
    }
}

fn bps(raw: &str) -> PercentValue {
    PercentValue::new(normalize_or_zero(raw, BPS_DECIMALS))
}

fn ray(raw: &str) -> DecimalValue {
    DecimalValue::exact(normalize_or_zero(raw, RAY_DECIMALS))
}

fn or_zero(v: Option<&String>) -> String {
    match v.map(|s| s.trim()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "0".to_string(),
    }
}

fn borrow_info(r: &RawReserve) -> BorrowInfo {
    BorrowInfo {
        apy: PercentValue::new(r.variable_borrow_apy.clone()),
        total: TokenAmount::new(r.total_debt.clone(), r.total_debt_usd.clone()),
        // Caps are published in whole tokens with no USD valuation.
        borrow_cap: TokenAmount::new(r.borrow_cap.clone(), "0"),
        borrowing_state: borrowing_state(r.is_frozen, r.is_paused),
        utilization_rate: PercentValue::new(r.borrow_usage_ratio.clone()),
        reserve_factor: bps(&r.reserve_factor),
        base_variable_borrow_rate: ray(&r.base_variable_borrow_rate),
        optimal_usage_rate: ray(&r.optimal_usage_ratio),
        variable_rate_slope1: ray(&r.variable_rate_slope1),
        variable_rate_slope2: ray(&r.variable_rate_slope2),
    }
}

fn isolation_mode_config(r: &RawReserve) -> IsolationModeConfig {
    IsolationModeConfig {
        can_be_collateral: r.usage_as_collateral_enabled,
        debt_ceiling: TokenAmount::new(r.debt_ceiling.clone(), or_zero(r.debt_ceiling_usd.as_ref())),
        total_borrows: TokenAmount::new(
            or_zero(r.isolation_mode_total_debt.as_ref()),
            or_zero(r.isolation_mode_total_debt_usd.as_ref()),
        ),
    }
}

/// Build the canonical reserve for `formatted` on the market at `pool_address`.
pub fn transform_reserve(
    formatted: &FormattedReserve,
    network: &NetworkConfig,
    pool_address: &str,
) -> Reserve {
    let r = &formatted.reserve;

    let underlying_token = Currency {
        address: r.underlying_asset.clone(),
        symbol: r.symbol.clone(),
        name: r.name.clone(),
        decimals: r.decimals,
    };
    let a_token = Currency {
        address: r.a_token_address.clone(),
        symbol: format!("a{}", r.symbol),
        name: format!("{PROTOCOL_NAME} {}", r.name),
        decimals: r.decimals,
    };
    let v_token = Currency {
        address: r.variable_debt_token_address.clone(),
        symbol: format!("variableDebt{}", r.symbol),
        name: format!("Variable Debt {}", r.name),
        decimals: r.decimals,
    };

    let size = TokenAmount::new(r.total_liquidity.clone(), r.total_liquidity_usd.clone());

    let supply_info = SupplyInfo {
        apy: PercentValue::new(r.supply_apy.clone()),
        total: Some(size.clone()),
        supply_cap: TokenAmount::new(r.supply_cap.clone(), "0"),
        max_ltv: bps(&r.base_ltv_as_collateral),
        liquidation_threshold: bps(&r.reserve_liquidation_threshold),
        liquidation_bonus: PercentValue::new(
            normalize_liquidation_bonus(&r.reserve_liquidation_bonus)
                .unwrap_or_else(|_| "0".to_string()),
        ),
    };

    let out = Reserve {
        id: reserve_id(pool_address, &r.underlying_asset),
        underlying_token,
        a_token,
        v_token,
        size,
        supply_info,
        borrow_info: r.borrowing_enabled.then(|| borrow_info(r)),
        isolation_mode_config: r.is_isolated.then(|| isolation_mode_config(r)),
        is_frozen: r.is_frozen,
        is_paused: r.is_paused,
        accepts_native: network.is_wrapped_base_asset(&r.symbol),
        incentives: map_incentives(&formatted.incentives),
    };

    debug!(
        reserve = %out.id,
        symbol = %r.symbol,
        borrowing = ?out.borrowing_state(),
        isolated = r.is_isolated,
        "reserve transformed"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zb_config::{network_config, CHAIN_ID_SEPOLIA};
    use zb_schemas::{RawIncentive, ReserveIncentives};

    const POOL: &str = "0xPOOL";

    fn dai() -> FormattedReserve {
        FormattedReserve {
            reserve: RawReserve {
                underlying_asset: "0xDAI".to_string(),
                name: "Dai Stablecoin".to_string(),
                symbol: "DAI".to_string(),
                decimals: 18,
                a_token_address: "0xADAI".to_string(),
                variable_debt_token_address: "0xVDAI".to_string(),
                total_liquidity: "1000000".to_string(),
                total_liquidity_usd: "1000000".to_string(),
                total_debt: "400000".to_string(),
                total_debt_usd: "400000".to_string(),
                supply_apy: "0.021".to_string(),
                variable_borrow_apy: "0.043".to_string(),
                borrow_usage_ratio: "0.4".to_string(),
                supply_cap: "2000000".to_string(),
                borrow_cap: "0".to_string(),
                debt_ceiling: "0".to_string(),
                base_ltv_as_collateral: "7500".to_string(),
                reserve_liquidation_threshold: "8000".to_string(),
                reserve_liquidation_bonus: "10500".to_string(),
                reserve_factor: "1000".to_string(),
                base_variable_borrow_rate: "0".to_string(),
                optimal_usage_ratio: "900000000000000000000000000".to_string(),
                variable_rate_slope1: "40000000000000000000000000".to_string(),
                variable_rate_slope2: "600000000000000000000000000".to_string(),
                borrowing_enabled: true,
                usage_as_collateral_enabled: true,
                is_active: true,
                ..Default::default()
            },
            incentives: ReserveIncentives::default(),
            is_wrapped_base_asset: false,
        }
    }

    fn sepolia() -> NetworkConfig {
        network_config(CHAIN_ID_SEPOLIA).unwrap()
    }

    #[test]
    fn dai_example_is_enabled() {
        let r = transform_reserve(&dai(), &sepolia(), POOL);
        assert_eq!(r.borrowing_state(), Some(BorrowingState::Enabled));
        assert!(r.is_borrowable());
    }

    #[test]
    fn frozen_dai_is_disabled_even_when_borrowing_enabled() {
        let mut f = dai();
        f.reserve.is_frozen = true;
        let r = transform_reserve(&f, &sepolia(), POOL);
        assert_eq!(r.borrowing_state(), Some(BorrowingState::Disabled));
    }

    #[test]
    fn borrowing_state_over_all_flag_combinations() {
        let cases = [
            (false, false, BorrowingState::Enabled),
            (false, true, BorrowingState::Paused),
            (true, false, BorrowingState::Disabled),
            (true, true, BorrowingState::Disabled),
        ];
        for (frozen, paused, expected) in cases {
            let mut f = dai();
            f.reserve.is_frozen = frozen;
            f.reserve.is_paused = paused;
            let r = transform_reserve(&f, &sepolia(), POOL);
            assert_eq!(
                r.borrowing_state(),
                Some(expected),
                "frozen={frozen} paused={paused}"
            );
            assert_eq!(r.is_frozen, frozen);
            assert_eq!(r.is_paused, paused);
        }
    }

    #[test]
    fn borrow_info_absent_iff_borrowing_disabled() {
        let mut f = dai();
        f.reserve.borrowing_enabled = false;
        assert!(transform_reserve(&f, &sepolia(), POOL).borrow_info.is_none());
        f.reserve.borrowing_enabled = true;
        assert!(transform_reserve(&f, &sepolia(), POOL).borrow_info.is_some());
    }

    #[test]
    fn isolation_config_present_iff_isolated_with_zero_defaults() {
        let mut f = dai();
        assert!(transform_reserve(&f, &sepolia(), POOL)
            .isolation_mode_config
            .is_none());

        f.reserve.is_isolated = true;
        f.reserve.debt_ceiling = "5000000".to_string();
        let iso = transform_reserve(&f, &sepolia(), POOL)
            .isolation_mode_config
            .unwrap();
        assert!(iso.can_be_collateral);
        assert_eq!(iso.debt_ceiling.amount.value, "5000000");
        assert_eq!(iso.debt_ceiling.usd, "0");
        assert_eq!(iso.total_borrows, TokenAmount::zero());

        f.reserve.isolation_mode_total_debt = Some("12".to_string());
        f.reserve.isolation_mode_total_debt_usd = Some("12.5".to_string());
        let iso = transform_reserve(&f, &sepolia(), POOL)
            .isolation_mode_config
            .unwrap();
        assert_eq!(iso.total_borrows, TokenAmount::new("12", "12.5"));
    }

    #[test]
    fn derived_tokens_and_id() {
        let r = transform_reserve(&dai(), &sepolia(), POOL);
        assert_eq!(r.id, "0xpool-0xdai");
        assert_eq!(r.a_token.symbol, "aDAI");
        assert_eq!(r.a_token.name, "Zaibots Dai Stablecoin");
        assert_eq!(r.a_token.address, "0xADAI");
        assert_eq!(r.v_token.symbol, "variableDebtDAI");
        assert_eq!(r.v_token.name, "Variable Debt Dai Stablecoin");
        assert_eq!(r.underlying_token.decimals, 18);
    }

    #[test]
    fn risk_and_rate_parameters_are_normalized() {
        let r = transform_reserve(&dai(), &sepolia(), POOL);
        assert_eq!(r.supply_info.max_ltv.value, "0.75");
        assert_eq!(r.supply_info.liquidation_threshold.value, "0.8");
        assert_eq!(r.supply_info.liquidation_bonus.value, "0.05");
        assert_eq!(r.supply_info.supply_cap, TokenAmount::new("2000000", "0"));

        let b = r.borrow_info.unwrap();
        assert_eq!(b.reserve_factor.value, "0.1");
        assert_eq!(b.optimal_usage_rate, DecimalValue::exact("0.9"));
        assert_eq!(b.variable_rate_slope1, DecimalValue::exact("0.04"));
        assert_eq!(b.variable_rate_slope2, DecimalValue::exact("0.6"));
        assert_eq!(b.base_variable_borrow_rate, DecimalValue::exact("0"));
        assert_eq!(b.total, TokenAmount::new("400000", "400000"));
    }

    #[test]
    fn garbage_rate_parameters_become_zero() {
        let mut f = dai();
        f.reserve.variable_rate_slope1 = "not-a-number".to_string();
        f.reserve.base_ltv_as_collateral = String::new();
        let r = transform_reserve(&f, &sepolia(), POOL);
        assert_eq!(r.supply_info.max_ltv.value, "0");
        assert_eq!(
            r.borrow_info.unwrap().variable_rate_slope1,
            DecimalValue::exact("0")
        );
    }

    #[test]
    fn accepts_native_matches_wrapped_symbol_case_insensitively() {
        let mut f = dai();
        f.reserve.symbol = "weth".to_string();
        assert!(transform_reserve(&f, &sepolia(), POOL).accepts_native);
        f.reserve.symbol = "DAI".to_string();
        assert!(!transform_reserve(&f, &sepolia(), POOL).accepts_native);
    }

    #[test]
    fn transform_is_deterministic() {
        let mut f = dai();
        f.incentives.a_incentives_data.push(RawIncentive {
            reward_token_address: "0xR".to_string(),
            reward_token_symbol: "R".to_string(),
            incentive_apr: "0.01".to_string(),
        });
        let a = transform_reserve(&f, &sepolia(), POOL);
        let b = transform_reserve(&f, &sepolia(), POOL);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.incentives.len(), 1);
    }
}
