//! Raw reserve and market fixtures.

use rust_decimal::Decimal;
use zb_config::{sepolia_test_market, MarketConfig, MarketSelection, NetworkConfig};
use zb_md::{compute_aggregate_metrics, join_incentives, transform_reserve};
use zb_schemas::{
    BaseCurrencyData, EmodeMarketCategory, FormattedReserve, Market, MarketUserState,
    PercentValue, RawEmode, RawEmodeConfig, RawReserve, ReservesData,
};

/// Pool address of [`test_market`].
pub const TEST_POOL: &str = "0xAf29b85C97B28490E00A090bD1b4B552c69C7559";

pub fn test_market() -> MarketConfig {
    sepolia_test_market()
}

pub fn test_network() -> NetworkConfig {
    NetworkConfig {
        name: "Ethereum Sepolia".to_string(),
        base_asset_symbol: "ETH".to_string(),
        wrapped_base_asset_symbol: "WETH".to_string(),
        is_testnet: true,
        is_fork: false,
        underlying_chain_id: None,
    }
}

pub fn test_selection(epoch: u64) -> MarketSelection {
    MarketSelection {
        epoch,
        market: test_market(),
        network: test_network(),
    }
}

/// A healthy, borrowable, non-isolated reserve with round numbers.
///
/// Address fields are derived from the symbol (`0x<SYMBOL>`, `0xa<SYMBOL>`,
/// `0xv<SYMBOL>`).
pub fn raw_reserve(symbol: &str) -> RawReserve {
    RawReserve {
        id: None,
        underlying_asset: format!("0x{symbol}"),
        name: format!("{symbol} Token"),
        symbol: symbol.to_string(),
        decimals: 18,
        a_token_address: format!("0xa{symbol}"),
        variable_debt_token_address: format!("0xv{symbol}"),
        total_liquidity: "1000".to_string(),
        total_liquidity_usd: "1000".to_string(),
        total_debt: "250".to_string(),
        total_debt_usd: "250".to_string(),
        supply_apy: "0.02".to_string(),
        variable_borrow_apy: "0.05".to_string(),
        borrow_usage_ratio: "0.25".to_string(),
        supply_cap: "0".to_string(),
        borrow_cap: "0".to_string(),
        debt_ceiling: "0".to_string(),
        debt_ceiling_usd: None,
        isolation_mode_total_debt: None,
        isolation_mode_total_debt_usd: None,
        base_ltv_as_collateral: "7500".to_string(),
        reserve_liquidation_threshold: "8000".to_string(),
        reserve_liquidation_bonus: "10500".to_string(),
        reserve_factor: "1000".to_string(),
        base_variable_borrow_rate: "0".to_string(),
        optimal_usage_ratio: "800000000000000000000000000".to_string(),
        variable_rate_slope1: "40000000000000000000000000".to_string(),
        variable_rate_slope2: "750000000000000000000000000".to_string(),
        borrowing_enabled: true,
        usage_as_collateral_enabled: true,
        is_active: true,
        is_frozen: false,
        is_paused: false,
        is_isolated: false,
    }
}

/// DAI with 1,000,000 USD supplied and 400,000 USD borrowed.
pub fn dai_reserve() -> RawReserve {
    RawReserve {
        name: "Dai Stablecoin".to_string(),
        total_liquidity: "1000000".to_string(),
        total_liquidity_usd: "1000000".to_string(),
        total_debt: "400000".to_string(),
        total_debt_usd: "400000".to_string(),
        ..raw_reserve("DAI")
    }
}

pub fn weth_reserve() -> RawReserve {
    RawReserve {
        name: "Wrapped Ether".to_string(),
        total_liquidity: "500".to_string(),
        total_liquidity_usd: "1500000".to_string(),
        total_debt: "100".to_string(),
        total_debt_usd: "300000".to_string(),
        ..raw_reserve("WETH")
    }
}

pub fn reserves_data(reserves: Vec<RawReserve>) -> ReservesData {
    ReservesData {
        reserves_data: reserves,
        base_currency_data: BaseCurrencyData {
            market_reference_currency_decimals: 8,
            market_reference_currency_price_in_usd: "100000000".to_string(),
            network_base_token_price_in_usd: "300000000000".to_string(),
            network_base_token_price_decimals: 8,
        },
    }
}

/// `reserves` joined with no incentives on [`test_network`].
pub fn formatted(reserves: &[RawReserve]) -> Vec<FormattedReserve> {
    join_incentives(reserves, &[], &test_network())
}

/// A single e-mode category whose collateral/borrowable bitmaps cover the
/// first two reserves of the pool.
pub fn stable_emode() -> RawEmode {
    RawEmode {
        id: 1,
        e_mode: RawEmodeConfig {
            label: "Stablecoins".to_string(),
            ltv: "9300".to_string(),
            liquidation_threshold: "9500".to_string(),
            liquidation_bonus: "10100".to_string(),
            collateral_bitmap: "3".to_string(),
            borrowable_bitmap: "3".to_string(),
        },
    }
}

/// A market as the indexed source would return it for `pool`.
///
/// Distinguishable from a fallback-built market: it carries an e-mode
/// category and a user state, and its reserves have no ids yet.
pub fn indexed_market(pool: &str, reserves: &[RawReserve]) -> Market {
    let network = test_network();
    let formatted = formatted(reserves);
    let metrics = compute_aggregate_metrics(&formatted);

    let mut supply: Vec<_> = formatted
        .iter()
        .map(|r| transform_reserve(r, &network, pool))
        .collect();
    for r in &mut supply {
        r.id.clear();
    }
    let borrow = supply.iter().filter(|r| r.is_borrowable()).cloned().collect();

    Market {
        address: pool.to_string(),
        total_market_size: metrics.total_market_size,
        total_available_liquidity: metrics.total_available_liquidity,
        supply_reserves: supply,
        borrow_reserves: borrow,
        e_mode_categories: vec![EmodeMarketCategory {
            id: 1,
            label: "Stablecoins".to_string(),
            max_ltv: PercentValue::new("0.93"),
            liquidation_threshold: PercentValue::new("0.95"),
            liquidation_penalty: PercentValue::new("0.01"),
        }],
        user_state: Some(MarketUserState {
            net_worth: "0".to_string(),
            health_factor: None,
            e_mode_enabled: false,
            is_in_isolation_mode: false,
        }),
    }
}

/// An indexed market for a different pool.
pub fn unrelated_indexed_market() -> Market {
    let mut m = indexed_market("0x000000000000000000000000000000000000dEaD", &[raw_reserve("USDT")]);
    m.total_market_size = Decimal::ZERO;
    m
}
