//! Raw contract-sourced records.
//!
//! These mirror the humanized output of the on-chain UI data providers:
//! token amounts are already decimal strings, while rate-model parameters
//! (ray, 1e27) and risk parameters (bps, 1e4) are still raw integer strings.
//! `zb-md` is responsible for normalizing them.

use serde::{Deserialize, Serialize};

/// One reserve as reported by the on-chain pool data provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReserve {
    /// Position of the reserve in the pool's reserve list; e-mode bitmaps
    /// are indexed by it. Older payloads omit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u16>,
    pub underlying_asset: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub a_token_address: String,
    pub variable_debt_token_address: String,

    pub total_liquidity: String,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: String,
    pub total_debt: String,
    #[serde(rename = "totalDebtUSD")]
    pub total_debt_usd: String,

    #[serde(rename = "supplyAPY")]
    pub supply_apy: String,
    #[serde(rename = "variableBorrowAPY")]
    pub variable_borrow_apy: String,
    pub borrow_usage_ratio: String,

    /// Whole-token caps; "0" means uncapped.
    pub supply_cap: String,
    pub borrow_cap: String,
    pub debt_ceiling: String,
    #[serde(rename = "debtCeilingUSD")]
    pub debt_ceiling_usd: Option<String>,
    pub isolation_mode_total_debt: Option<String>,
    #[serde(rename = "isolationModeTotalDebtUSD")]
    pub isolation_mode_total_debt_usd: Option<String>,

    /// bps
    #[serde(rename = "baseLTVasCollateral")]
    pub base_ltv_as_collateral: String,
    /// bps
    pub reserve_liquidation_threshold: String,
    /// bps, includes the 10000 base (10500 = 5% bonus)
    pub reserve_liquidation_bonus: String,
    /// bps
    pub reserve_factor: String,

    /// ray
    pub base_variable_borrow_rate: String,
    /// ray
    pub optimal_usage_ratio: String,
    /// ray
    pub variable_rate_slope1: String,
    /// ray
    pub variable_rate_slope2: String,

    pub borrowing_enabled: bool,
    pub usage_as_collateral_enabled: bool,
    pub is_active: bool,
    pub is_frozen: bool,
    pub is_paused: bool,
    pub is_isolated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseCurrencyData {
    pub market_reference_currency_decimals: u8,
    pub market_reference_currency_price_in_usd: String,
    pub network_base_token_price_in_usd: String,
    pub network_base_token_price_decimals: u8,
}

/// Output of the pool data provider for one market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservesData {
    pub reserves_data: Vec<RawReserve>,
    pub base_currency_data: BaseCurrencyData,
}

// ---------------------------------------------------------------------------
// Incentives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawIncentive {
    pub reward_token_address: String,
    pub reward_token_symbol: String,
    #[serde(rename = "incentiveAPR")]
    pub incentive_apr: String,
}

/// Supply-side (`a`) and borrow-side (`v`) incentive entries of one reserve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReserveIncentives {
    pub a_incentives_data: Vec<RawIncentive>,
    pub v_incentives_data: Vec<RawIncentive>,
}

/// Per-reserve incentive record as returned by the incentives provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReserveIncentiveRecord {
    pub underlying_asset: String,
    #[serde(flatten)]
    pub incentives: ReserveIncentives,
}

// ---------------------------------------------------------------------------
// E-modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEmodeConfig {
    pub label: String,
    /// bps
    pub ltv: String,
    /// bps
    pub liquidation_threshold: String,
    /// bps, includes the 10000 base
    pub liquidation_bonus: String,
    /// Bit `i` set = reserve `i` of the pool may be used as collateral.
    pub collateral_bitmap: String,
    /// Bit `i` set = reserve `i` of the pool may be borrowed.
    pub borrowable_bitmap: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEmode {
    pub id: u8,
    pub e_mode: RawEmodeConfig,
}

/// E-mode category with normalized risk parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedEmode {
    pub id: u8,
    pub label: String,
    pub ltv: String,
    pub liquidation_threshold: String,
    pub liquidation_bonus: String,
    pub collateral_assets: Vec<String>,
    pub borrowable_assets: Vec<String>,
}

// ---------------------------------------------------------------------------
// Formatted reserve (raw reserve joined with its incentives)
// ---------------------------------------------------------------------------

/// A raw reserve joined with its incentive entries and the wrapped-base-asset
/// flag. This is the input of the reserve transformer and the aggregate
/// calculator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormattedReserve {
    #[serde(flatten)]
    pub reserve: RawReserve,
    #[serde(flatten)]
    pub incentives: ReserveIncentives,
    pub is_wrapped_base_asset: bool,
}

// ---------------------------------------------------------------------------
// User reserves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserReserve {
    pub underlying_asset: String,
    pub scaled_a_token_balance: String,
    pub usage_as_collateral_enabled_on_user: bool,
    pub scaled_variable_debt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserReservesData {
    pub user_reserves: Vec<UserReserve>,
    pub user_emode_category_id: u8,
}
