//! zb-schemas
//!
//! Canonical market/reserve view types shared by every crate in the
//! workspace, plus the raw contract-sourced records they are built from
//! (see [`raw`]).
//!
//! Field names serialize as camelCase so that markets returned by the
//! indexed source decode straight into these types.
//!
//! Every numeric display value is a decimal string that has already been
//! scaled by its semantic decimals. Raw integers never appear here.

pub mod raw;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use raw::*;

/// Decimals assumed for reward tokens whose metadata is not published by the
/// incentives controller.
pub const DEFAULT_REWARD_TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Value wrappers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// A decimal value. `raw` mirrors the indexed schema, which carries both a
/// display value and an unrounded value for rate-model parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimalValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DecimalValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            raw: None,
        }
    }

    /// Value whose unrounded form equals its display form.
    pub fn exact(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            raw: Some(value.clone()),
            value,
        }
    }
}

/// A ratio in `[0, 1]` (0.05 = 5%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentValue {
    pub value: String,
}

impl PercentValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: DecimalValue,
    pub usd: String,
}

impl TokenAmount {
    pub fn new(amount: impl Into<String>, usd: impl Into<String>) -> Self {
        Self {
            amount: DecimalValue::new(amount),
            usd: usd.into(),
        }
    }

    pub fn zero() -> Self {
        Self::new("0", "0")
    }
}

// ---------------------------------------------------------------------------
// Reserve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowingState {
    Enabled,
    Disabled,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyInfo {
    pub apy: PercentValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TokenAmount>,
    pub supply_cap: TokenAmount,
    #[serde(rename = "maxLTV")]
    pub max_ltv: PercentValue,
    pub liquidation_threshold: PercentValue,
    pub liquidation_bonus: PercentValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowInfo {
    pub apy: PercentValue,
    pub total: TokenAmount,
    pub borrow_cap: TokenAmount,
    pub borrowing_state: BorrowingState,
    pub utilization_rate: PercentValue,
    pub reserve_factor: PercentValue,
    pub base_variable_borrow_rate: DecimalValue,
    pub optimal_usage_rate: DecimalValue,
    pub variable_rate_slope1: DecimalValue,
    pub variable_rate_slope2: DecimalValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationModeConfig {
    pub can_be_collateral: bool,
    pub debt_ceiling: TokenAmount,
    pub total_borrows: TokenAmount,
}

/// Incentive side. Serialized under the indexed schema's `__typename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncentiveKind {
    #[serde(rename = "AaveSupplyIncentive", alias = "SUPPLY")]
    Supply,
    #[serde(rename = "AaveBorrowIncentive", alias = "BORROW")]
    Borrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incentive {
    #[serde(rename = "__typename")]
    pub kind: IncentiveKind,
    pub apy: PercentValue,
    pub token: Currency,
}

/// Canonical reserve view model.
///
/// Invariants:
/// - `borrow_info.is_some()` iff borrowing is enabled for the reserve.
/// - `isolation_mode_config.is_some()` iff the reserve is isolated.
/// - `id` is `"{pool}-{underlying}"`, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    /// Indexed reserves arrive without an id; the reconciler assigns it.
    #[serde(default)]
    pub id: String,
    pub underlying_token: Currency,
    pub a_token: Currency,
    pub v_token: Currency,
    pub size: TokenAmount,
    pub supply_info: SupplyInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_info: Option<BorrowInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_mode_config: Option<IsolationModeConfig>,
    pub is_frozen: bool,
    pub is_paused: bool,
    pub accepts_native: bool,
    #[serde(default)]
    pub incentives: Vec<Incentive>,
}

impl Reserve {
    pub fn borrowing_state(&self) -> Option<BorrowingState> {
        self.borrow_info.as_ref().map(|b| b.borrowing_state)
    }

    pub fn is_borrowable(&self) -> bool {
        self.borrowing_state() == Some(BorrowingState::Enabled)
    }
}

/// Globally unique reserve id: market address + underlying asset, lower-cased
/// so lookups are case-insensitive.
pub fn reserve_id(pool_address: &str, underlying_asset: &str) -> String {
    format!("{pool_address}-{underlying_asset}").to_lowercase()
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmodeMarketCategory {
    pub id: u8,
    pub label: String,
    #[serde(rename = "maxLTV")]
    pub max_ltv: PercentValue,
    pub liquidation_threshold: PercentValue,
    pub liquidation_penalty: PercentValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketUserState {
    pub net_worth: String,
    pub health_factor: Option<String>,
    pub e_mode_enabled: bool,
    pub is_in_isolation_mode: bool,
}

/// One market snapshot.
///
/// `borrow_reserves` is the subset of `supply_reserves` whose borrowing state
/// is ENABLED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub address: String,
    pub total_market_size: Decimal,
    pub total_available_liquidity: Decimal,
    pub supply_reserves: Vec<Reserve>,
    pub borrow_reserves: Vec<Reserve>,
    #[serde(default)]
    pub e_mode_categories: Vec<EmodeMarketCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_state: Option<MarketUserState>,
}

impl Market {
    pub fn has_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_id_is_lower_cased() {
        assert_eq!(reserve_id("0xAbC", "0xDeF"), "0xabc-0xdef");
    }

    #[test]
    fn borrowing_state_wire_names() {
        let s = serde_json::to_string(&BorrowingState::Paused).unwrap();
        assert_eq!(s, "\"PAUSED\"");
    }

    #[test]
    fn incentive_kind_accepts_indexed_typename() {
        let json = r#"{
            "__typename": "AaveBorrowIncentive",
            "apy": { "value": "0.01" },
            "token": { "address": "0x1", "symbol": "R", "name": "R", "decimals": 18 }
        }"#;
        let inc: Incentive = serde_json::from_str(json).unwrap();
        assert_eq!(inc.kind, IncentiveKind::Borrow);
    }

    #[test]
    fn market_address_match_ignores_case() {
        let m = Market {
            address: "0xAf29b85C97B28490E00A090bD1b4B552c69C7559".to_string(),
            total_market_size: Decimal::ZERO,
            total_available_liquidity: Decimal::ZERO,
            supply_reserves: vec![],
            borrow_reserves: vec![],
            e_mode_categories: vec![],
            user_state: None,
        };
        assert!(m.has_address("0xaf29b85c97b28490e00a090bd1b4b552c69c7559"));
        assert!(!m.has_address("0x0"));
    }
}
