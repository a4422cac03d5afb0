//! The read-only view model handed to consumers.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zb_schemas::{
    EmodeMarketCategory, FormattedEmode, FormattedReserve, Market, MarketUserState, Reserve,
    UserReserve,
};

use crate::machine::ReconcileState;
use crate::source::SourceError;

/// One consistent snapshot of the active market.
///
/// Either `market` is a complete market or it is `None` and `loading` is
/// set. Reserve lists are never partially populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDataView {
    /// Registry name of the selected market.
    pub market_name: String,
    /// Selection epoch this view was computed for.
    pub epoch: u64,
    pub state: ReconcileState,
    pub loading: bool,

    pub market: Option<Market>,
    pub total_borrows: Option<Decimal>,
    pub supply_reserves: Vec<Reserve>,
    pub borrow_reserves: Vec<Reserve>,
    pub e_mode_categories: Vec<EmodeMarketCategory>,
    pub user_state: Option<MarketUserState>,

    // Legacy fields.
    pub reserves: Vec<FormattedReserve>,
    pub e_modes: BTreeMap<u8, FormattedEmode>,
    pub user_reserves: Vec<UserReserve>,
    pub user_emode_category_id: u8,
    pub market_reference_price_in_usd: String,
    pub market_reference_currency_decimals: u8,

    /// Sources whose latest fetch failed.
    pub errors: Vec<SourceError>,
    /// Some USD value in this view was unparseable and counted as zero.
    pub degraded: bool,
}

impl AppDataView {
    /// The view before any source has reported.
    pub fn initial(market_name: impl Into<String>, epoch: u64) -> Self {
        Self {
            market_name: market_name.into(),
            epoch,
            state: ReconcileState::IndexedPending,
            loading: true,
            market: None,
            total_borrows: None,
            supply_reserves: Vec::new(),
            borrow_reserves: Vec::new(),
            e_mode_categories: Vec::new(),
            user_state: None,
            reserves: Vec::new(),
            e_modes: BTreeMap::new(),
            user_reserves: Vec::new(),
            user_emode_category_id: 0,
            market_reference_price_in_usd: "0".to_string(),
            market_reference_currency_decimals: 0,
            errors: Vec::new(),
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_view_is_loading_and_empty() {
        let v = AppDataView::initial("test_sepolia_v3", 0);
        assert!(v.loading);
        assert!(v.market.is_none());
        assert_eq!(v.state, ReconcileState::IndexedPending);
        assert_eq!(v.market_reference_price_in_usd, "0");
    }

    #[test]
    fn serializes_camel_case_legacy_fields() {
        let v = AppDataView::initial("m", 1);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["marketReferencePriceInUsd"], "0");
        assert_eq!(json["marketReferenceCurrencyDecimals"], 0);
        assert_eq!(json["userEmodeCategoryId"], 0);
        assert_eq!(json["state"], "INDEXED_PENDING");
        assert!(json["eModes"].as_object().unwrap().is_empty());
        assert!(json["totalBorrows"].is_null());
    }
}
