//! Incentive mapping: raw per-reserve incentive entries to [`Incentive`]s.

use zb_schemas::{
    Currency, Incentive, IncentiveKind, PercentValue, RawIncentive, ReserveIncentives,
    DEFAULT_REWARD_TOKEN_DECIMALS,
};

fn to_incentive(kind: IncentiveKind, raw: &RawIncentive) -> Incentive {
    Incentive {
        kind,
        apy: PercentValue::new(raw.incentive_apr.clone()),
        token: Currency {
            address: raw.reward_token_address.clone(),
            symbol: raw.reward_token_symbol.clone(),
            // The incentives controller publishes only the symbol.
            name: raw.reward_token_symbol.clone(),
            decimals: DEFAULT_REWARD_TOKEN_DECIMALS,
        },
    }
}

/// Supply entries first, then borrow entries, each in their original order.
pub fn map_incentives(record: &ReserveIncentives) -> Vec<Incentive> {
    let supply = record
        .a_incentives_data
        .iter()
        .map(|r| to_incentive(IncentiveKind::Supply, r));
    let borrow = record
        .v_incentives_data
        .iter()
        .map(|r| to_incentive(IncentiveKind::Borrow, r));
    supply.chain(borrow).collect()
}
