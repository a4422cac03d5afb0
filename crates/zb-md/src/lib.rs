//! zb-md
//!
//! Market-data engine. Turns contract-sourced reserve data into canonical
//! market view models:
//!
//! raw reserves + incentives + e-modes
//!   -> [`format`] (join, sort, e-mode decode)
//!   -> [`transform`] (one canonical reserve each, via [`normalizer`] and [`incentives`])
//!   -> [`aggregate`] (USD totals)
//!   -> [`fallback`] (a full market)
//!
//! It also owns the source boundary ([`provider`]) and the GraphQL indexed
//! source ([`indexed`]). It does not poll and does not decide which source
//! wins; that is `zb-reconcile`.

pub mod aggregate;
pub mod fallback;
pub mod format;
pub mod incentives;
pub mod indexed;
pub mod normalizer;
pub mod provider;
pub mod transform;

pub use aggregate::{compute_aggregate_metrics, AggregateMetrics};
pub use fallback::{build_fallback_market, FallbackMarket};
pub use format::{format_emodes, format_reserves, join_incentives};
pub use incentives::map_incentives;
pub use indexed::GraphqlMarketSource;
pub use normalizer::{normalize, normalize_bps, normalize_liquidation_bonus, normalize_ray, NormalizeError};
pub use provider::{
    fetch_reserve_incentives, IncentivesDataProvider, IndexedMarketSource, IndexedMarketsRequest,
    PoolDataProvider, ProviderError, UserReservesProvider,
};
pub use transform::{borrowing_state, transform_reserve, PROTOCOL_NAME};
