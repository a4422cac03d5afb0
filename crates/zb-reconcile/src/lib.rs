//! zb-reconcile
//!
//! Decides, per market selection, whether the indexed snapshot or the
//! chain-built fallback market is shown, and assembles the view model.
//!
//! - [`machine`]: the INDEXED_PENDING / USING_INDEXED / FALLBACK_PENDING /
//!   USING_FALLBACK classification.
//! - [`engine`]: the [`Reconciler`], memoized by input identity.
//! - [`watermark`]: drops source updates fetched for an old selection.
//!
//! Deterministic, pure logic. No IO. No polling.

pub mod engine;
pub mod machine;
pub mod source;
pub mod view;
pub mod watermark;

pub use engine::{CacheStats, ReconcileInputs, Reconciler};
pub use machine::{classify, ClassifyInputs, IndexedStatus, ReconcileState};
pub use source::{SourceError, SourceKind, SourceState};
pub use view::AppDataView;
pub use watermark::{EpochFreshness, EpochTagged, EpochWatermark};
