//! The four-state source-selection machine.
//!
//! ```text
//!                       indexed match
//!   INDEXED_PENDING ─────────────────────────────▶ USING_INDEXED
//!         │
//!         │ indexed resolved, no match (or failed)
//!         ▼
//!   FALLBACK_PENDING ── raw reserves available ──▶ USING_FALLBACK
//! ```
//!
//! The machine is re-run on every evaluation from the latest source states;
//! it holds no memory of its own, so any state is reachable from any other
//! when the inputs change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileState {
    IndexedPending,
    UsingIndexed,
    FallbackPending,
    UsingFallback,
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::IndexedPending => "INDEXED_PENDING",
            ReconcileState::UsingIndexed => "USING_INDEXED",
            ReconcileState::FallbackPending => "FALLBACK_PENDING",
            ReconcileState::UsingFallback => "USING_FALLBACK",
        }
    }
}

/// What the indexed source has told us about the active market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedStatus {
    Pending,
    /// Resolved and contains a market with the configured pool address.
    Matched,
    /// Resolved without a match, or failed.
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyInputs {
    pub indexed: IndexedStatus,
    /// Formatted raw reserves (reserves, incentives and e-modes all ready).
    pub raw_available: bool,
}

pub fn classify(inputs: ClassifyInputs) -> ReconcileState {
    match inputs.indexed {
        IndexedStatus::Matched => ReconcileState::UsingIndexed,
        IndexedStatus::Pending => ReconcileState::IndexedPending,
        IndexedStatus::NoMatch if inputs.raw_available => ReconcileState::UsingFallback,
        IndexedStatus::NoMatch => ReconcileState::FallbackPending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(indexed: IndexedStatus, raw_available: bool) -> ReconcileState {
        classify(ClassifyInputs {
            indexed,
            raw_available,
        })
    }

    #[test]
    fn full_transition_table() {
        use IndexedStatus::*;
        use ReconcileState::*;
        assert_eq!(c(Pending, false), IndexedPending);
        assert_eq!(c(Pending, true), IndexedPending);
        assert_eq!(c(Matched, false), UsingIndexed);
        assert_eq!(c(Matched, true), UsingIndexed);
        assert_eq!(c(NoMatch, false), FallbackPending);
        assert_eq!(c(NoMatch, true), UsingFallback);
    }

    #[test]
    fn wire_names() {
        for s in [
            ReconcileState::IndexedPending,
            ReconcileState::UsingIndexed,
            ReconcileState::FallbackPending,
            ReconcileState::UsingFallback,
        ] {
            assert_eq!(
                serde_json::to_string(&s).unwrap(),
                format!("\"{}\"", s.as_str())
            );
        }
    }
}
