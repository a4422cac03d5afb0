//! Selection-epoch watermark.
//!
//! Every source update is tagged with the selection epoch it was fetched
//! for. After the active market changes, updates still in flight for the old
//! selection must be ignored rather than merged into the new view.
//!
//! # Invariants
//!
//! - **Monotonic**: the watermark only moves forward; [`EpochWatermark::advance`]
//!   to an older epoch is refused.
//! - **Exact match**: an update is accepted only if its epoch equals the
//!   watermark. Older updates are stale; newer ones are early (the selection
//!   change has not been observed yet) and will be re-read once it is.
//! - **Pure, no IO**.

use serde::{Deserialize, Serialize};

/// A value fetched for a specific selection epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTagged<T> {
    pub epoch: u64,
    pub value: T,
}

impl<T> EpochTagged<T> {
    pub fn new(epoch: u64, value: T) -> Self {
        Self { epoch, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochFreshness {
    Current,
    /// Fetched for a selection that is no longer active.
    Stale { watermark: u64, got: u64 },
    /// Fetched for a selection the consumer has not seen yet.
    Early { watermark: u64, got: u64 },
}

impl EpochFreshness {
    pub fn is_current(&self) -> bool {
        matches!(self, EpochFreshness::Current)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EpochWatermark {
    current: u64,
}

impl EpochWatermark {
    pub fn new(epoch: u64) -> Self {
        Self { current: epoch }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Move to `epoch`. Returns `false` (and does nothing) if `epoch` is older.
    pub fn advance(&mut self, epoch: u64) -> bool {
        if epoch < self.current {
            return false;
        }
        self.current = epoch;
        true
    }

    pub fn accept<T>(&self, update: &EpochTagged<T>) -> EpochFreshness {
        self.check(update.epoch)
    }

    pub fn check(&self, epoch: u64) -> EpochFreshness {
        use std::cmp::Ordering::*;
        match epoch.cmp(&self.current) {
            Equal => EpochFreshness::Current,
            Less => EpochFreshness::Stale {
                watermark: self.current,
                got: epoch,
            },
            Greater => EpochFreshness::Early {
                watermark: self.current,
                got: epoch,
            },
        }
    }
}
