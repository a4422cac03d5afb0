//! Latest observed state of one independently polled source.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zb_md::ProviderError;

/// The sources feeding one market view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Indexed,
    Reserves,
    Incentives,
    Emodes,
    UserReserves,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Indexed,
        SourceKind::Reserves,
        SourceKind::Incentives,
        SourceKind::Emodes,
        SourceKind::UserReserves,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Indexed => "indexed",
            SourceKind::Reserves => "reserves",
            SourceKind::Incentives => "incentives",
            SourceKind::Emodes => "emodes",
            SourceKind::UserReserves => "user_reserves",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Ready` values are shared, so an unchanged value keeps its pointer
/// identity across evaluations and can be used as a memo key.
#[derive(Debug)]
pub enum SourceState<T> {
    /// No result yet.
    Pending,
    Ready(Arc<T>),
    /// A refresh failed after an earlier success. Dependents keep using the
    /// last good value; the error is still reported.
    Stale { value: Arc<T>, error: ProviderError },
    /// The latest fetch failed. Dependents treat the source as unresolved.
    Failed(ProviderError),
}

// Manual impl: `T` itself need not be `Clone`.
impl<T> Clone for SourceState<T> {
    fn clone(&self) -> Self {
        match self {
            SourceState::Pending => SourceState::Pending,
            SourceState::Ready(v) => SourceState::Ready(Arc::clone(v)),
            SourceState::Stale { value, error } => SourceState::Stale {
                value: Arc::clone(value),
                error: error.clone(),
            },
            SourceState::Failed(e) => SourceState::Failed(e.clone()),
        }
    }
}

impl<T> Default for SourceState<T> {
    fn default() -> Self {
        SourceState::Pending
    }
}

impl<T> SourceState<T> {
    pub fn ready(value: T) -> Self {
        SourceState::Ready(Arc::new(value))
    }

    pub fn from_result(r: Result<T, ProviderError>) -> Self {
        match r {
            Ok(v) => Self::ready(v),
            Err(e) => SourceState::Failed(e),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SourceState::Pending)
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            SourceState::Ready(v) | SourceState::Stale { value: v, .. } => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            SourceState::Failed(e) | SourceState::Stale { error: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// A source failure as shown to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceError {
    pub source: SourceKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_maps_both_arms() {
        let ok: SourceState<u32> = SourceState::from_result(Ok(7));
        assert_eq!(ok.value().map(|v| **v), Some(7));
        assert!(ok.error().is_none());

        let err: SourceState<u32> =
            SourceState::from_result(Err(ProviderError::Transport("down".to_string())));
        assert!(err.value().is_none());
        assert!(!err.is_pending());
        assert_eq!(err.error().map(|e| e.to_string()).as_deref(), Some("transport error: down"));
    }

    #[test]
    fn clone_shares_ready_value() {
        let a = SourceState::ready(vec![1, 2, 3]);
        let b = a.clone();
        assert!(Arc::ptr_eq(a.value().unwrap(), b.value().unwrap()));
    }

    #[test]
    fn stale_keeps_value_and_reports_error() {
        let last = Arc::new(5u32);
        let s = SourceState::Stale {
            value: Arc::clone(&last),
            error: ProviderError::Transport("timeout".to_string()),
        };
        assert!(Arc::ptr_eq(s.value().unwrap(), &last));
        assert!(s.error().is_some());
        assert!(!s.is_pending());
        assert!(Arc::ptr_eq(s.clone().value().unwrap(), &last));
    }

    #[test]
    fn default_is_pending() {
        assert!(SourceState::<String>::default().is_pending());
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&SourceKind::UserReserves).unwrap(),
            "\"user_reserves\""
        );
        assert_eq!(SourceKind::Emodes.to_string(), "emodes");
    }
}
