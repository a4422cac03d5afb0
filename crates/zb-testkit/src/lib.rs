//! Test support: raw reserve fixtures and scripted sources.
//!
//! Not for production builds; depend on it from `[dev-dependencies]` only.

pub mod fixtures;
pub mod scripted;

pub use fixtures::*;
pub use scripted::{
    Script, ScriptedIncentives, ScriptedIndexed, ScriptedPoolData, ScriptedUserReserves, Step,
};
