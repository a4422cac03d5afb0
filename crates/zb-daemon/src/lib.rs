//! zb-daemon library target.
//!
//! Exposes the router, state, pollers, and file-backed sources for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod poller;
pub mod routes;
pub mod sources;
pub mod state;
