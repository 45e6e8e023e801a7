//! In-memory stores standing in for the remote auth and data services.
//!
//! # Responsibility
//! - Own the current identity and the keyed item map.
//! - Publish every committed change through `tokio::sync::watch`.
//!
//! # Invariants
//! - Each store is the only writer of its state.
//! - Simulated latency always precedes the write it guards.

pub mod item_repo;
pub mod session_repo;
