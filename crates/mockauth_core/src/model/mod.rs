//! Domain model for sessions and session-owned items.
//!
//! # Responsibility
//! - Define canonical data structures shared by stores and services.
//!
//! # Invariants
//! - Every item collection is keyed by the owning identity's stable id.
//! - Session state is always derived from the current identity, never stored
//!   on its own.

pub mod identity;
pub mod item;
