//! Core use-case services.
//!
//! # Responsibility
//! - Turn store state into what the UI observes (session state, item feed).
//! - Route transient failures to the error channel.
//! - Keep UI/FFI layers decoupled from store internals.

pub mod auth_service;
pub mod error_signal;
pub mod item_feed;
