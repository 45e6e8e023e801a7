//! Core domain logic for the mock authentication backend.
//! This crate is the single source of truth for session and item invariants.

pub mod backend;
pub mod clock;
pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use backend::MockBackend;
pub use clock::{Clock, Latency};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::identity::{stable_hash, ActionStatus, Identity, SessionKey, SessionState};
pub use model::item::{default_items, Item, ItemId};
pub use repo::item_repo::{ItemObservation, ItemRepository};
pub use repo::session_repo::SessionRepository;
pub use service::auth_service::AuthService;
pub use service::error_signal::{error_channel, ErrorReceiver, ErrorSender, SendOutcome};
pub use service::item_feed::{FeedPhase, ItemFeed, ItemFeedSubscription, ItemWrite};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
