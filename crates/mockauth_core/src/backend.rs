//! Backend composition root.
//!
//! # Responsibility
//! - Build exactly one session store, item store, auth service and item feed
//!   from a `CoreConfig` and hand them out by reference.
//!
//! # Invariants
//! - The item feed follows the auth service's projected state, never the raw
//!   identity, so it sees `Loading` like every other consumer.
//!
//! # Runtime
//! - `MockBackend::new` spawns background tasks and must be called from
//!   within a Tokio runtime.

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::repo::item_repo::ItemRepository;
use crate::repo::session_repo::SessionRepository;
use crate::service::auth_service::AuthService;
use crate::service::item_feed::ItemFeed;
use log::info;
use std::sync::Arc;

pub struct MockBackend {
    config: CoreConfig,
    auth: AuthService,
    items: Arc<ItemRepository>,
    feed: Arc<ItemFeed>,
}

impl MockBackend {
    pub fn new(config: CoreConfig) -> Self {
        let clock = Clock::new(&config);
        let sessions = Arc::new(SessionRepository::new(clock.clone()));
        let items = Arc::new(ItemRepository::new(clock.clone()));
        let auth = AuthService::new(sessions, config.error_buffer_capacity);
        let feed = ItemFeed::new(auth.watch_state(), Arc::clone(&items), clock);
        info!(
            "event=backend_init module=core status=ok time_unit_ms={} keep_alive={}",
            config.time_unit_ms, config.keep_alive
        );
        Self {
            config,
            auth,
            items,
            feed,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn items(&self) -> &Arc<ItemRepository> {
        &self.items
    }

    pub fn feed(&self) -> &Arc<ItemFeed> {
        &self.feed
    }
}
