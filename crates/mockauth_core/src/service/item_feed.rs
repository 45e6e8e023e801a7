//! Session-scoped item feed.
//!
//! # Responsibility
//! - Follow the active session key and keep one item-store observation open
//!   for it, switching observations when the key changes.
//! - Keep the observation alive for a grace period after the last consumer
//!   detaches, so a quick re-attach does not re-seed.
//! - Scope item commands to the active session.
//!
//! # Invariants
//! - No list from a superseded key is published after the switch is seen,
//!   including values already in flight.
//! - Without an active key the published list is empty.
//! - Attaching bumps the lease generation, which invalidates any pending
//!   expiry; only the expiry scheduled by the latest detach can stop the
//!   upstream task.
//!
//! # Phases
//! `Idle` (no upstream) -> `Active` (>= 1 consumer) -> `Draining` (no
//! consumer, lease pending) -> `Active` on re-attach or `Idle` on expiry.

use crate::clock::{Clock, Latency};
use crate::model::identity::{SessionKey, SessionState};
use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::ItemRepository;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Externally visible lifecycle phase of the feed's upstream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Active,
    Draining { expires_at: Instant },
}

/// Disposition of a session-scoped item command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemWrite {
    /// Forwarded to the item store (which may still treat it as a no-op).
    Applied,
    /// Skipped: nobody is signed in.
    NoActiveSession,
}

#[derive(Default)]
struct FeedInner {
    consumers: usize,
    upstream: Option<JoinHandle<()>>,
    lease_gen: u64,
    draining_until: Option<Instant>,
}

/// Items of the active session, shared by every attached consumer.
///
/// # Runtime
/// - `ItemFeed::new` captures the current Tokio runtime handle and must be
///   called from within one. Attach/detach may then happen on any thread.
pub struct ItemFeed {
    session: watch::Receiver<SessionState>,
    items: Arc<ItemRepository>,
    clock: Clock,
    runtime: Handle,
    output: Arc<watch::Sender<Vec<Item>>>,
    inner: Mutex<FeedInner>,
}

impl ItemFeed {
    pub fn new(
        session: watch::Receiver<SessionState>,
        items: Arc<ItemRepository>,
        clock: Clock,
    ) -> Arc<Self> {
        let (output, _) = watch::channel(Vec::new());
        Arc::new(Self {
            session,
            items,
            clock,
            runtime: Handle::current(),
            output: Arc::new(output),
            inner: Mutex::new(FeedInner::default()),
        })
    }

    /// Attaches one consumer, starting or reviving the upstream subscription.
    pub fn subscribe(self: &Arc<Self>) -> ItemFeedSubscription {
        let mut inner = self.lock();
        inner.consumers += 1;
        inner.lease_gen += 1;
        let was_draining = inner.draining_until.take().is_some();

        if inner.upstream.is_none() {
            self.output.send_if_modified(clear_list);
            inner.upstream = Some(self.runtime.spawn(run_upstream(
                self.session.clone(),
                Arc::clone(&self.items),
                Arc::clone(&self.output),
            )));
            info!("event=feed_start module=items status=ok");
        } else if was_draining {
            info!("event=feed_reattach module=items status=ok");
        }
        let rx = self.output.subscribe();
        drop(inner);

        ItemFeedSubscription {
            feed: Arc::clone(self),
            rx,
        }
    }

    pub fn phase(&self) -> FeedPhase {
        let inner = self.lock();
        if inner.consumers > 0 {
            return FeedPhase::Active;
        }
        match (&inner.upstream, inner.draining_until) {
            (Some(_), Some(expires_at)) => FeedPhase::Draining { expires_at },
            _ => FeedPhase::Idle,
        }
    }

    /// Latest published list, without attaching.
    pub fn current_items(&self) -> Vec<Item> {
        self.output.borrow().clone()
    }

    /// Applies the edit action: renames the item to `"<name> (EDITED)"`.
    pub async fn update_item(&self, item: &Item) -> ItemWrite {
        self.rename_item(item.id, item.edited_name().as_str()).await
    }

    pub async fn rename_item(&self, item_id: ItemId, new_name: &str) -> ItemWrite {
        let Some(key) = self.active_key() else {
            error!(
                "event=item_update module=items status=error reason=unauthenticated item_id={item_id}"
            );
            return ItemWrite::NoActiveSession;
        };
        self.items.update(key.as_str(), item_id, new_name).await;
        ItemWrite::Applied
    }

    pub async fn delete_item(&self, item_id: ItemId) -> ItemWrite {
        let Some(key) = self.active_key() else {
            error!(
                "event=item_delete module=items status=error reason=unauthenticated item_id={item_id}"
            );
            return ItemWrite::NoActiveSession;
        };
        self.items.delete(key.as_str(), item_id).await;
        ItemWrite::Applied
    }

    fn active_key(&self) -> Option<SessionKey> {
        self.session.borrow().active_key().map(str::to_owned)
    }

    fn detach(self: &Arc<Self>) {
        let lease = {
            let mut inner = self.lock();
            inner.consumers = inner.consumers.saturating_sub(1);
            if inner.consumers > 0 || inner.upstream.is_none() {
                None
            } else {
                inner.lease_gen += 1;
                let deadline = self.clock.deadline(Latency::KeepAlive);
                inner.draining_until = Some(deadline);
                Some((inner.lease_gen, deadline))
            }
        };

        if let Some((generation, deadline)) = lease {
            debug!("event=feed_drain module=items status=scheduled generation={generation}");
            let feed = Arc::clone(self);
            self.runtime.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                feed.check_lease_expiry(generation);
            });
        }
    }

    fn check_lease_expiry(&self, generation: u64) {
        let upstream = {
            let mut inner = self.lock();
            if inner.lease_gen != generation || inner.consumers > 0 {
                return;
            }
            inner.draining_until = None;
            inner.upstream.take()
        };
        if let Some(handle) = upstream {
            handle.abort();
            info!("event=feed_stop module=items status=ok reason=lease_expired");
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ItemFeed {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = inner.upstream.take() {
            handle.abort();
        }
    }
}

/// One attached consumer. Dropping it detaches and may start the grace period.
pub struct ItemFeedSubscription {
    feed: Arc<ItemFeed>,
    rx: watch::Receiver<Vec<Item>>,
}

impl ItemFeedSubscription {
    pub fn current(&self) -> Vec<Item> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published list.
    pub async fn changed(&mut self) -> Option<Vec<Item>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the published list satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&Vec<Item>) -> bool,
    ) -> Option<Vec<Item>> {
        let list = self.rx.wait_for(predicate).await.ok()?;
        Some(list.clone())
    }

    pub fn feed(&self) -> &Arc<ItemFeed> {
        &self.feed
    }
}

impl Drop for ItemFeedSubscription {
    fn drop(&mut self) {
        self.feed.detach();
    }
}

fn clear_list(list: &mut Vec<Item>) -> bool {
    if list.is_empty() {
        return false;
    }
    list.clear();
    true
}

/// Switch-to-latest loop: one item-store observation per distinct active key.
async fn run_upstream(
    mut session: watch::Receiver<SessionState>,
    items: Arc<ItemRepository>,
    output: Arc<watch::Sender<Vec<Item>>>,
) {
    loop {
        let key = session.borrow_and_update().active_key().map(str::to_owned);
        // Entering a new key (or none) never shows the previous key's items.
        output.send_if_modified(clear_list);

        let Some(key) = key else {
            if session.changed().await.is_err() {
                return;
            }
            continue;
        };

        debug!("event=feed_switch module=items status=ok");
        let mut observation = items.observe(key.clone());
        loop {
            tokio::select! {
                biased;
                changed = session.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if session.borrow().active_key() != Some(key.as_str()) {
                        break;
                    }
                }
                next = observation.next() => {
                    let Some(list) = next else {
                        return;
                    };
                    if session.borrow().active_key() != Some(key.as_str()) {
                        break;
                    }
                    output.send_replace(list);
                }
            }
        }
    }
}
