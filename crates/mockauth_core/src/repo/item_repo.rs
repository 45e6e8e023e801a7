//! Keyed item store.
//!
//! # Responsibility
//! - Own the map from session key to ordered item list.
//! - Seed a key lazily on its first observation.
//! - Apply update/delete with simulated latency.
//!
//! # Invariants
//! - Seeding is check-then-insert inside one atomic map modification, so
//!   concurrent first observations of a key produce exactly one seed.
//! - A dropped observation never leaves partial seed data: the only write it
//!   performs happens after its latency has fully elapsed.
//! - Writes are read-modify-write over the current map, never over a snapshot.
//! - Update/delete never create a collection for an unseeded key.

use crate::clock::{Clock, Latency};
use crate::model::identity::SessionKey;
use crate::model::item::{default_items, Item, ItemId};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

pub type ItemMap = HashMap<SessionKey, Vec<Item>>;

/// In-memory owner of every key's item collection.
pub struct ItemRepository {
    clock: Clock,
    items: watch::Sender<ItemMap>,
}

impl ItemRepository {
    pub fn new(clock: Clock) -> Self {
        let (items, _) = watch::channel(ItemMap::new());
        Self { clock, items }
    }

    /// Starts a lazy observation of `key`.
    ///
    /// Nothing happens until the first `ItemObservation::next` call; seeding
    /// (if needed) is part of that call.
    pub fn observe(self: &Arc<Self>, key: impl Into<SessionKey>) -> ItemObservation {
        ItemObservation {
            repo: Arc::clone(self),
            key: key.into(),
            rx: self.items.subscribe(),
            started: false,
            seed_deadline: None,
            last: None,
        }
    }

    /// Current list for `key`, or `None` if the key has never been seeded.
    pub fn snapshot(&self, key: &str) -> Option<Vec<Item>> {
        self.items.borrow().get(key).cloned()
    }

    pub fn is_seeded(&self, key: &str) -> bool {
        self.items.borrow().contains_key(key)
    }

    /// Renames `item_id` under `key` after the write latency.
    ///
    /// Missing key or item id is a silent no-op.
    pub async fn update(&self, key: &str, item_id: ItemId, new_name: &str) {
        debug!("event=item_update module=items status=start item_id={item_id}");
        self.clock.delay(Latency::ItemWrite).await;
        let changed = self.items.send_if_modified(|map| {
            let Some(item) = map
                .get_mut(key)
                .and_then(|items| items.iter_mut().find(|item| item.id == item_id))
            else {
                return false;
            };
            if item.name == new_name {
                return false;
            }
            item.name = new_name.to_string();
            true
        });
        info!(
            "event=item_update module=items status={} item_id={item_id}",
            if changed { "ok" } else { "noop" }
        );
    }

    /// Removes `item_id` under `key` after the write latency, keeping the
    /// relative order of the remaining items.
    ///
    /// Missing key or item id is a silent no-op.
    pub async fn delete(&self, key: &str, item_id: ItemId) {
        debug!("event=item_delete module=items status=start item_id={item_id}");
        self.clock.delay(Latency::ItemWrite).await;
        let changed = self.items.send_if_modified(|map| {
            let Some(items) = map.get_mut(key) else {
                return false;
            };
            let before = items.len();
            items.retain(|item| item.id != item_id);
            items.len() != before
        });
        info!(
            "event=item_delete module=items status={} item_id={item_id}",
            if changed { "ok" } else { "noop" }
        );
    }

    /// Inserts the default collection for `key` unless one already exists.
    ///
    /// Returns whether this call performed the seed.
    fn seed_if_absent(&self, key: &str) -> bool {
        let seeded = self.items.send_if_modified(|map| {
            if map.contains_key(key) {
                return false;
            }
            map.insert(key.to_string(), default_items());
            true
        });
        if seeded {
            info!("event=item_seed module=items status=ok");
        } else {
            debug!("event=item_seed module=items status=skipped reason=already_seeded");
        }
        seeded
    }
}

impl Default for ItemRepository {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

/// One subscriber's view of a key's collection.
///
/// Dropping it cancels the subscription, including an in-flight seed wait.
pub struct ItemObservation {
    repo: Arc<ItemRepository>,
    key: SessionKey,
    rx: watch::Receiver<ItemMap>,
    started: bool,
    seed_deadline: Option<Instant>,
    last: Option<Vec<Item>>,
}

impl ItemObservation {
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Waits for the next distinct list for this key.
    ///
    /// The first call seeds the key if needed, then returns the current list
    /// immediately. Later calls resolve only when this key's list changes.
    /// Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<Item>> {
        if !self.started {
            if !self.repo.is_seeded(self.key.as_str()) {
                // A cancelled call resumes against the same deadline.
                let clock = &self.repo.clock;
                let deadline = *self
                    .seed_deadline
                    .get_or_insert_with(|| clock.deadline(Latency::Seed));
                clock.delay_until(deadline).await;
                self.repo.seed_if_absent(self.key.as_str());
            }
            self.started = true;
        }

        loop {
            let current = self
                .rx
                .borrow_and_update()
                .get(self.key.as_str())
                .cloned()
                .unwrap_or_default();
            if self.last.as_ref() != Some(&current) {
                self.last = Some(current.clone());
                return Some(current);
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ItemRepository;
    use crate::model::item::Item;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn cancelled_next_resumes_seed_deadline() {
        let repo = Arc::new(ItemRepository::default());
        let mut observation = repo.observe("k");
        let start = Instant::now();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(300), observation.next()).await;
        assert!(cancelled.is_err());

        let items = observation.next().await.expect("store alive");
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_observation_leaves_no_seed() {
        let repo = Arc::new(ItemRepository::default());
        let mut observation = repo.observe("k");

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), observation.next()).await;
        assert!(cancelled.is_err());
        drop(observation);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!repo.is_seeded("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_key_is_returned_without_latency() {
        let repo = Arc::new(ItemRepository::default());
        repo.observe("k").next().await;

        let start = Instant::now();
        let items = repo.observe("k").next().await.expect("store alive");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_to_unseeded_key_are_noops() {
        let repo = Arc::new(ItemRepository::default());
        repo.update("ghost", 1, "X").await;
        repo.delete("ghost", 2).await;
        assert!(repo.snapshot("ghost").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn emptied_collection_is_not_reseeded() {
        let repo = Arc::new(ItemRepository::default());
        repo.observe("k").next().await;
        repo.delete("k", 1).await;
        repo.delete("k", 2).await;

        let items = repo.observe("k").next().await.expect("store alive");
        assert_eq!(items, Vec::<Item>::new());
    }
}
