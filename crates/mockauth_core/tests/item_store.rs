use mockauth_core::{default_items, Item, ItemRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn store() -> Arc<ItemRepository> {
    Arc::new(ItemRepository::default())
}

async fn seeded(key: &str) -> Arc<ItemRepository> {
    let repo = store();
    repo.observe(key).next().await.unwrap();
    repo
}

#[tokio::test(start_paused = true)]
async fn first_observation_seeds_after_latency() {
    let repo = store();
    let start = Instant::now();

    let items = repo.observe("K").next().await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert_eq!(items, vec![Item::new(1, "Task A"), Item::new(2, "Task B")]);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_first_observations_seed_once() {
    let repo = store();
    let mut first = repo.observe("K");
    let mut second = repo.observe("K");

    let (a, b) = tokio::join!(first.next(), second.next());

    assert_eq!(a.unwrap(), default_items());
    assert_eq!(b.unwrap(), default_items());
    assert_eq!(repo.snapshot("K").unwrap(), default_items());
}

#[tokio::test(start_paused = true)]
async fn many_spawned_first_observations_seed_once() {
    let repo = store();
    let handles = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.observe("K").next().await })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), default_items());
    }
    assert_eq!(repo.snapshot("K").unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn update_renames_in_place() {
    let repo = seeded("K").await;

    let start = Instant::now();
    repo.update("K", 1, "X").await;
    assert_eq!(start.elapsed(), Duration::from_millis(200));

    let items = repo.observe("K").next().await.unwrap();
    assert_eq!(items, vec![Item::new(1, "X"), Item::new(2, "Task B")]);
}

#[tokio::test(start_paused = true)]
async fn delete_closes_gap_and_keeps_order() {
    let repo = seeded("K").await;

    repo.delete("K", 1).await;

    let items = repo.observe("K").next().await.unwrap();
    assert_eq!(items, vec![Item::new(2, "Task B")]);
}

#[tokio::test(start_paused = true)]
async fn missing_item_ids_are_silent_noops() {
    let repo = seeded("K").await;

    repo.update("K", 99, "X").await;
    repo.delete("K", 42).await;

    assert_eq!(repo.snapshot("K").unwrap(), default_items());
}

#[tokio::test(start_paused = true)]
async fn active_observer_receives_pushed_changes() {
    let repo = seeded("K").await;
    let mut observation = repo.observe("K");
    assert_eq!(observation.next().await.unwrap(), default_items());

    let writer = Arc::clone(&repo);
    tokio::spawn(async move { writer.update("K", 2, "Renamed").await });

    let items = observation.next().await.unwrap();
    assert_eq!(items, vec![Item::new(1, "Task A"), Item::new(2, "Renamed")]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_writes_to_same_key_both_apply() {
    let repo = seeded("K").await;

    tokio::join!(repo.update("K", 1, "X"), repo.delete("K", 2));

    assert_eq!(repo.snapshot("K").unwrap(), vec![Item::new(1, "X")]);
}

#[tokio::test(start_paused = true)]
async fn other_keys_do_not_wake_observer() {
    let repo = seeded("K1").await;
    let mut observation = repo.observe("K1");
    observation.next().await.unwrap();

    repo.observe("K2").next().await.unwrap();
    repo.update("K2", 1, "X").await;

    let woke = tokio::time::timeout(Duration::from_secs(1), observation.next()).await;
    assert!(woke.is_err());
    assert_eq!(repo.snapshot("K1").unwrap(), default_items());
}
