//! Simulated latency primitive.
//!
//! Every artificial wait in the core goes through `Clock::delay`, which is a
//! cooperative `tokio::time::sleep`. Tests pause the Tokio clock and advance it
//! explicitly, so no operation depends on wall-clock time.

use crate::config::CoreConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Named latency classes, resolved to durations through `CoreConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    SignIn,
    Link,
    Seed,
    ItemWrite,
    KeepAlive,
}

#[derive(Debug, Clone)]
pub struct Clock {
    sign_in: Duration,
    link: Duration,
    seed: Duration,
    item_write: Duration,
    keep_alive: Duration,
}

impl Clock {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            sign_in: config.units(config.sign_in_latency),
            link: config.units(config.link_latency),
            seed: config.units(config.seed_latency),
            item_write: config.units(config.item_write_latency),
            keep_alive: config.units(config.keep_alive),
        }
    }

    pub fn duration(&self, latency: Latency) -> Duration {
        match latency {
            Latency::SignIn => self.sign_in,
            Latency::Link => self.link,
            Latency::Seed => self.seed,
            Latency::ItemWrite => self.item_write,
            Latency::KeepAlive => self.keep_alive,
        }
    }

    /// Suspends the caller for the configured latency. Zero latency still
    /// yields once so callers always hit a suspension point.
    pub async fn delay(&self, latency: Latency) {
        let duration = self.duration(latency);
        if duration.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(duration).await;
        }
    }

    /// Suspends until `deadline`; an elapsed deadline still yields once.
    pub async fn delay_until(&self, deadline: Instant) {
        if deadline <= Instant::now() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep_until(deadline).await;
        }
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Instant at which a lease started now would expire.
    pub fn deadline(&self, latency: Latency) -> Instant {
        self.now() + self.duration(latency)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(&CoreConfig::default())
    }
}
