//! Session store: owner of the current identity.
//!
//! # Responsibility
//! - Hold zero or one `Identity` and publish every change to observers.
//! - Execute sign-in, anonymous sign-in, link and sign-out with simulated
//!   latency and content-derived failures.
//!
//! # Invariants
//! - Failures are decided before any latency and never touch the identity.
//! - Every identity write is one atomic replace/modify on the watch channel,
//!   so observers never see a partially linked identity.
//! - Linking preserves `Identity::id`.

use crate::clock::{Clock, Latency};
use crate::model::identity::{ActionStatus, Identity};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::watch;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials. Try 'user@test.com'.";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check connection and retry.";
pub const EMAIL_ALREADY_LINKED_MESSAGE: &str = "Email is already linked to another account.";

static FAIL_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fail").expect("valid fail marker regex"));
static NETWORK_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)network").expect("valid network marker regex"));

/// In-memory identity owner.
pub struct SessionRepository {
    clock: Clock,
    current: watch::Sender<Option<Identity>>,
}

impl SessionRepository {
    pub fn new(clock: Clock) -> Self {
        let (current, _) = watch::channel(None);
        Self { clock, current }
    }

    /// Subscribes to the current identity. The receiver starts at the latest value.
    pub fn identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Signs in with an email-derived permanent identity.
    ///
    /// # Contract
    /// - `fail` marker (any case): immediate invalid-credentials failure.
    /// - `network` marker (any case): immediate network failure.
    /// - Otherwise waits the sign-in latency, replaces the identity, `Success`.
    pub async fn sign_in(&self, email: &str) -> ActionStatus {
        if FAIL_MARKER_RE.is_match(email) {
            info!("event=sign_in module=session status=rejected reason=invalid_credentials");
            return ActionStatus::failure(INVALID_CREDENTIALS_MESSAGE);
        }
        if NETWORK_MARKER_RE.is_match(email) {
            info!("event=sign_in module=session status=rejected reason=network");
            return ActionStatus::failure(NETWORK_ERROR_MESSAGE);
        }

        self.clock.delay(Latency::SignIn).await;
        let identity = Identity::permanent(email);
        info!(
            "event=sign_in module=session status=ok user_id={}",
            identity.id
        );
        self.current.send_replace(Some(identity));
        ActionStatus::Success
    }

    /// Replaces the current identity with a fresh anonymous one.
    pub fn sign_in_anonymously(&self) -> Identity {
        let identity = Identity::anonymous();
        info!(
            "event=sign_in_anonymous module=session status=ok user_id={}",
            identity.id
        );
        self.current.send_replace(Some(identity.clone()));
        identity
    }

    /// Upgrades an anonymous identity to a permanent one in place.
    ///
    /// `_password` is accepted for API parity; validation is a caller concern.
    ///
    /// # Contract
    /// - `fail` marker (any case): immediate already-linked failure.
    /// - Otherwise waits the link latency and returns `Success`; the identity
    ///   changes only if it is present and anonymous.
    pub async fn link_email_password(&self, email: &str, _password: &str) -> ActionStatus {
        if FAIL_MARKER_RE.is_match(email) {
            info!("event=link module=session status=rejected reason=already_linked");
            return ActionStatus::failure(EMAIL_ALREADY_LINKED_MESSAGE);
        }

        self.clock.delay(Latency::Link).await;
        let linked = self.current.send_if_modified(|current| {
            let Some(upgraded) = current.as_ref().and_then(|identity| identity.linked(email))
            else {
                return false;
            };
            *current = Some(upgraded);
            true
        });

        if linked {
            info!("event=link module=session status=ok");
        } else {
            debug!("event=link module=session status=noop reason=not_anonymous");
        }
        ActionStatus::Success
    }

    pub fn sign_out(&self) {
        let previous = self.current.send_replace(None);
        if previous.is_some() {
            info!("event=sign_out module=session status=ok");
        }
    }
}

impl Default for SessionRepository {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionRepository, EMAIL_ALREADY_LINKED_MESSAGE, NETWORK_ERROR_MESSAGE};
    use crate::model::identity::{ActionStatus, Identity};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn network_marker_is_case_insensitive() {
        let repo = SessionRepository::default();
        let status = repo.sign_in("NetWork@x.com").await;
        assert_eq!(status, ActionStatus::failure(NETWORK_ERROR_MESSAGE));
        assert!(repo.current_identity().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn link_failure_is_immediate_and_keeps_identity() {
        let repo = SessionRepository::default();
        let anon = repo.sign_in_anonymously();

        let start = Instant::now();
        let status = repo.link_email_password("FAIL@x.com", "secret1").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(status, ActionStatus::failure(EMAIL_ALREADY_LINKED_MESSAGE));
        assert_eq!(repo.current_identity(), Some(anon));
    }

    #[tokio::test(start_paused = true)]
    async fn link_publishes_one_atomic_change() {
        let repo = SessionRepository::default();
        let anon = repo.sign_in_anonymously();
        let mut rx = repo.identity();
        rx.borrow_and_update();

        repo.link_email_password("me@test.com", "secret1").await;

        assert!(rx.has_changed().expect("sender alive"));
        let seen = rx.borrow_and_update().clone();
        assert_eq!(
            seen,
            Some(Identity {
                id: anon.id,
                email: "me@test.com".to_string(),
                is_anonymous: false,
            })
        );
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[tokio::test(start_paused = true)]
    async fn noop_link_does_not_notify_observers() {
        let repo = SessionRepository::default();
        let mut rx = repo.identity();
        rx.borrow_and_update();

        let status = repo.link_email_password("me@test.com", "secret1").await;
        assert!(status.is_success());
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[test]
    fn sign_out_clears_identity() {
        let repo = SessionRepository::default();
        repo.sign_in_anonymously();
        repo.sign_out();
        assert!(repo.current_identity().is_none());
    }
}
