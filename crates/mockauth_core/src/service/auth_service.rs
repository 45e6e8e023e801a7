//! Authentication use-case service.
//!
//! # Responsibility
//! - Project the session store's identity into `SessionState`.
//! - Run session commands and forward failures to the error channel.
//!
//! # Invariants
//! - Observed state starts at `Loading` and leaves it exactly once, when the
//!   projector task first runs; `Loading` never recurs.
//! - Failures reach the error channel only; they never change session state.
//! - The projector task is aborted when the service is dropped.
//!
//! # Runtime
//! - `AuthService::new` spawns onto the current Tokio runtime and must be
//!   called from within one.

use crate::model::identity::{ActionStatus, Identity, SessionState};
use crate::repo::session_repo::SessionRepository;
use crate::service::error_signal::{error_channel, ErrorReceiver, ErrorSender};
use log::debug;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct AuthService {
    repo: Arc<SessionRepository>,
    state: watch::Receiver<SessionState>,
    errors: ErrorSender,
    error_rx: Mutex<Option<ErrorReceiver>>,
    projector: JoinHandle<()>,
}

impl AuthService {
    pub fn new(repo: Arc<SessionRepository>, error_buffer_capacity: usize) -> Self {
        let (state_tx, state) = watch::channel(SessionState::Loading);
        let projector = spawn_projector(repo.identity(), state_tx);
        let (errors, error_rx) = error_channel(error_buffer_capacity);
        Self {
            repo,
            state,
            errors,
            error_rx: Mutex::new(Some(error_rx)),
            projector,
        }
    }

    pub fn repository(&self) -> &Arc<SessionRepository> {
        &self.repo
    }

    pub fn session_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to session state; the receiver starts at the latest value.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the projector has published its first value.
    pub async fn ready(&self) -> SessionState {
        let mut state = self.state.clone();
        if let Ok(value) = state.wait_for(|value| !value.is_loading()).await {
            return value.clone();
        }
        let last = state.borrow().clone();
        last
    }

    /// Hands out the single error consumer. Later calls return `None`.
    pub fn take_error_receiver(&self) -> Option<ErrorReceiver> {
        match self.error_rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub async fn perform_sign_in(&self, email: &str) -> ActionStatus {
        let status = self.repo.sign_in(email).await;
        self.forward_failure(&status);
        status
    }

    pub fn perform_anonymous_sign_in(&self) -> Identity {
        self.repo.sign_in_anonymously()
    }

    pub async fn link_account(&self, email: &str, password: &str) -> ActionStatus {
        let status = self.repo.link_email_password(email, password).await;
        self.forward_failure(&status);
        status
    }

    pub fn perform_sign_out(&self) {
        self.repo.sign_out();
    }

    fn forward_failure(&self, status: &ActionStatus) {
        if let Some(message) = status.failure_message() {
            self.errors.send(message);
        }
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        self.projector.abort();
    }
}

fn spawn_projector(
    mut identity: watch::Receiver<Option<Identity>>,
    state: watch::Sender<SessionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let projected = SessionState::project(identity.borrow_and_update().clone());
            state.send_replace(projected);
            if identity.changed().await.is_err() {
                debug!("event=projector_stop module=auth status=ok reason=store_dropped");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::AuthService;
    use crate::model::identity::SessionState;
    use crate::repo::session_repo::SessionRepository;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn state_is_loading_until_projector_runs() {
        let service = AuthService::new(Arc::new(SessionRepository::default()), 8);
        assert_eq!(service.session_state(), SessionState::Loading);

        assert_eq!(service.ready().await, SessionState::Unauthenticated);
        assert_eq!(service.session_state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn error_receiver_is_handed_out_once() {
        let service = AuthService::new(Arc::new(SessionRepository::default()), 8);
        assert!(service.take_error_receiver().is_some());
        assert!(service.take_error_receiver().is_none());
    }
}
