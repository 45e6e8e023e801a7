//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose session and item use-cases to Dart via FRB.
//! - Own the process-wide backend and the Tokio runtime it runs on.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Backend configuration is fixed once the backend has started.
//! - At most one item-feed consumer is attached through this layer.
//!
//! # See also
//! - `mockauth_core::backend`

use log::{error, warn};
use mockauth_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ActionStatus, CoreConfig, ErrorReceiver, Item, ItemFeedSubscription, ItemWrite, MockBackend,
    SessionState,
};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

const RUNTIME_WORKER_THREADS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;
const LINK_INPUT_MESSAGE: &str = "Enter an email and a password of at least 6 characters.";
const REGISTER_FALLBACK_EMAIL: &str = "register@mock.com";

static PENDING_CONFIG: OnceCell<CoreConfig> = OnceCell::new();
static APP: OnceCell<AppCore> = OnceCell::new();

struct AppCore {
    runtime: Runtime,
    backend: MockBackend,
    errors: tokio::sync::Mutex<Option<ErrorReceiver>>,
    attached: Mutex<Option<ItemFeedSubscription>>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Sets backend tunables from a JSON object (missing fields keep defaults).
///
/// # FFI contract
/// - Must run before the first call that touches the backend.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_backend(config_json: String) -> String {
    if APP.get().is_some() {
        warn!("event=ffi_configure module=ffi status=rejected reason=backend_started");
        return "backend already started; configuration is fixed".to_string();
    }
    let config = match CoreConfig::from_json(config_json.as_str()) {
        Ok(config) => config,
        Err(err) => return err.to_string(),
    };
    match PENDING_CONFIG.set(config) {
        Ok(()) => String::new(),
        Err(_) => "backend already configured".to_string(),
    }
}

/// Session state snapshot for UI routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateView {
    /// `loading|unauthenticated|authenticated`.
    pub state: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

/// Generic action response envelope for session/item commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthActionResponse {
    pub ok: bool,
    /// Failure message suitable for a snackbar; empty on success.
    pub message: String,
}

impl AuthActionResponse {
    fn success() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl From<ActionStatus> for AuthActionResponse {
    fn from(value: ActionStatus) -> Self {
        match value {
            ActionStatus::Success => Self::success(),
            ActionStatus::Failure(message) => Self::failure(message),
        }
    }
}

/// Item row for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub id: i64,
    pub name: String,
}

/// Signs in with an email; failures are also queued for `next_error_message`.
pub async fn auth_sign_in(email: String) -> AuthActionResponse {
    on_backend(|backend| async move { backend.auth().perform_sign_in(email.as_str()).await })
        .await
        .map(AuthActionResponse::from)
        .unwrap_or_else(AuthActionResponse::failure)
}

/// Register-and-sign-in: a blank email signs in as `register@mock.com`.
pub async fn auth_register(email: String) -> AuthActionResponse {
    auth_sign_in(register_email(email)).await
}

#[flutter_rust_bridge::frb(sync)]
pub fn auth_sign_in_anonymously() -> AuthActionResponse {
    match app() {
        Ok(app) => {
            app.backend.auth().perform_anonymous_sign_in();
            AuthActionResponse::success()
        }
        Err(err) => AuthActionResponse::failure(err),
    }
}

/// Upgrades the anonymous session to an email account.
///
/// # FFI contract
/// - Rejects blank email or a password shorter than 6 characters before
///   reaching the backend; this rejection is not queued as an error signal.
pub async fn auth_link_account(email: String, password: String) -> AuthActionResponse {
    if let Err(message) = validate_link_input(email.as_str(), password.as_str()) {
        return AuthActionResponse::failure(message);
    }
    on_backend(|backend| async move {
        backend
            .auth()
            .link_account(email.as_str(), password.as_str())
            .await
    })
    .await
    .map(AuthActionResponse::from)
    .unwrap_or_else(AuthActionResponse::failure)
}

#[flutter_rust_bridge::frb(sync)]
pub fn auth_sign_out() -> AuthActionResponse {
    match app() {
        Ok(app) => {
            app.backend.auth().perform_sign_out();
            AuthActionResponse::success()
        }
        Err(err) => AuthActionResponse::failure(err),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn auth_state() -> SessionStateView {
    match app() {
        Ok(app) => to_state_view(&app.backend.auth().session_state()),
        Err(err) => {
            error!(
                "event=ffi_auth_state module=ffi status=error reason=backend_unavailable detail={err}"
            );
            to_state_view(&SessionState::Loading)
        }
    }
}

/// Waits for the next transient error message.
///
/// Returns `None` when the backend is unavailable. Dropping the returned
/// future before it resolves leaves the pending message queued.
pub async fn next_error_message() -> Option<String> {
    let app = app().ok()?;
    let mut task = AbortOnDrop(app.runtime.spawn(async move {
        let mut slot = app.errors.lock().await;
        match slot.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }));
    (&mut task.0).await.ok().flatten()
}

/// Aborts the wrapped backend task when the awaiting caller goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Attaches the UI as item-feed consumer. Returns `false` if already attached.
#[flutter_rust_bridge::frb(sync)]
pub fn items_attach() -> bool {
    let Ok(app) = app() else {
        return false;
    };
    let mut attached = lock_attached(app);
    if attached.is_some() {
        return false;
    }
    *attached = Some(app.backend.feed().subscribe());
    true
}

/// Detaches the UI consumer; the feed stays warm for its grace period.
#[flutter_rust_bridge::frb(sync)]
pub fn items_detach() -> bool {
    let Ok(app) = app() else {
        return false;
    };
    let detached = lock_attached(app).take();
    detached.is_some()
}

#[flutter_rust_bridge::frb(sync)]
pub fn items_snapshot() -> Vec<ItemView> {
    match app() {
        Ok(app) => app
            .backend
            .feed()
            .current_items()
            .into_iter()
            .map(to_item_view)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Applies the edit action (`"<name> (EDITED)"`) to one item.
pub async fn items_update(item_id: i64, name: String) -> AuthActionResponse {
    on_backend(|backend| async move { backend.feed().update_item(&Item::new(item_id, name)).await })
        .await
        .map(to_item_response)
        .unwrap_or_else(AuthActionResponse::failure)
}

pub async fn items_delete(item_id: i64) -> AuthActionResponse {
    on_backend(|backend| async move { backend.feed().delete_item(item_id).await })
        .await
        .map(to_item_response)
        .unwrap_or_else(AuthActionResponse::failure)
}

fn app() -> Result<&'static AppCore, String> {
    APP.get_or_try_init(|| {
        let config = PENDING_CONFIG.get().cloned().unwrap_or_default();
        let runtime = Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKER_THREADS)
            .thread_name("mockauth-core")
            .enable_time()
            .build()
            .map_err(|err| format!("backend runtime start failed: {err}"))?;
        let backend = {
            let _entered = runtime.enter();
            MockBackend::new(config)
        };
        let errors = backend.auth().take_error_receiver();
        Ok(AppCore {
            runtime,
            backend,
            errors: tokio::sync::Mutex::new(errors),
            attached: Mutex::new(None),
        })
    })
}

/// Runs a backend future on the backend runtime and awaits it from any executor.
async fn on_backend<T, F, Fut>(f: F) -> Result<T, String>
where
    F: FnOnce(&'static MockBackend) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let app = app()?;
    app.runtime
        .spawn(f(&app.backend))
        .await
        .map_err(|err| format!("backend task failed: {err}"))
}

fn lock_attached(app: &AppCore) -> std::sync::MutexGuard<'_, Option<ItemFeedSubscription>> {
    app.attached
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn register_email(email: String) -> String {
    if email.trim().is_empty() {
        REGISTER_FALLBACK_EMAIL.to_string()
    } else {
        email
    }
}

fn validate_link_input(email: &str, password: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() || password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(LINK_INPUT_MESSAGE);
    }
    Ok(())
}

fn to_state_view(state: &SessionState) -> SessionStateView {
    let label = match state {
        SessionState::Loading => "loading",
        SessionState::Unauthenticated => "unauthenticated",
        SessionState::Authenticated { .. } => "authenticated",
    };
    let identity = state.identity();
    SessionStateView {
        state: label.to_string(),
        user_id: identity.map(|identity| identity.id.clone()),
        email: identity.map(|identity| identity.email.clone()),
        is_anonymous: identity.is_some_and(|identity| identity.is_anonymous),
    }
}

fn to_item_view(item: Item) -> ItemView {
    ItemView {
        id: item.id,
        name: item.name,
    }
}

fn to_item_response(write: ItemWrite) -> AuthActionResponse {
    match write {
        ItemWrite::Applied => AuthActionResponse::success(),
        // Logged by the core; not a user-facing failure.
        ItemWrite::NoActiveSession => AuthActionResponse::success(),
    }
}
