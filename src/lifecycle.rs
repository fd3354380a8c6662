use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use ts_rs::TS;

use crate::documents::DocumentsController;
use crate::household;
use crate::members::MembersController;
use crate::model::{ActivityKind, DashboardStats, Identity};
use crate::session::{check_session_activity, SessionCheck};
use crate::state::AppState;
use crate::{time, util};

/// The three pages the shell can be on. Redirect decisions depend on which
/// one is current when an auth change lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/", rename_all = "snake_case")]
pub enum Page {
    Index,
    Login,
    Dashboard,
}

impl Page {
    pub const fn as_str(self) -> &'static str {
        match self {
            Page::Index => "index",
            Page::Login => "login",
            Page::Dashboard => "dashboard",
        }
    }
}

/// The shell owns actual navigation; the lifecycle only announces where to
/// go. One lifecycle instance corresponds to one page load, so a real
/// navigation tears it down and the replacement re-observes auth state.
pub trait Navigator: Send + Sync {
    fn current(&self) -> Page;
    fn navigate(&self, page: Page);
}

/// In-process navigator for tests and demos: tracks the current page and
/// every redirect issued.
pub struct MemoryNavigator {
    inner: Mutex<NavigatorState>,
}

struct NavigatorState {
    current: Page,
    history: Vec<Page>,
}

impl MemoryNavigator {
    pub fn new(current: Page) -> Self {
        Self {
            inner: Mutex::new(NavigatorState {
                current,
                history: Vec::new(),
            }),
        }
    }

    pub fn set_current(&self, page: Page) {
        self.lock().current = page;
    }

    pub fn history(&self) -> Vec<Page> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NavigatorState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Page {
        self.lock().current
    }

    fn navigate(&self, page: Page) {
        let mut state = self.lock();
        state.current = page;
        state.history.push(page);
    }
}

/// What an observation did. `Suppressed` means the notification repeated
/// the state already handled and nothing ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTransition {
    SignedIn,
    SignedOut,
    Suppressed,
}

struct LifecycleInner {
    state: AppState,
    navigator: Arc<dyn Navigator>,
    members: MembersController,
    documents: DocumentsController,
    // Last observed uid; outer None means nothing observed yet.
    observed_uid: Mutex<Option<Option<String>>>,
    init_task: Mutex<Option<JoinHandle<()>>>,
}

/// Drives page behavior from the auth provider's change stream: session
/// population, exactly-once redirects, household initialization, cache
/// loads, and the periodic inactivity check.
#[derive(Clone)]
pub struct AuthLifecycle {
    inner: Arc<LifecycleInner>,
}

impl AuthLifecycle {
    pub fn new(state: AppState, navigator: Arc<dyn Navigator>) -> Self {
        let members = MembersController::new(state.clone());
        let documents = DocumentsController::new(state.clone());
        Self {
            inner: Arc::new(LifecycleInner {
                state,
                navigator,
                members,
                documents,
                observed_uid: Mutex::new(None),
                init_task: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.inner.state
    }

    pub fn members(&self) -> &MembersController {
        &self.inner.members
    }

    pub fn documents(&self) -> &DocumentsController {
        &self.inner.documents
    }

    /// Feeds one auth notification through the state machine. Repeats of
    /// the already-handled uid (or repeated null) do nothing.
    pub async fn observe(&self, update: Option<Identity>) -> AuthTransition {
        let uid = update.as_ref().map(|identity| identity.uid.clone());
        {
            let mut observed = self
                .inner
                .observed_uid
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if observed.as_ref() == Some(&uid) {
                return AuthTransition::Suppressed;
            }
            *observed = Some(uid);
        }

        match update {
            Some(identity) => {
                self.handle_sign_in(identity);
                AuthTransition::SignedIn
            }
            None => {
                self.handle_sign_out();
                AuthTransition::SignedOut
            }
        }
    }

    /// Consumes the provider stream until it closes, observing the current
    /// value first so startup state is handled like any other change.
    pub async fn run(&self, mut rx: watch::Receiver<Option<Identity>>) {
        loop {
            let update = rx.borrow_and_update().clone();
            self.observe(update).await;
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn handle_sign_in(&self, identity: Identity) {
        self.inner.state.session.set_identity(identity.clone());
        self.inner.state.local.write_last_activity(time::now_ms());
        info!(
            target: "hearthstore",
            area = "session",
            event = "auth_signed_in",
            uid = identity.uid.as_str()
        );

        match self.inner.navigator.current() {
            Page::Login => self.redirect(Page::Login, Page::Dashboard),
            Page::Dashboard => self.spawn_init(identity),
            Page::Index => {}
        }
    }

    fn handle_sign_out(&self) {
        self.inner.state.session.clear();
        self.inner.state.members.clear();
        self.inner.state.documents.clear();
        self.inner.state.local.clear();
        info!(
            target: "hearthstore",
            area = "session",
            event = "auth_signed_out"
        );

        if self.inner.navigator.current() == Page::Dashboard {
            self.redirect(Page::Dashboard, Page::Login);
        }
    }

    fn redirect(&self, from: Page, to: Page) {
        info!(
            target: "hearthstore",
            area = "session",
            event = "redirect",
            from = from.as_str(),
            to = to.as_str()
        );
        self.inner.navigator.navigate(to);
    }

    /// Household init plus the first data load, detached so the observation
    /// returns immediately. A newer sign-in replaces a still-running task.
    fn spawn_init(&self, identity: Identity) {
        let lifecycle = self.clone();
        let handle = util::spawn_logged("session_init_failed", move || async move {
            let household_id =
                household::initialize_user(&lifecycle.inner.state, &identity).await?;
            lifecycle.inner.state.session.set_household(household_id);
            lifecycle
                .inner
                .state
                .activity()
                .record(&identity.uid, ActivityKind::Login, json!({}));
            lifecycle.refresh().await;
            Ok(())
        });
        *self
            .inner
            .init_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Awaits a pending init task, if any. The shell can use this to gate
    /// first paint; tests use it for determinism.
    pub async fn wait_for_init(&self) {
        let handle = self
            .inner
            .init_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Reloads both caches. Safe to call at any time; concurrent refreshes
    /// resolve through the cache ticket order.
    pub async fn refresh(&self) {
        futures::future::join(self.inner.members.reload(), self.inner.documents.reload()).await;
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            members: self.inner.state.members.count() as u64,
            documents: self.inner.state.documents.count() as u64,
        }
    }

    /// Periodic inactivity check. Within the timeout the activity stamp is
    /// refreshed; past it the provider is asked to sign out, and the
    /// resulting stream change does the actual teardown.
    pub fn spawn_session_checker(&self) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(lifecycle.inner.state.config.session_check_interval());
            loop {
                ticker.tick().await;
                lifecycle.check_session_once().await;
            }
        })
    }

    async fn check_session_once(&self) {
        if !self.inner.state.session.is_authenticated() {
            return;
        }
        let timeout_ms = self.inner.state.config.session_timeout_ms;
        match check_session_activity(&self.inner.state.local, timeout_ms, time::now_ms()) {
            SessionCheck::Fresh => {}
            SessionCheck::Expired => {
                info!(
                    target: "hearthstore",
                    area = "session",
                    event = "session_expired"
                );
                if let Err(err) = self.inner.state.platform.auth.sign_out().await {
                    warn!(
                        target: "hearthstore",
                        area = "session",
                        event = "session_signout_failed",
                        error = %err
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(uid: &str) -> Identity {
        Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            display_name: None,
            photo_url: None,
        }
    }

    fn lifecycle_on(page: Page) -> (AuthLifecycle, Arc<MemoryNavigator>) {
        let navigator = Arc::new(MemoryNavigator::new(page));
        let lifecycle = AuthLifecycle::new(AppState::in_memory(), navigator.clone());
        (lifecycle, navigator)
    }

    #[tokio::test]
    async fn login_page_redirects_to_dashboard_exactly_once() {
        let (lifecycle, navigator) = lifecycle_on(Page::Login);

        assert_eq!(
            lifecycle.observe(Some(identity("u1"))).await,
            AuthTransition::SignedIn
        );
        assert_eq!(navigator.history(), vec![Page::Dashboard]);

        assert_eq!(
            lifecycle.observe(Some(identity("u1"))).await,
            AuthTransition::Suppressed
        );
        assert_eq!(navigator.history(), vec![Page::Dashboard]);
    }

    #[tokio::test]
    async fn index_page_never_redirects() {
        let (lifecycle, navigator) = lifecycle_on(Page::Index);

        lifecycle.observe(Some(identity("u1"))).await;
        lifecycle.observe(None).await;
        assert!(navigator.history().is_empty());
    }

    #[tokio::test]
    async fn repeated_initial_null_is_suppressed() {
        let (lifecycle, _navigator) = lifecycle_on(Page::Index);

        assert_eq!(lifecycle.observe(None).await, AuthTransition::SignedOut);
        assert_eq!(lifecycle.observe(None).await, AuthTransition::Suppressed);
    }

    #[tokio::test]
    async fn sign_out_wipes_session_and_local_state() {
        let (lifecycle, navigator) = lifecycle_on(Page::Dashboard);
        lifecycle.observe(Some(identity("u1"))).await;
        lifecycle.wait_for_init().await;
        assert!(lifecycle.state().session.is_authenticated());
        assert!(lifecycle.state().local.read_last_activity().is_some());

        assert_eq!(lifecycle.observe(None).await, AuthTransition::SignedOut);
        assert!(!lifecycle.state().session.is_authenticated());
        assert!(lifecycle.state().local.read_last_activity().is_none());
        assert_eq!(lifecycle.stats(), DashboardStats::default());
        assert_eq!(navigator.history().last(), Some(&Page::Login));
    }

    #[tokio::test]
    async fn distinct_uid_is_a_fresh_transition() {
        let (lifecycle, navigator) = lifecycle_on(Page::Login);

        lifecycle.observe(Some(identity("u1"))).await;
        navigator.set_current(Page::Login);
        assert_eq!(
            lifecycle.observe(Some(identity("u2"))).await,
            AuthTransition::SignedIn
        );
        assert_eq!(navigator.history(), vec![Page::Dashboard, Page::Dashboard]);
    }
}
