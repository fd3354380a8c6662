use std::sync::{Arc, Mutex};

use crate::local_store::StoreHandle;
use crate::model::{Identity, SESSION_REQUIRED};
use crate::{AppError, AppResult};

/// Snapshot of who is signed in and which household they resolved to.
/// Cheap to clone; all components read through this instead of globals.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    household_id: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner
            .lock()
            .map(|state| state.identity.clone())
            .unwrap_or_default()
    }

    pub fn uid(&self) -> Option<String> {
        self.inner
            .lock()
            .map(|state| state.identity.as_ref().map(|identity| identity.uid.clone()))
            .unwrap_or_default()
    }

    pub fn household_id(&self) -> Option<String> {
        self.inner
            .lock()
            .map(|state| state.household_id.clone())
            .unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .lock()
            .map(|state| state.identity.is_some())
            .unwrap_or(false)
    }

    pub fn set_identity(&self, identity: Identity) {
        if let Ok(mut state) = self.inner.lock() {
            state.identity = Some(identity);
        }
    }

    /// Household resolution happens after sign-in; until then operations
    /// that need a household fail with `SESSION/REQUIRED`.
    pub fn set_household(&self, household_id: String) {
        if let Ok(mut state) = self.inner.lock() {
            state.household_id = Some(household_id);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.identity = None;
            state.household_id = None;
        }
    }

    pub fn require_identity(&self) -> AppResult<Identity> {
        self.identity()
            .ok_or_else(|| AppError::new(SESSION_REQUIRED, "Please sign in first."))
    }

    pub fn require_household(&self) -> AppResult<String> {
        self.household_id().ok_or_else(|| {
            AppError::new(SESSION_REQUIRED, "Please sign in first.")
                .with_context("missing", "household_id")
        })
    }
}

/// Outcome of one periodic inactivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    Fresh,
    Expired,
}

/// Compare the persisted last-activity timestamp against the timeout.
/// A fresh (or absent) timestamp is refreshed to `now`; an expired one is
/// left alone so the caller can sign out and log the stale value.
pub fn check_session_activity(store: &StoreHandle, timeout_ms: i64, now: i64) -> SessionCheck {
    match store.read_last_activity() {
        Some(last) if now - last > timeout_ms => SessionCheck::Expired,
        _ => {
            store.write_last_activity(now);
            SessionCheck::Fresh
        }
    }
}
