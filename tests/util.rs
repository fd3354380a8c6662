#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use hearthstore::config::AppConfig;
use hearthstore::local_store::StoreHandle;
use hearthstore::model::Identity;
use hearthstore::platform::memory::{MemoryAuth, MemoryBlobs, MemoryRecords};
use hearthstore::platform::Platform;
use hearthstore::AppState;

/// Memory-backed platform plus the shared app state, with the boundary
/// fakes kept reachable so tests can seed data and inject failures.
pub struct Backend {
    pub auth: Arc<MemoryAuth>,
    pub records: Arc<MemoryRecords>,
    pub blobs: Arc<MemoryBlobs>,
    pub state: AppState,
}

pub fn backend() -> Backend {
    let auth = Arc::new(MemoryAuth::new());
    let records = Arc::new(MemoryRecords::new());
    let blobs = Arc::new(MemoryBlobs::new());
    let state = AppState::new(
        AppConfig::default(),
        Platform::new(auth.clone(), records.clone(), blobs.clone()),
        StoreHandle::in_memory(),
    );
    Backend {
        auth,
        records,
        blobs,
        state,
    }
}

/// Backend with `uid` already signed in and resolved to household `f1`,
/// skipping the lifecycle machinery the CRUD tests are not exercising.
pub fn signed_in_backend(uid: &str) -> Backend {
    let b = backend();
    b.state.session.set_identity(identity(uid));
    b.state.session.set_household("f1".into());
    b
}

pub fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: None,
        photo_url: None,
    }
}

/// Let detached audit-log tasks finish; they run on ready-on-poll fakes.
pub async fn drain_tasks() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
