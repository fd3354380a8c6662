use std::sync::Arc;

use crate::activity::ActivityRecorder;
use crate::cache::EntityCache;
use crate::config::AppConfig;
use crate::local_store::StoreHandle;
use crate::model::{DocumentRecord, MemberRecord};
use crate::platform::Platform;
use crate::session::SessionStore;

/// Shared handle for everything the controllers touch. Clones are cheap and
/// all observe the same session, caches, and local store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub platform: Platform,
    pub session: SessionStore,
    pub local: StoreHandle,
    pub members: EntityCache<MemberRecord>,
    pub documents: EntityCache<DocumentRecord>,
}

impl AppState {
    pub fn new(config: AppConfig, platform: Platform, local: StoreHandle) -> Self {
        Self {
            config: Arc::new(config),
            platform,
            session: SessionStore::default(),
            local,
            members: EntityCache::new("members"),
            documents: EntityCache::new("documents"),
        }
    }

    /// Fully in-process state for tests and demos.
    pub fn in_memory() -> Self {
        Self::new(
            AppConfig::default(),
            Platform::in_memory(),
            StoreHandle::in_memory(),
        )
    }

    pub fn activity(&self) -> ActivityRecorder {
        ActivityRecorder::new(
            self.platform.records.clone(),
            self.config.collections.activities.clone(),
            self.config.client.clone(),
        )
    }
}
