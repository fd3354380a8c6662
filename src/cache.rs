use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::AppResult;

/// In-memory mirror of one remote collection.
///
/// There is no partial-update path: every mutation is followed by a full
/// `reload`, and the newest completed reload wins. Each reload takes a
/// monotonic ticket before fetching; results carrying a ticket older than
/// the newest installed one are discarded, so a slow early reload can
/// never clobber a later one.
pub struct EntityCache<T> {
    name: &'static str,
    inner: Arc<CacheInner<T>>,
}

struct CacheInner<T> {
    issued: AtomicU64,
    state: Mutex<CacheState<T>>,
}

struct CacheState<T> {
    items: Vec<T>,
    ticket: u64,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> EntityCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(CacheInner {
                issued: AtomicU64::new(0),
                state: Mutex::new(CacheState {
                    items: Vec::new(),
                    ticket: 0,
                }),
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.inner
            .state
            .lock()
            .map(|state| state.items.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.items.len())
            .unwrap_or(0)
    }

    /// Run `fetch` and install its result. A fetch error degrades the
    /// cache to empty with a warning; it never propagates to the caller.
    pub async fn reload<F, Fut>(&self, fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Vec<T>>>,
    {
        let ticket = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        match fetch().await {
            Ok(items) => {
                let count = items.len();
                if self.install(ticket, items) {
                    debug!(
                        target: "hearthstore",
                        event = "cache_reloaded",
                        cache = self.name,
                        count,
                        ticket
                    );
                }
            }
            Err(err) => {
                warn!(
                    target: "hearthstore",
                    event = "cache_reload_failed",
                    cache = self.name,
                    ticket,
                    error = %err
                );
                self.install(ticket, Vec::new());
            }
        }
    }

    /// Drop the contents without issuing a fetch; sign-out uses this.
    pub fn clear(&self) {
        let ticket = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.install(ticket, Vec::new());
    }

    fn install(&self, ticket: u64, items: Vec<T>) -> bool {
        let Ok(mut state) = self.inner.state.lock() else {
            return false;
        };
        if ticket <= state.ticket {
            debug!(
                target: "hearthstore",
                event = "cache_reload_stale_discarded",
                cache = self.name,
                ticket,
                installed = state.ticket
            );
            return false;
        }
        state.items = items;
        state.ticket = ticket;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;
    use tokio::task::yield_now;

    #[tokio::test]
    async fn reload_replaces_wholesale() {
        let cache = EntityCache::<i32>::new("test");
        cache.reload(|| async { Ok(vec![1, 2, 3]) }).await;
        assert_eq!(cache.snapshot(), vec![1, 2, 3]);
        cache.reload(|| async { Ok(vec![9]) }).await;
        assert_eq!(cache.snapshot(), vec![9]);
        assert_eq!(cache.count(), 1);
    }

    #[tokio::test]
    async fn failed_reload_degrades_to_empty() {
        let cache = EntityCache::<i32>::new("test");
        cache.reload(|| async { Ok(vec![1, 2, 3]) }).await;
        cache
            .reload(|| async { Err(crate::AppError::new("REMOTE/UNAVAILABLE", "down")) })
            .await;
        assert_eq!(cache.count(), 0);
    }

    #[tokio::test]
    async fn stale_reload_is_discarded() {
        let cache = EntityCache::<i32>::new("test");
        let (release, gate) = oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .reload(|| async move {
                        let _ = gate.await;
                        Ok(vec![1])
                    })
                    .await;
            })
        };
        // Let the slow reload take its ticket and park on the gate.
        for _ in 0..4 {
            yield_now().await;
        }

        cache.reload(|| async { Ok(vec![2, 3]) }).await;
        assert_eq!(cache.snapshot(), vec![2, 3]);

        let _ = release.send(());
        slow.await.expect("slow reload task");
        assert_eq!(cache.snapshot(), vec![2, 3]);
    }

    #[tokio::test]
    async fn stale_failure_does_not_clobber_newer_success() {
        let cache = EntityCache::<i32>::new("test");
        let (release, gate) = oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .reload(|| async move {
                        let _ = gate.await;
                        Err(crate::AppError::new("REMOTE/UNAVAILABLE", "down"))
                    })
                    .await;
            })
        };
        for _ in 0..4 {
            yield_now().await;
        }

        cache.reload(|| async { Ok(vec![7]) }).await;
        let _ = release.send(());
        slow.await.expect("slow reload task");
        assert_eq!(cache.snapshot(), vec![7]);
    }

    #[tokio::test]
    async fn clear_empties_and_outranks_inflight_reload() {
        let cache = EntityCache::<i32>::new("test");
        let (release, gate) = oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .reload(|| async move {
                        let _ = gate.await;
                        Ok(vec![5])
                    })
                    .await;
            })
        };
        for _ in 0..4 {
            yield_now().await;
        }

        cache.clear();
        let _ = release.send(());
        slow.await.expect("slow reload task");
        assert_eq!(cache.count(), 0);
    }
}
