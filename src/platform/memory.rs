use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::id::new_uuid_v7;
use crate::model::Identity;
use crate::time::now_ms;

use super::auth::{AuthError, AuthProvider};
use super::blobs::{BlobError, BlobStore, ProgressFn, StoredBlob};
use super::records::{is_server_timestamp, ListQuery, RawRecord, RecordStore, RemoteError};

/// Scriptable auth provider for tests and backend-free embedding.
///
/// `emit` pushes a raw notification through the change stream without
/// deduplication, which is exactly what hosted providers do on listener
/// re-registration.
pub struct MemoryAuth {
    changes: watch::Sender<Option<Identity>>,
    next_sign_in: Mutex<VecDeque<Result<Identity, AuthError>>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            changes,
            next_sign_in: Mutex::new(VecDeque::new()),
        }
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that will answer the next `sign_in` with this identity.
    pub fn with_user(identity: Identity) -> Self {
        let auth = Self::new();
        auth.queue_sign_in(Ok(identity));
        auth
    }

    pub fn queue_sign_in(&self, result: Result<Identity, AuthError>) {
        if let Ok(mut queue) = self.next_sign_in.lock() {
            queue.push_back(result);
        }
    }

    /// Push a raw auth-state notification, duplicates included.
    pub fn emit(&self, state: Option<Identity>) {
        self.changes.send_replace(state);
    }

    pub fn current(&self) -> Option<Identity> {
        self.changes.borrow().clone()
    }
}

impl AuthProvider for MemoryAuth {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }

    fn sign_in(&self) -> BoxFuture<'_, Result<Identity, AuthError>> {
        async move {
            let scripted = self
                .next_sign_in
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front());
            match scripted {
                Some(Ok(identity)) => {
                    self.changes.send_replace(Some(identity.clone()));
                    Ok(identity)
                }
                Some(Err(err)) => Err(err),
                None => Err(AuthError::Failed("no scripted sign-in result".into())),
            }
        }
        .boxed()
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        async move {
            self.changes.send_replace(None);
            Ok(())
        }
        .boxed()
    }
}

type Collections = HashMap<String, BTreeMap<String, Map<String, Value>>>;
type FailureKey = (String, String);

/// In-memory document store with per-operation failure injection.
#[derive(Default)]
pub struct MemoryRecords {
    collections: Mutex<Collections>,
    failures: Mutex<HashMap<FailureKey, VecDeque<RemoteError>>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` ("list", "get", "add", "set", "update", "delete")
    /// on `collection` fail with `error`. Queued failures drain in order.
    pub fn fail_next(&self, op: &str, collection: &str, error: RemoteError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures
                .entry((op.to_string(), collection.to_string()))
                .or_default()
                .push_back(error);
        }
    }

    fn take_failure(&self, op: &str, collection: &str) -> Option<RemoteError> {
        let mut failures = self.failures.lock().ok()?;
        failures
            .get_mut(&(op.to_string(), collection.to_string()))
            .and_then(VecDeque::pop_front)
    }

    /// Insert a record under a fixed id, bypassing failure injection.
    pub fn seed(&self, collection: &str, id: &str, mut fields: Map<String, Value>) {
        substitute_timestamps(&mut fields);
        if let Ok(mut collections) = self.collections.lock() {
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|collections| {
                collections
                    .get(collection)
                    .map(BTreeMap::len)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn substitute_timestamps(fields: &mut Map<String, Value>) {
    let now = now_ms();
    for value in fields.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::from(now);
        }
    }
}

// Ordering compares integer fields; `created_at` epoch-ms ordering is the
// only sort the client asks for.
fn order_key(fields: &Map<String, Value>, field: &str) -> i64 {
    fields.get(field).and_then(Value::as_i64).unwrap_or(i64::MIN)
}

impl RecordStore for MemoryRecords {
    fn list<'a>(
        &'a self,
        collection: &'a str,
        query: ListQuery,
    ) -> BoxFuture<'a, Result<Vec<RawRecord>, RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("list", collection) {
                return Err(err);
            }
            let collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            let mut rows: Vec<RawRecord> = collections
                .get(collection)
                .into_iter()
                .flatten()
                .filter(|(_, fields)| match &query.filter {
                    Some((field, expected)) => fields.get(field) == Some(expected),
                    None => true,
                })
                .map(|(id, fields)| RawRecord {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect();
            if let Some(order_field) = &query.order_desc {
                rows.sort_by(|a, b| {
                    order_key(&b.fields, order_field)
                        .cmp(&order_key(&a.fields, order_field))
                        .then_with(|| b.id.cmp(&a.id))
                });
            }
            Ok(rows)
        }
        .boxed()
    }

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RawRecord>, RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("get", collection) {
                return Err(err);
            }
            let collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            Ok(collections
                .get(collection)
                .and_then(|records| records.get(id))
                .map(|fields| RawRecord {
                    id: id.to_string(),
                    fields: fields.clone(),
                }))
        }
        .boxed()
    }

    fn add<'a>(
        &'a self,
        collection: &'a str,
        mut fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<String, RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("add", collection) {
                return Err(err);
            }
            substitute_timestamps(&mut fields);
            let id = new_uuid_v7();
            let mut collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), fields);
            Ok(id)
        }
        .boxed()
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        mut fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("set", collection) {
                return Err(err);
            }
            substitute_timestamps(&mut fields);
            let mut collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
            Ok(())
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        mut fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("update", collection) {
                return Err(err);
            }
            substitute_timestamps(&mut fields);
            let mut collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            let existing = collections
                .get_mut(collection)
                .and_then(|records| records.get_mut(id))
                .ok_or(RemoteError::NotFound)?;
            for (key, value) in fields {
                existing.insert(key, value);
            }
            Ok(())
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            if let Some(err) = self.take_failure("delete", collection) {
                return Err(err);
            }
            let mut collections = self
                .collections
                .lock()
                .map_err(|_| RemoteError::Failed("memory store poisoned".into()))?;
            if let Some(records) = collections.get_mut(collection) {
                records.remove(id);
            }
            Ok(())
        }
        .boxed()
    }
}

const PROGRESS_STEPS: [u8; 5] = [0, 25, 50, 75, 100];

/// In-memory blob store with failure injection and deterministic progress.
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_put: Mutex<VecDeque<BlobError>>,
    fail_delete: Mutex<VecDeque<BlobError>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_put(&self, error: BlobError) {
        if let Ok(mut queue) = self.fail_put.lock() {
            queue.push_back(error);
        }
    }

    pub fn fail_next_delete(&self, error: BlobError) {
        if let Ok(mut queue) = self.fail_delete.lock() {
            queue.push_back(error);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobs {
    fn put<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, Result<StoredBlob, BlobError>> {
        async move {
            let injected = self
                .fail_put
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front());
            if let Some(err) = injected {
                return Err(err);
            }
            if let Some(progress) = &progress {
                for step in PROGRESS_STEPS {
                    progress(step);
                }
            }
            let mut blobs = self
                .blobs
                .lock()
                .map_err(|_| BlobError::Failed("memory blobs poisoned".into()))?;
            blobs.insert(path.to_string(), bytes);
            Ok(StoredBlob {
                url: format!("memory://{path}"),
            })
        }
        .boxed()
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), BlobError>> {
        async move {
            let injected = self
                .fail_delete
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front());
            if let Some(err) = injected {
                return Err(err);
            }
            let mut blobs = self
                .blobs
                .lock()
                .map_err(|_| BlobError::Failed("memory blobs poisoned".into()))?;
            blobs.remove(path).map(|_| ()).ok_or(BlobError::NotFound {
                path: path.to_string(),
            })
        }
        .boxed()
    }
}
