use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const REMOTE_PERMISSION_DENIED: &str = "REMOTE/PERMISSION_DENIED";
pub const REMOTE_UNAVAILABLE: &str = "REMOTE/UNAVAILABLE";
pub const REMOTE_UNAUTHENTICATED: &str = "REMOTE/UNAUTHENTICATED";
pub const REMOTE_NOT_FOUND: &str = "REMOTE/NOT_FOUND";
pub const REMOTE_FAILED: &str = "REMOTE/FAILED";

/// Failure surface of the hosted document store, reduced to the codes the
/// client reacts to. Anything else arrives as `Failed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("service unavailable")]
    Unavailable,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("record not found")]
    NotFound,
    #[error("remote request failed: {0}")]
    Failed(String),
}

/// Sentinel understood by every record store implementation: a top-level
/// field written with this value is replaced by the store's own clock.
pub fn server_timestamp() -> Value {
    json!({ "__server_timestamp": true })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get("__server_timestamp"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// A stored document: its store-assigned id plus the field map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Decode into a typed record. The id is injected as an `id` field so
    /// record types carry it like any other attribute.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        let mut fields = self.fields;
        fields.insert("id".into(), Value::String(self.id));
        serde_json::from_value(Value::Object(fields))
    }
}

/// Narrow query surface: at most one equality filter and one descending
/// sort field. That is all the client ever asks of the backend.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Option<(String, Value)>,
    pub order_desc: Option<String>,
}

impl ListQuery {
    pub fn filter_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            filter: Some((field.into(), value.into())),
            order_desc: None,
        }
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order_desc = Some(field.into());
        self
    }
}

/// Boundary to the hosted document database. Collections hold JSON field
/// maps keyed by opaque string ids; queries are the narrow `ListQuery`
/// shape. Implementations substitute [`server_timestamp`] sentinels with
/// their own clock on every write path.
pub trait RecordStore: Send + Sync {
    fn list<'a>(
        &'a self,
        collection: &'a str,
        query: ListQuery,
    ) -> BoxFuture<'a, Result<Vec<RawRecord>, RemoteError>>;

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RawRecord>, RemoteError>>;

    /// Insert with a store-assigned id; returns the new id.
    fn add<'a>(
        &'a self,
        collection: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<String, RemoteError>>;

    /// Create or replace the record at a caller-chosen id.
    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;

    /// Merge fields into an existing record; `NotFound` when absent.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;
}
