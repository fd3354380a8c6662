use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientContext;
use crate::model::ActivityKind;
use crate::platform::records::{server_timestamp, RecordStore};
use crate::{util, AppError};

/// Fire-and-forget audit writer. A failed write must never fail the
/// operation that triggered it, so every record lands on a detached task.
#[derive(Clone)]
pub struct ActivityRecorder {
    records: Arc<dyn RecordStore>,
    collection: String,
    client: ClientContext,
}

impl ActivityRecorder {
    pub fn new(
        records: Arc<dyn RecordStore>,
        collection: impl Into<String>,
        client: ClientContext,
    ) -> Self {
        Self {
            records,
            collection: collection.into(),
            client,
        }
    }

    /// Queues one audit entry. The returned handle is for tests that need to
    /// observe the write; production callers drop it.
    pub fn record(&self, user_id: &str, kind: ActivityKind, data: Value) -> JoinHandle<()> {
        let records = Arc::clone(&self.records);
        let collection = self.collection.clone();
        let kind_label = kind.as_str();

        let mut fields = Map::new();
        fields.insert("user_id".into(), Value::String(user_id.to_string()));
        fields.insert("kind".into(), Value::String(kind_label.to_string()));
        fields.insert("data".into(), data);
        fields.insert("timestamp".into(), server_timestamp());
        fields.insert(
            "user_agent".into(),
            Value::String(self.client.user_agent_or_unknown().to_string()),
        );
        fields.insert(
            "ip".into(),
            Value::String(self.client.ip_or_unknown().to_string()),
        );

        util::spawn_logged("activity_record_failed", move || async move {
            let id = records
                .add(&collection, fields)
                .await
                .map_err(AppError::from)?;
            debug!(
                target: "hearthstore",
                event = "activity_recorded",
                kind = kind_label,
                id = id.as_str()
            );
            Ok(())
        })
    }
}
