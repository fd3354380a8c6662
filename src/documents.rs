use serde_json::{json, Map, Value};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::config::FileKind;
use crate::id::new_storage_stem;
use crate::model::{
    ActivityKind, DocumentRecord, DocumentUpdatePayload, DocumentUploadPayload,
    DOCUMENTS_DECODE_ERROR, UPLOAD_METADATA_FAILED, VALIDATION_FILE_REQUIRED,
    VALIDATION_FILE_TOO_LARGE, VALIDATION_FILE_TYPE, VALIDATION_NAME_REQUIRED,
};
use crate::oplog::LogScope;
use crate::platform::blobs::ProgressFn;
use crate::platform::records::{server_timestamp, ListQuery, RawRecord, REMOTE_NOT_FOUND};
use crate::state::AppState;
use crate::{AppError, AppResult};

const AREA: &str = "documents";

/// Filenames arrive from the host file picker in whatever normalization the
/// platform uses; everything is folded to NFC before it is stored.
fn nfc(text: &str) -> String {
    text.nfc().collect()
}

fn split_file_name(file_name: &str) -> (String, Option<String>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (file_name.to_string(), None),
    }
}

fn decode_document(raw: RawRecord) -> AppResult<DocumentRecord> {
    let id = raw.id.clone();
    raw.decode().map_err(|err| {
        AppError::new(
            DOCUMENTS_DECODE_ERROR,
            "A stored document record could not be read.",
        )
        .with_context("id", id)
        .with_cause(err)
    })
}

async fn fetch_documents(state: &AppState) -> AppResult<Vec<DocumentRecord>> {
    let family_id = state.session.require_household()?;
    let rows = state
        .platform
        .records
        .list(
            &state.config.collections.documents,
            ListQuery::filter_eq("family_id", family_id).order_desc("created_at"),
        )
        .await
        .map_err(AppError::from)?;
    rows.into_iter().map(decode_document).collect()
}

#[derive(Debug)]
struct UploadPlan {
    display_name: String,
    original_name: String,
    extension: String,
    mime: String,
    size: i64,
}

fn plan_upload(
    payload: &DocumentUploadPayload,
    bytes: &[u8],
    max_file_size_bytes: u64,
) -> AppResult<UploadPlan> {
    if bytes.is_empty() {
        return Err(AppError::new(
            VALIDATION_FILE_REQUIRED,
            "Choose a file to upload.",
        ));
    }

    let original_name = nfc(payload.file_name.trim());
    let (stem, extension) = split_file_name(&original_name);
    let extension = extension.ok_or_else(|| {
        AppError::new(
            VALIDATION_FILE_TYPE,
            "That file type isn't supported here.",
        )
        .with_context("file_name", original_name.clone())
    })?;
    if FileKind::for_extension(&extension).is_none() {
        return Err(AppError::new(
            VALIDATION_FILE_TYPE,
            "That file type isn't supported here.",
        )
        .with_context("extension", extension));
    }

    if bytes.len() as u64 > max_file_size_bytes {
        return Err(AppError::new(
            VALIDATION_FILE_TOO_LARGE,
            "Files can be at most 10 MB.",
        )
        .with_context("size", bytes.len().to_string())
        .with_context("limit", max_file_size_bytes.to_string()));
    }

    let display_name = match payload.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => nfc(name),
        _ => stem,
    };

    let mime = match payload.mime.as_deref().map(str::trim) {
        Some(mime) if !mime.is_empty() => mime.to_string(),
        _ => mime_guess::from_path(&original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    Ok(UploadPlan {
        display_name,
        original_name,
        extension,
        mime,
        size: bytes.len() as i64,
    })
}

/// Document CRUD over the two-phase upload: bytes to blob storage first,
/// metadata second. Like the members side, mutations reload the cache
/// wholesale instead of patching it.
#[derive(Clone)]
pub struct DocumentsController {
    state: AppState,
}

impl DocumentsController {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn reload(&self) {
        let state = self.state.clone();
        self.state
            .documents
            .reload(move || async move { fetch_documents(&state).await })
            .await;
    }

    pub async fn upload(
        &self,
        payload: DocumentUploadPayload,
        bytes: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> AppResult<String> {
        let scope = LogScope::new(
            AREA,
            "document_upload",
            self.state.session.household_id(),
            None,
        );
        match self.upload_inner(payload, bytes, progress).await {
            Ok(id) => {
                scope.success(Some(id.as_str()), json!({}));
                Ok(id)
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    async fn upload_inner(
        &self,
        payload: DocumentUploadPayload,
        bytes: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> AppResult<String> {
        let identity = self.state.session.require_identity()?;
        let family_id = self.state.session.require_household()?;
        let plan = plan_upload(&payload, &bytes, self.state.config.max_file_size_bytes)?;

        let storage_path = format!(
            "{}/{}/{}.{}",
            self.state.config.storage.documents,
            family_id,
            new_storage_stem(),
            plan.extension
        );

        let stored = self
            .state
            .platform
            .blobs
            .put(&storage_path, bytes, progress)
            .await
            .map_err(AppError::from)?;

        let mut fields = Map::new();
        fields.insert("family_id".into(), Value::String(family_id));
        fields.insert("name".into(), Value::String(plan.display_name.clone()));
        fields.insert(
            "original_name".into(),
            Value::String(plan.original_name.clone()),
        );
        fields.insert(
            "category".into(),
            Value::String(payload.category.as_str().to_string()),
        );
        fields.insert(
            "description".into(),
            match payload.description.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => Value::String(text.to_string()),
                _ => Value::Null,
            },
        );
        fields.insert("mime".into(), Value::String(plan.mime));
        fields.insert("size".into(), Value::from(plan.size));
        fields.insert("url".into(), Value::String(stored.url));
        fields.insert("storage_path".into(), Value::String(storage_path.clone()));
        fields.insert("uploaded_by".into(), Value::String(identity.uid.clone()));
        fields.insert("created_at".into(), server_timestamp());
        fields.insert("updated_at".into(), server_timestamp());

        let id = match self
            .state
            .platform
            .records
            .add(&self.state.config.collections.documents, fields)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                // The blob stays behind; a later cleanup job can sweep it.
                warn!(
                    target: "hearthstore",
                    event = "document_blob_orphaned",
                    storage_path = storage_path.as_str()
                );
                return Err(AppError::new(
                    UPLOAD_METADATA_FAILED,
                    "The file was uploaded but could not be registered. Try again.",
                )
                .with_context("storage_path", storage_path)
                .with_cause(err));
            }
        };

        self.state.activity().record(
            &identity.uid,
            ActivityKind::DocumentUploaded,
            json!({ "document_id": id, "name": plan.display_name, "size": plan.size }),
        );

        self.reload().await;
        Ok(id)
    }

    pub async fn update(&self, id: &str, payload: DocumentUpdatePayload) -> AppResult<()> {
        let scope = LogScope::new(
            AREA,
            "document_update",
            self.state.session.household_id(),
            Some(id.to_string()),
        );
        match self.update_inner(id, payload).await {
            Ok(()) => {
                scope.success(None, json!({}));
                Ok(())
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    async fn update_inner(&self, id: &str, payload: DocumentUpdatePayload) -> AppResult<()> {
        let identity = self.state.session.require_identity()?;

        let mut fields = Map::new();
        if let Some(name) = payload.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::new(VALIDATION_NAME_REQUIRED, "Name is required."));
            }
            fields.insert("name".into(), Value::String(nfc(name)));
        }
        if let Some(category) = payload.category {
            fields.insert(
                "category".into(),
                Value::String(category.as_str().to_string()),
            );
        }
        if let Some(description) = payload.description.as_deref() {
            let description = description.trim();
            fields.insert(
                "description".into(),
                if description.is_empty() {
                    Value::Null
                } else {
                    Value::String(description.to_string())
                },
            );
        }
        fields.insert("updated_at".into(), server_timestamp());

        self.state
            .platform
            .records
            .update(&self.state.config.collections.documents, id, fields)
            .await
            .map_err(AppError::from)?;

        self.state.activity().record(
            &identity.uid,
            ActivityKind::DocumentUpdated,
            json!({ "document_id": id }),
        );

        self.reload().await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let scope = LogScope::new(
            AREA,
            "document_delete",
            self.state.session.household_id(),
            Some(id.to_string()),
        );
        match self.delete_inner(id).await {
            Ok(()) => {
                scope.success(None, json!({}));
                Ok(())
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    async fn delete_inner(&self, id: &str) -> AppResult<()> {
        let identity = self.state.session.require_identity()?;
        let document = self.cached_document(id)?;

        // Best effort on the blob; the metadata row is what the UI sees.
        if let Err(err) = self
            .state
            .platform
            .blobs
            .delete(&document.storage_path)
            .await
        {
            warn!(
                target: "hearthstore",
                event = "document_blob_delete_failed",
                storage_path = document.storage_path.as_str(),
                error = %err
            );
        }

        self.state
            .platform
            .records
            .delete(&self.state.config.collections.documents, id)
            .await
            .map_err(AppError::from)?;

        self.state.activity().record(
            &identity.uid,
            ActivityKind::DocumentDeleted,
            json!({ "document_id": id, "name": document.name }),
        );

        self.reload().await;
        Ok(())
    }

    /// Hands back the stored URL and notes the download in the audit trail.
    pub fn download_url(&self, id: &str) -> AppResult<String> {
        self.url_with_activity(id, "document_download", ActivityKind::DocumentDownloaded)
    }

    pub fn view_url(&self, id: &str) -> AppResult<String> {
        self.url_with_activity(id, "document_view", ActivityKind::DocumentViewed)
    }

    fn url_with_activity(
        &self,
        id: &str,
        cmd: &'static str,
        kind: ActivityKind,
    ) -> AppResult<String> {
        let scope = LogScope::new(
            AREA,
            cmd,
            self.state.session.household_id(),
            Some(id.to_string()),
        );
        let result = (|| {
            let identity = self.state.session.require_identity()?;
            let document = self.cached_document(id)?;
            self.state.activity().record(
                &identity.uid,
                kind,
                json!({ "document_id": id, "name": document.name }),
            );
            Ok(document.url)
        })();
        match result {
            Ok(url) => {
                scope.success(None, json!({}));
                Ok(url)
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    fn cached_document(&self, id: &str) -> AppResult<DocumentRecord> {
        self.state
            .documents
            .snapshot()
            .into_iter()
            .find(|document| document.id == id)
            .ok_or_else(|| {
                AppError::new(REMOTE_NOT_FOUND, "Record not found").with_context("id", id)
            })
    }
}
