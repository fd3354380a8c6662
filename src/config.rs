use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

/// Collection names in the hosted document store. Kept configurable so a
/// staging deployment can point the same client at prefixed collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CollectionNames {
    pub users: String,
    pub families: String,
    pub members: String,
    pub documents: String,
    pub activities: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            users: "users".into(),
            families: "families".into(),
            members: "members".into(),
            documents: "documents".into(),
            activities: "activities".into(),
        }
    }
}

/// Prefixes for blob storage paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StoragePrefixes {
    pub documents: String,
    pub avatars: String,
}

impl Default for StoragePrefixes {
    fn default() -> Self {
        Self {
            documents: "documents".into(),
            avatars: "avatars".into(),
        }
    }
}

/// Broad grouping of accepted upload types, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/", rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "csv"];
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z"];

impl FileKind {
    pub const ALL: [FileKind; 5] = [
        FileKind::Image,
        FileKind::Document,
        FileKind::Spreadsheet,
        FileKind::Presentation,
        FileKind::Archive,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Document => "document",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::Presentation => "presentation",
            FileKind::Archive => "archive",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Image => IMAGE_EXTENSIONS,
            FileKind::Document => DOCUMENT_EXTENSIONS,
            FileKind::Spreadsheet => SPREADSHEET_EXTENSIONS,
            FileKind::Presentation => PRESENTATION_EXTENSIONS,
            FileKind::Archive => ARCHIVE_EXTENSIONS,
        }
    }

    /// Classify a bare extension (no dot); `None` means the upload is rejected.
    pub fn for_extension(ext: &str) -> Option<FileKind> {
        let ext = ext.to_ascii_lowercase();
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported file kind: {value}")]
pub struct FileKindError {
    value: String,
}

impl FromStr for FileKind {
    type Err = FileKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FileKind::Image),
            "document" => Ok(FileKind::Document),
            "spreadsheet" => Ok(FileKind::Spreadsheet),
            "presentation" => Ok(FileKind::Presentation),
            "archive" => Ok(FileKind::Archive),
            other => Err(FileKindError {
                value: other.to_string(),
            }),
        }
    }
}

/// Context the embedding shell knows about the current client. Written into
/// activity entries verbatim; nothing here is fetched by this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ClientContext {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl ClientContext {
    pub fn user_agent_or_unknown(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("unknown")
    }

    pub fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

/// Runtime configuration for the client core. `Default` matches the hosted
/// deployment; embedders override individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AppConfig {
    pub collections: CollectionNames,
    pub storage: StoragePrefixes,
    pub client: ClientContext,
    /// Uploads larger than this are rejected before any bytes move.
    pub max_file_size_bytes: u64,
    /// Inactivity window after which the periodic check signs the user out.
    pub session_timeout_ms: i64,
    /// Cadence of the periodic session check.
    pub session_check_interval_ms: u64,
    /// Quiet window the search debouncer waits for after the last keystroke.
    pub search_debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collections: CollectionNames::default(),
            storage: StoragePrefixes::default(),
            client: ClientContext::default(),
            max_file_size_bytes: 10 * 1024 * 1024,
            session_timeout_ms: 24 * 60 * 60 * 1000,
            session_check_interval_ms: 5 * 60 * 1000,
            search_debounce_ms: 300,
        }
    }
}

impl AppConfig {
    pub fn session_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.session_check_interval_ms)
    }

    pub fn search_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.search_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hosted_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.collections.members, "members");
        assert_eq!(config.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.session_timeout_ms, 86_400_000);
        assert_eq!(config.session_check_interval_ms, 300_000);
        assert_eq!(config.search_debounce_ms, 300);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"max_file_size_bytes": 1024}"#).expect("parse");
        assert_eq!(config.max_file_size_bytes, 1024);
        assert_eq!(config.collections.documents, "documents");
    }

    #[test]
    fn extensions_classify_case_insensitively() {
        assert_eq!(FileKind::for_extension("PDF"), Some(FileKind::Document));
        assert_eq!(FileKind::for_extension("webp"), Some(FileKind::Image));
        assert_eq!(FileKind::for_extension("7z"), Some(FileKind::Archive));
        assert_eq!(FileKind::for_extension("exe"), None);
    }

    #[test]
    fn file_kind_slug_round_trips() {
        for kind in FileKind::ALL {
            let parsed: FileKind = kind.as_str().parse().expect("parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn client_context_defaults_to_unknown() {
        let context = ClientContext::default();
        assert_eq!(context.ip_or_unknown(), "unknown");
        assert_eq!(context.user_agent_or_unknown(), "unknown");
    }
}
