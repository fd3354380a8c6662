use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::category::DocumentCategory;

pub const GENERIC_FAIL: &str = "GENERIC/FAIL";
pub const GENERIC_FAIL_MESSAGE: &str = "Something went wrong — please try again.";

pub const MEMBERS_DECODE_ERROR: &str = "MEMBERS/DECODE";
pub const DOCUMENTS_DECODE_ERROR: &str = "DOCUMENTS/DECODE";
pub const HOUSEHOLD_DECODE_ERROR: &str = "HOUSEHOLD/DECODE";

pub const VALIDATION_NAME_REQUIRED: &str = "VALIDATION/NAME_REQUIRED";
pub const VALIDATION_RELATION_REQUIRED: &str = "VALIDATION/RELATION_REQUIRED";
pub const VALIDATION_PHONE_INVALID: &str = "VALIDATION/PHONE_INVALID";
pub const VALIDATION_DUPLICATE_MEMBER: &str = "VALIDATION/DUPLICATE_MEMBER";
pub const VALIDATION_FILE_REQUIRED: &str = "VALIDATION/FILE_REQUIRED";
pub const VALIDATION_FILE_TYPE: &str = "VALIDATION/UNSUPPORTED_FILE_TYPE";
pub const VALIDATION_FILE_TOO_LARGE: &str = "VALIDATION/FILE_TOO_LARGE";

pub const SESSION_REQUIRED: &str = "SESSION/REQUIRED";
pub const EXPORT_EMPTY: &str = "EXPORT/EMPTY";
pub const UPLOAD_METADATA_FAILED: &str = "UPLOAD/METADATA_FAILED";

/// Authenticated principal as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub photo_url: Option<String>,
}

impl Identity {
    /// Label shown for the user and used when naming a fresh household.
    /// Falls back to the local part of the email address.
    pub fn label(&self) -> &str {
        if let Some(name) = self.display_name.as_deref() {
            if !name.trim().is_empty() {
                return name;
            }
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct UserSettings {
    pub notifications: bool,
    pub theme: String,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            theme: "light".into(),
            language: "zh-CN".into(),
        }
    }
}

/// Profile record kept in the `users` collection, created on first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub photo_url: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub settings: UserSettings,
    pub created_at: i64,
    pub last_login_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct HouseholdSettings {
    pub privacy: String,
    pub allow_invites: bool,
}

impl Default for HouseholdSettings {
    fn default() -> Self {
        Self {
            privacy: "private".into(),
            allow_invites: true,
        }
    }
}

/// Household record; one per user, created lazily on first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct Household {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub settings: HouseholdSettings,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Family member record mirrored into the members cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct MemberRecord {
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub birthdate: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Document metadata record mirrored into the documents cache. The bytes
/// themselves live in blob storage at `storage_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct DocumentRecord {
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub original_name: String,
    pub category: DocumentCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    pub mime: String,
    pub size: i64,
    pub url: String,
    pub storage_path: String,
    pub uploaded_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Audit trail entry. Append-only; the client never reads these back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct ActivityEntry {
    pub user_id: String,
    pub kind: ActivityKind,
    #[ts(type = "unknown")]
    pub data: Value,
    pub timestamp: i64,
    pub user_agent: String,
    pub ip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/", rename_all = "snake_case")]
pub enum ActivityKind {
    Login,
    MemberAdded,
    MemberUpdated,
    MemberDeleted,
    MembersExported,
    DocumentUploaded,
    DocumentUpdated,
    DocumentDeleted,
    DocumentDownloaded,
    DocumentViewed,
}

impl ActivityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Login => "login",
            ActivityKind::MemberAdded => "member_added",
            ActivityKind::MemberUpdated => "member_updated",
            ActivityKind::MemberDeleted => "member_deleted",
            ActivityKind::MembersExported => "members_exported",
            ActivityKind::DocumentUploaded => "document_uploaded",
            ActivityKind::DocumentUpdated => "document_updated",
            ActivityKind::DocumentDeleted => "document_deleted",
            ActivityKind::DocumentDownloaded => "document_downloaded",
            ActivityKind::DocumentViewed => "document_viewed",
        }
    }
}

/// Counts shown on the dashboard overview, derived from the caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/")]
pub struct DashboardStats {
    pub members: u64,
    pub documents: u64,
}

/// Member form state as submitted by the shell.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberPayload {
    pub name: String,
    pub relation: String,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Upload form state; the file bytes travel separately.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadPayload {
    /// Name of the file as picked by the user, extension included.
    #[serde(alias = "fileName")]
    pub file_name: String,
    /// Display name; defaults to the file stem when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub category: DocumentCategory,
    #[serde(default)]
    pub description: Option<String>,
    /// MIME as reported by the shell; sniffed from the extension when absent.
    #[serde(default)]
    pub mime: Option<String>,
}

/// Edit form state for an existing document; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdatePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<DocumentCategory>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_label_prefers_display_name() {
        let identity = Identity {
            uid: "u1".into(),
            email: "ming@example.com".into(),
            display_name: Some("Ming".into()),
            photo_url: None,
        };
        assert_eq!(identity.label(), "Ming");
    }

    #[test]
    fn identity_label_falls_back_to_email_local_part() {
        let identity = Identity {
            uid: "u1".into(),
            email: "ming@example.com".into(),
            display_name: Some("   ".into()),
            photo_url: None,
        };
        assert_eq!(identity.label(), "ming");
    }

    #[test]
    fn activity_kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&ActivityKind::MemberAdded).expect("serialize");
        assert_eq!(json, "\"member_added\"");
        assert_eq!(ActivityKind::MemberAdded.as_str(), "member_added");
    }

    #[test]
    fn member_record_round_trips_birthdate_as_iso_date() {
        let record = MemberRecord {
            id: "m1".into(),
            family_id: "f1".into(),
            name: "Alice".into(),
            relation: "Daughter".into(),
            birthdate: Some(NaiveDate::from_ymd_opt(2015, 6, 1).expect("date")),
            phone: None,
            notes: None,
            created_by: "u1".into(),
            created_at: 1,
            updated_at: 1,
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"birthdate\":\"2015-06-01\""));
        let back: MemberRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn payload_accepts_camel_case_file_name() {
        let payload: DocumentUploadPayload = serde_json::from_str(
            r#"{"fileName": "passport.pdf", "category": "identity"}"#,
        )
        .expect("parse");
        assert_eq!(payload.file_name, "passport.pdf");
        assert_eq!(payload.category, DocumentCategory::Identity);
        assert!(payload.mime.is_none());
    }
}
