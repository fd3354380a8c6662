use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::model::{
    ActivityKind, MemberPayload, MemberRecord, EXPORT_EMPTY, MEMBERS_DECODE_ERROR,
    VALIDATION_DUPLICATE_MEMBER, VALIDATION_NAME_REQUIRED, VALIDATION_PHONE_INVALID,
    VALIDATION_RELATION_REQUIRED,
};
use crate::oplog::LogScope;
use crate::platform::records::{server_timestamp, ListQuery, RawRecord};
use crate::state::AppState;
use crate::{export, time, AppError, AppResult};

const AREA: &str = "members";

// Mainland mobile numbers only; landlines are out of scope for the form.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^1[3-9]\d{9}$").expect("phone validation pattern to compile"));

fn validate_payload(payload: &MemberPayload) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::new(VALIDATION_NAME_REQUIRED, "Name is required."));
    }
    if payload.relation.trim().is_empty() {
        return Err(AppError::new(
            VALIDATION_RELATION_REQUIRED,
            "Relation is required.",
        ));
    }
    if let Some(phone) = payload.phone.as_deref() {
        let phone = phone.trim();
        if !phone.is_empty() && !PHONE_PATTERN.is_match(phone) {
            return Err(AppError::new(
                VALIDATION_PHONE_INVALID,
                "Enter a valid 11-digit mobile number.",
            )
            .with_context("phone", phone.to_string()));
        }
    }
    Ok(())
}

/// Same display name (case-insensitive) plus same relation counts as the
/// same person. Checked against the cache on create only; edits may keep
/// their own name.
fn find_duplicate(existing: &[MemberRecord], name: &str, relation: &str) -> Option<String> {
    let name_folded = name.trim().to_lowercase();
    let relation = relation.trim();
    existing
        .iter()
        .find(|member| {
            member.name.trim().to_lowercase() == name_folded && member.relation.trim() == relation
        })
        .map(|member| member.id.clone())
}

fn optional_text(value: Option<&str>) -> Value {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Value::String(text.to_string()),
        _ => Value::Null,
    }
}

fn birthdate_value(birthdate: Option<NaiveDate>) -> Value {
    match birthdate {
        Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}

fn editable_fields(payload: &MemberPayload) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "name".into(),
        Value::String(payload.name.trim().to_string()),
    );
    fields.insert(
        "relation".into(),
        Value::String(payload.relation.trim().to_string()),
    );
    fields.insert("birthdate".into(), birthdate_value(payload.birthdate));
    fields.insert("phone".into(), optional_text(payload.phone.as_deref()));
    fields.insert("notes".into(), optional_text(payload.notes.as_deref()));
    fields
}

fn decode_member(raw: RawRecord) -> AppResult<MemberRecord> {
    let id = raw.id.clone();
    raw.decode().map_err(|err| {
        AppError::new(
            MEMBERS_DECODE_ERROR,
            "A stored member record could not be read.",
        )
        .with_context("id", id)
        .with_cause(err)
    })
}

async fn fetch_members(state: &AppState) -> AppResult<Vec<MemberRecord>> {
    let family_id = state.session.require_household()?;
    let rows = state
        .platform
        .records
        .list(
            &state.config.collections.members,
            ListQuery::filter_eq("family_id", family_id).order_desc("created_at"),
        )
        .await
        .map_err(AppError::from)?;
    rows.into_iter().map(decode_member).collect()
}

/// Whole-years age with the birthday-not-yet-reached adjustment.
pub fn age_from_birthdate(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

/// Member CRUD plus the CSV export. Every mutation goes to the backend
/// first, then the cache is reloaded wholesale; the cache is never patched
/// in place.
#[derive(Clone)]
pub struct MembersController {
    state: AppState,
}

impl MembersController {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Replaces the members cache from the backend. Failures are logged and
    /// leave the cache empty rather than surfacing to the caller.
    pub async fn reload(&self) {
        let state = self.state.clone();
        self.state
            .members
            .reload(move || async move { fetch_members(&state).await })
            .await;
    }

    pub async fn add(&self, payload: MemberPayload) -> AppResult<String> {
        let scope = LogScope::new(AREA, "member_add", self.state.session.household_id(), None);
        match self.add_inner(payload).await {
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

    async fn add_inner(&self, payload: MemberPayload) -> AppResult<String> {
        let identity = self.state.session.require_identity()?;
        let family_id = self.state.session.require_household()?;
        validate_payload(&payload)?;

        let existing = self.state.members.snapshot();
        if let Some(existing_id) = find_duplicate(&existing, &payload.name, &payload.relation) {
            return Err(AppError::new(
                VALIDATION_DUPLICATE_MEMBER,
                "A member with that name and relation already exists.",
            )
            .with_context("existing_id", existing_id));
        }

        let mut fields = editable_fields(&payload);
        fields.insert("family_id".into(), Value::String(family_id));
        fields.insert("created_by".into(), Value::String(identity.uid.clone()));
        fields.insert("created_at".into(), server_timestamp());
        fields.insert("updated_at".into(), server_timestamp());

        let id = self
            .state
            .platform
            .records
            .add(&self.state.config.collections.members, fields)
            .await
            .map_err(AppError::from)?;

        self.state.activity().record(
            &identity.uid,
            ActivityKind::MemberAdded,
            json!({ "member_id": id, "name": payload.name.trim() }),
        );

        self.reload().await;
        Ok(id)
    }

    pub async fn update(&self, id: &str, payload: MemberPayload) -> AppResult<()> {
        let scope = LogScope::new(
            AREA,
            "member_update",
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

    async fn update_inner(&self, id: &str, payload: MemberPayload) -> AppResult<()> {
        let identity = self.state.session.require_identity()?;
        validate_payload(&payload)?;

        let mut fields = editable_fields(&payload);
        fields.insert("updated_at".into(), server_timestamp());

        self.state
            .platform
            .records
            .update(&self.state.config.collections.members, id, fields)
            .await
            .map_err(AppError::from)?;

        self.state.activity().record(
            &identity.uid,
            ActivityKind::MemberUpdated,
            json!({ "member_id": id }),
        );

        self.reload().await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let scope = LogScope::new(
            AREA,
            "member_delete",
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

        self.state
            .platform
            .records
            .delete(&self.state.config.collections.members, id)
            .await
            .map_err(AppError::from)?;

        self.state.activity().record(
            &identity.uid,
            ActivityKind::MemberDeleted,
            json!({ "member_id": id }),
        );

        self.reload().await;
        Ok(())
    }

    /// Renders the cached members as CSV. Refuses an empty export so the
    /// shell never offers a headers-only download.
    pub async fn export_csv(&self) -> AppResult<String> {
        let scope = LogScope::new(
            AREA,
            "members_export",
            self.state.session.household_id(),
            None,
        );
        match self.export_inner().await {
            Ok(csv) => {
                scope.success(None, json!({ "bytes": csv.len() }));
                Ok(csv)
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    async fn export_inner(&self) -> AppResult<String> {
        let identity = self.state.session.require_identity()?;
        let members = self.state.members.snapshot();
        if members.is_empty() {
            return Err(AppError::new(
                EXPORT_EMPTY,
                "There are no members to export yet.",
            ));
        }

        let csv = export::members_to_csv(&members, time::today());

        self.state.activity().record(
            &identity.uid,
            ActivityKind::MembersExported,
            json!({ "count": members.len() }),
        );

        Ok(csv)
    }
}
