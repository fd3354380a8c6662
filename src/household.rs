use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::model::{
    HouseholdSettings, Identity, UserProfile, UserSettings, HOUSEHOLD_DECODE_ERROR,
};
use crate::oplog::LogScope;
use crate::platform::records::{server_timestamp, RawRecord};
use crate::state::AppState;
use crate::util::wrap_unexpected;
use crate::{AppError, AppResult};

const AREA: &str = "session";

fn decode_profile(raw: RawRecord) -> AppResult<UserProfile> {
    let id = raw.id.clone();
    raw.decode().map_err(|err| {
        AppError::new(
            HOUSEHOLD_DECODE_ERROR,
            "Your profile record could not be read.",
        )
        .with_context("id", id)
        .with_cause(err)
    })
}

fn encode_value<T: Serialize>(value: &T, operation: &'static str) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|err| wrap_unexpected(err.into(), operation))
}

fn optional_string(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::String(text.to_string()),
        None => Value::Null,
    }
}

fn fresh_profile_fields(identity: &Identity) -> AppResult<Map<String, Value>> {
    let mut fields = Map::new();
    fields.insert("uid".into(), Value::String(identity.uid.clone()));
    fields.insert("email".into(), Value::String(identity.email.clone()));
    fields.insert(
        "display_name".into(),
        optional_string(identity.display_name.as_deref()),
    );
    fields.insert(
        "photo_url".into(),
        optional_string(identity.photo_url.as_deref()),
    );
    fields.insert("family_id".into(), Value::Null);
    fields.insert(
        "settings".into(),
        encode_value(&UserSettings::default(), "user_settings_encode")?,
    );
    fields.insert("created_at".into(), server_timestamp());
    fields.insert("last_login_at".into(), server_timestamp());
    Ok(fields)
}

fn household_fields(identity: &Identity) -> AppResult<Map<String, Value>> {
    let mut fields = Map::new();
    fields.insert(
        "name".into(),
        Value::String(format!("{}'s family", identity.label())),
    );
    fields.insert("created_by".into(), Value::String(identity.uid.clone()));
    fields.insert("members".into(), json!([identity.uid]));
    fields.insert(
        "settings".into(),
        encode_value(&HouseholdSettings::default(), "household_settings_encode")?,
    );
    fields.insert("created_at".into(), server_timestamp());
    fields.insert("updated_at".into(), server_timestamp());
    Ok(fields)
}

/// Resolves the signed-in user to a household id, creating the profile and
/// the household on first login. Always touches `last_login_at` for a
/// returning profile.
pub async fn initialize_user(state: &AppState, identity: &Identity) -> AppResult<String> {
    let scope = LogScope::new(AREA, "household_init", None, Some(identity.uid.clone()));
    match initialize_inner(state, identity).await {
        Ok((household_id, created)) => {
            scope.success(
                None,
                json!({ "household_id": household_id, "created": created }),
            );
            Ok(household_id)
        }
        Err(err) => {
            scope.fail(&err);
            Err(err)
        }
    }
}

async fn initialize_inner(state: &AppState, identity: &Identity) -> AppResult<(String, bool)> {
    let users = &state.config.collections.users;
    let records = &state.platform.records;

    let existing = records
        .get(users, &identity.uid)
        .await
        .map_err(AppError::from)?;

    let family_id = match existing {
        Some(raw) => {
            let profile = decode_profile(raw)?;
            let mut touch = Map::new();
            touch.insert("last_login_at".into(), server_timestamp());
            records
                .update(users, &identity.uid, touch)
                .await
                .map_err(AppError::from)?;
            profile.family_id
        }
        None => {
            records
                .set(users, &identity.uid, fresh_profile_fields(identity)?)
                .await
                .map_err(AppError::from)?;
            None
        }
    };

    if let Some(id) = family_id {
        return Ok((id, false));
    }

    let household_id = records
        .add(
            &state.config.collections.families,
            household_fields(identity)?,
        )
        .await
        .map_err(AppError::from)?;

    let mut link = Map::new();
    link.insert("family_id".into(), Value::String(household_id.clone()));
    records
        .update(users, &identity.uid, link)
        .await
        .map_err(AppError::from)?;

    Ok((household_id, true))
}
