use std::collections::HashMap;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::AppError;

fn context_to_json(context: &HashMap<String, String>) -> Option<Value> {
    if context.is_empty() {
        None
    } else {
        let mut map = Map::with_capacity(context.len());
        for (key, value) in context {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Some(Value::Object(map))
    }
}

// Expected outcomes of user input get warn-level noise, not error-level.
fn is_client_input_error(code: &str) -> bool {
    code.starts_with("VALIDATION/") || code.starts_with("SESSION/") || code.starts_with("AUTH/")
}

fn wrap_details(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "value": value })
    }
}

fn default_details() -> Value {
    Value::Object(Map::new())
}

fn default_area() -> String {
    "app".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UiLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Log record forwarded from the rendering shell so UI events land in the
/// same structured stream as core events.
#[derive(Debug, Clone, Deserialize)]
pub struct UiLogRecord {
    pub cmd: String,
    pub level: UiLogLevel,
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default)]
    pub household_id: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default = "default_details")]
    pub details: Value,
}

pub fn emit_ui_log(record: UiLogRecord) {
    let UiLogRecord {
        cmd,
        level,
        area,
        household_id,
        entity_id,
        duration_ms,
        details,
    } = record;

    let wrapped_details = wrap_details(details);

    match level {
        UiLogLevel::Debug => debug!(
            target: "hearthstore",
            area = area.as_str(),
            cmd = cmd.as_str(),
            household_id = household_id.as_deref(),
            entity_id = entity_id.as_deref(),
            duration_ms = duration_ms,
            details = %wrapped_details
        ),
        UiLogLevel::Info => info!(
            target: "hearthstore",
            area = area.as_str(),
            cmd = cmd.as_str(),
            household_id = household_id.as_deref(),
            entity_id = entity_id.as_deref(),
            duration_ms = duration_ms,
            details = %wrapped_details
        ),
        UiLogLevel::Warn => warn!(
            target: "hearthstore",
            area = area.as_str(),
            cmd = cmd.as_str(),
            household_id = household_id.as_deref(),
            entity_id = entity_id.as_deref(),
            duration_ms = duration_ms,
            details = %wrapped_details
        ),
        UiLogLevel::Error => error!(
            target: "hearthstore",
            area = area.as_str(),
            cmd = cmd.as_str(),
            household_id = household_id.as_deref(),
            entity_id = entity_id.as_deref(),
            duration_ms = duration_ms,
            details = %wrapped_details
        ),
    }
}

/// Scoped enter/success/fail logging for one controller operation, with
/// elapsed time on the closing event.
pub struct LogScope {
    area: &'static str,
    cmd: &'static str,
    household_id: Option<String>,
    entity_id: Option<String>,
    start: Instant,
}

impl LogScope {
    pub fn new(
        area: &'static str,
        cmd: &'static str,
        household_id: Option<String>,
        entity_id: Option<String>,
    ) -> Self {
        let scope = Self {
            area,
            cmd,
            household_id,
            entity_id,
            start: Instant::now(),
        };
        debug!(
            target: "hearthstore",
            area = scope.area,
            cmd = scope.cmd,
            household_id = scope.household_id.as_deref(),
            entity_id = scope.entity_id.as_deref(),
            details = %json!({ "stage": "enter" })
        );
        scope
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn resolved_entity(&self, override_id: Option<&str>) -> Option<String> {
        override_id
            .map(|value| value.to_string())
            .or_else(|| self.entity_id.clone())
    }

    pub fn success(&self, entity_id: Option<&str>, details: Value) {
        info!(
            target: "hearthstore",
            area = self.area,
            cmd = self.cmd,
            household_id = self.household_id.as_deref(),
            entity_id = self.resolved_entity(entity_id).as_deref(),
            duration_ms = self.elapsed_ms() as u64,
            details = %wrap_details(details)
        );
    }

    pub fn warn(&self, details: Value) {
        warn!(
            target: "hearthstore",
            area = self.area,
            cmd = self.cmd,
            household_id = self.household_id.as_deref(),
            entity_id = self.entity_id.as_deref(),
            duration_ms = self.elapsed_ms() as u64,
            details = %wrap_details(details)
        );
    }

    pub fn fail(&self, err: &AppError) {
        let mut map = Map::new();
        map.insert("code".into(), Value::String(err.code().to_string()));
        map.insert("message".into(), Value::String(err.message().to_string()));
        if let Some(context) = context_to_json(err.context()) {
            map.insert("context".into(), context);
        }

        if is_client_input_error(err.code()) {
            self.warn(Value::Object(map));
            return;
        }

        if let Some(crash) = err.crash_id() {
            map.insert("crash_id".into(), Value::String(crash.to_string()));
        }
        error!(
            target: "hearthstore",
            area = self.area,
            cmd = self.cmd,
            household_id = self.household_id.as_deref(),
            entity_id = self.entity_id.as_deref(),
            duration_ms = self.elapsed_ms() as u64,
            details = %serde_json::Value::Object(map)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_codes_warn_instead_of_error() {
        assert!(is_client_input_error("VALIDATION/NAME_REQUIRED"));
        assert!(is_client_input_error("SESSION/REQUIRED"));
        assert!(is_client_input_error("AUTH/POPUP_CLOSED"));
        assert!(!is_client_input_error("REMOTE/UNAVAILABLE"));
        assert!(!is_client_input_error("RUNTIME/PANIC"));
    }

    #[test]
    fn wrap_details_preserves_objects_and_boxes_scalars() {
        assert_eq!(wrap_details(json!({ "a": 1 })), json!({ "a": 1 }));
        assert_eq!(wrap_details(json!(5)), json!({ "value": 5 }));
    }

    #[test]
    fn ui_record_defaults_area_and_details() {
        let record: UiLogRecord =
            serde_json::from_str(r#"{"cmd": "members_render", "level": "INFO"}"#).expect("parse");
        assert_eq!(record.area, "app");
        assert!(record.details.is_object());
        emit_ui_log(record);
    }
}
