use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

/// Unique identifier used to correlate critical failures across logs and UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[repr(transparent)]
#[serde(transparent)]
#[ts(type = "string")]
pub struct CrashId(Uuid);

impl CrashId {
    /// Generate a new UUIDv7 crash identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Access the underlying UUID value.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CrashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CrashId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for CrashId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<CrashId> for Uuid {
    fn from(value: CrashId) -> Self {
        value.0
    }
}

impl Default for CrashId {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a printable message from a panic payload.
pub fn panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

thread_local! {
    static PANIC_CRASH_ID: Cell<Option<CrashId>> = const { Cell::new(None) };
}

/// Stash a crash id from the panic hook so the fence that catches the unwind
/// attaches the same id the hook already logged.
pub fn note_panic_crash_id(crash_id: CrashId) {
    PANIC_CRASH_ID.with(|slot| slot.set(Some(crash_id)));
}

/// Take the crash id recorded by the most recent panic hook run, if any.
pub fn take_panic_crash_id() -> Option<CrashId> {
    PANIC_CRASH_ID.with(|slot| slot.take())
}
