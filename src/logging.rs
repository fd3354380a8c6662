use std::panic;
use std::path::Path;
use std::sync::Once;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{note_panic_crash_id, panic_payload, CrashId};

const DEFAULT_DIRECTIVES: &str = "hearthstore=info";
pub const LOG_FILE_PREFIX: &str = "hearthstore.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Every panic gets a crash id in the log stream; the id is parked in a
/// thread-local so the dispatch fence can attach the same id to the error
/// it hands back.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let crash_id = CrashId::new();
            let message = panic_payload(info.payload());
            let location = info.location().map(|location| location.to_string());
            tracing::error!(
                target: "hearthstore",
                event = "panic",
                crash_id = %crash_id,
                location = location.as_deref(),
                message = message.as_str()
            );
            note_panic_crash_id(crash_id);
            previous(info);
        }));
    });
}

/// Console-only logging. Safe to call more than once; later calls keep the
/// subscriber already installed.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(UtcTime::rfc_3339())
                .with_target(true),
        )
        .try_init();
    install_panic_hook();
}

/// Console plus a daily-rolling JSON file under `dir`. The returned guard
/// flushes the writer thread; hold it for the life of the process.
pub fn init_with_file(dir: &Path) -> anyhow::Result<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(UtcTime::rfc_3339())
                .with_target(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .context("install tracing subscriber")?;
    install_panic_hook();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_panic_crash_id;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn init_twice_keeps_the_first_subscriber() {
        init();
        init();
    }

    #[test]
    fn panic_hook_parks_a_crash_id_for_the_fence() {
        install_panic_hook();
        let _ = take_panic_crash_id();
        let result = catch_unwind(AssertUnwindSafe(|| panic!("hook check")));
        assert!(result.is_err());
        assert!(take_panic_crash_id().is_some());
    }
}
