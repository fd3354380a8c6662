use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::Future;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{
    error::{panic_payload, take_panic_crash_id, CrashId},
    model::{GENERIC_FAIL, GENERIC_FAIL_MESSAGE},
    AppError, AppResult,
};

/// Collapses an unexpected failure into the generic user-facing message,
/// keeping the original as cause for the log stream.
pub fn wrap_unexpected(err: AppError, operation: &'static str) -> AppError {
    AppError::new(GENERIC_FAIL, GENERIC_FAIL_MESSAGE)
        .with_context("operation", operation)
        .with_cause(err)
}

fn app_error_from_panic(payload: Box<dyn Any + Send>) -> AppError {
    let message = panic_payload(payload.as_ref());
    let crash_id = take_panic_crash_id().unwrap_or_else(CrashId::new);

    let mut error = AppError::new("RUNTIME/PANIC", message);
    error.set_crash_id(crash_id);
    error.log_with_event("panic_caught");
    error
}

#[allow(clippy::result_large_err)]
pub fn dispatch_with_fence<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Ok(result),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

#[allow(clippy::result_large_err)]
pub async fn dispatch_async_with_fence<F, Fut, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let fut = dispatch_with_fence(|| AssertUnwindSafe(f()).catch_unwind())?;
    match fut.await {
        Ok(value) => Ok(value),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

#[allow(clippy::result_large_err)]
pub fn dispatch_app_result<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T>,
{
    dispatch_with_fence(f)?
}

#[allow(clippy::result_large_err)]
pub async fn dispatch_async_app_result<F, Fut, T>(f: F) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    dispatch_async_with_fence(f).await?
}

/// Detached task with a panic fence. Failures are logged under `event` and
/// never propagate as a `JoinError`; callers that need ordering can still
/// await the handle.
pub fn spawn_logged<F, Fut>(event: &'static str, f: F) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = dispatch_async_app_result(f).await {
            warn!(
                target: "hearthstore",
                event = event,
                code = err.code(),
                message = err.message()
            );
        }
    })
}
