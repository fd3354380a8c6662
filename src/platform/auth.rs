use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;

use crate::model::Identity;

pub const AUTH_POPUP_CLOSED: &str = "AUTH/POPUP_CLOSED";
pub const AUTH_POPUP_BLOCKED: &str = "AUTH/POPUP_BLOCKED";
pub const AUTH_NETWORK: &str = "AUTH/NETWORK";
pub const AUTH_THROTTLED: &str = "AUTH/THROTTLED";
pub const AUTH_FAILED: &str = "AUTH/FAILED";

/// Sign-in failures the provider distinguishes. Everything else lands in
/// `Failed` with the provider's own detail string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("sign-in popup closed by the user")]
    PopupClosed,
    #[error("sign-in popup blocked")]
    PopupBlocked,
    #[error("network request failed")]
    Network,
    #[error("too many sign-in attempts")]
    TooManyRequests,
    #[error("sign-in failed: {0}")]
    Failed(String),
}

/// Boundary to the hosted authentication provider.
///
/// The change stream carries `Some(identity)` after sign-in and `None`
/// after sign-out. Providers may redeliver the current value; consumers
/// are expected to deduplicate (the lifecycle controller does).
pub trait AuthProvider: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    fn sign_in(&self) -> BoxFuture<'_, Result<Identity, AuthError>>;

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>>;
}
