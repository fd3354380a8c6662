use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

/// Upload progress observer, called with 0..=100 percent. Implementations
/// must call it with 100 exactly once, as the final invocation.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Handle to a stored blob as returned by the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("no blob stored at {path}")]
    NotFound { path: String },
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("blob transfer failed: {0}")]
    Failed(String),
}

/// Boundary to the hosted blob storage service.
pub trait BlobStore: Send + Sync {
    fn put<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, Result<StoredBlob, BlobError>>;

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), BlobError>>;
}
