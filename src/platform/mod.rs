use std::sync::Arc;

pub mod auth;
pub mod blobs;
pub mod memory;
pub mod records;

pub use auth::AuthProvider;
pub use blobs::BlobStore;
pub use records::RecordStore;

/// The trio of hosted-backend boundaries the client core talks to.
/// Cloning shares the underlying implementations.
#[derive(Clone)]
pub struct Platform {
    pub auth: Arc<dyn AuthProvider>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Platform {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            auth,
            records,
            blobs,
        }
    }

    /// Fully in-memory platform; good for tests and backend-free demos.
    pub fn in_memory() -> Self {
        Self {
            auth: Arc::new(memory::MemoryAuth::new()),
            records: Arc::new(memory::MemoryRecords::new()),
            blobs: Arc::new(memory::MemoryBlobs::new()),
        }
    }
}
