//! Client-side core for the Hearthstore family information app: session
//! lifecycle over a hosted auth provider, in-memory entity caches, member
//! and document CRUD against hosted record/blob storage, search, and CSV
//! export. The embedding shell supplies the `platform` boundary
//! implementations and renders whatever these controllers hand back.

pub mod activity;
pub mod cache;
pub mod category;
pub mod config;
pub mod documents;
pub mod error;
pub mod export;
pub mod household;
pub mod id;
pub mod lifecycle;
pub mod local_store;
pub mod logging;
pub mod members;
pub mod model;
pub mod oplog;
pub mod platform;
pub mod search;
pub mod session;
pub mod state;
pub mod time;
pub mod util;

pub use error::{AppError, AppResult, CrashId};
pub use lifecycle::{AuthLifecycle, AuthTransition, MemoryNavigator, Navigator, Page};
pub use platform::Platform;
pub use state::AppState;
