//! OpenPortal Datasource Engine
//!
//! Datasources are named, configured sources of data bound into widgets.
//! The [`DatasourceManager`] attaches them, applies their fetch policy
//! against the shared [`DatasourceCache`], calls the handler registered for
//! their type and pushes every state transition to subscribers.

mod cache;
mod error;
pub mod handlers;
mod key;
mod manager;
mod state;
mod subscription;
pub mod websocket;

pub use cache::{CacheStats, CachedValue, DatasourceCache};
pub use error::DatasourceError;
pub use handlers::{DatasourceHandler, DatasourceRegistry, WatchCallback, WatchEvent, builtin_registry};
pub use key::{cache_key, canonical_json};
pub use manager::{DatasourceHandle, DatasourceManager, StateCallback};
pub use state::{DatasourceState, DatasourceStatus, StateError};
pub use subscription::Subscription;
