//! OpenPortal Config
//!
//! This crate contains the serializable configuration types for OpenPortal.
//! The backend describes actions and datasources as JSON; these types are
//! what that JSON deserializes into before the engine executes it.
//!
//! Configuration can be loaded from:
//! - page payloads sent by the backend (as JSON blobs)
//! - JSON files (via CLI, e.g. `openportal run action.json`)
//!
//! All types are immutable once loaded. The engine consumes them by
//! reference and never mutates a config while executing it.

mod action;
mod datasource;
mod engine;
mod error;

pub use action::{ActionConfig, Backoff, RetryConfig};
pub use datasource::{DatasourceConfig, DatasourceSource, FetchPolicy, HttpSourceConfig, WebSocketSourceConfig};
pub use engine::EngineConfig;
pub use error::ConfigError;
