//! Handler registries.
//!
//! Actions and datasources select their implementation by a type string
//! sent from configuration (`"apiCall"`, `"http"`, ...). A [`Registry`] maps
//! those strings to shared handler objects plus descriptive metadata.
//!
//! Registration is expected to happen at startup, before executors consult
//! the registry; lookups afterwards are cheap read-locked clones of an `Arc`.

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{HandlerMetadata, Registry};
