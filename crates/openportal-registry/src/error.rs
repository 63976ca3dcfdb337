use thiserror::Error;

/// Errors that can occur when working with a handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  /// No handler registered for the type.
  #[error("handler not found: {type_name}")]
  NotFound { type_name: String },

  /// A handler is already registered for the type.
  #[error("handler already registered: {type_name}")]
  Duplicate { type_name: String },

  /// The type is handled by the engine itself and cannot be registered.
  #[error("handler type is reserved: {type_name}")]
  Reserved { type_name: String },
}
