use thiserror::Error;

/// Errors building a page session.
#[derive(Debug, Error)]
pub enum SessionError {
  #[error("invalid engine config: {0}")]
  Config(#[from] openportal_config::ConfigError),

  #[error("failed to register built-in handlers: {0}")]
  Registry(#[from] openportal_registry::RegistryError),
}

#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("action runner channel closed")]
  ChannelClosed,
}
