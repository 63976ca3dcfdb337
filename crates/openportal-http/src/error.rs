use thiserror::Error;

/// Errors that prevent an HTTP exchange from producing a response.
///
/// Non-2xx responses are not errors at this level; they are returned as
/// [`crate::HttpResponse`] values and classified by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
  /// The URL could not be parsed or joined onto the base URL.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// The method string is not a supported HTTP method.
  #[error("unsupported HTTP method: {0}")]
  InvalidMethod(String),

  /// Connection, TLS or protocol failure.
  #[error("transport error: {0}")]
  Transport(String),
}

impl From<reqwest::Error> for HttpError {
  fn from(error: reqwest::Error) -> Self {
    HttpError::Transport(error.to_string())
  }
}
