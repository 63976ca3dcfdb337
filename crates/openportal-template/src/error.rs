use thiserror::Error;

/// Errors that can occur while evaluating templates.
///
/// Placeholder resolution itself never fails; only malformed `when`
/// expressions and invalid state writes produce errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
  /// A `when` expression could not be parsed or evaluated.
  #[error("invalid expression '{expression}': {message}")]
  InvalidExpression { expression: String, message: String },

  /// A path could not be written because an intermediate value is a scalar.
  #[error("cannot write path '{path}': segment '{segment}' is not a container")]
  NotAContainer { path: String, segment: String },

  /// An empty path was given where a target is required.
  #[error("path must not be empty")]
  EmptyPath,
}
