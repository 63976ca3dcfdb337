//! OpenPortal Action Engine
//!
//! Drives declarative [`ActionConfig`](openportal_config::ActionConfig)s
//! through their lifecycle: `when` gating, template resolution, handler
//! dispatch, timeouts, retries and success/error chains.
//!
//! Handlers are looked up by type string in an [`ActionRegistry`]. The
//! composite types `sequence`, `parallel` and `conditional` are executed by
//! the [`ActionExecutor`] itself so that children share the caller's
//! context and cancellation token.

mod composite;
mod context;
mod error;
mod events;
mod executor;
pub mod handlers;
mod host;
mod result;
mod state;

pub use context::ActionContext;
pub use error::{ActionError, ErrorKind};
pub use events::{ActionEvent, ChannelNotifier, ExecutionNotifier, NoopNotifier};
pub use executor::{ActionExecutor, ActionRegistry, COMPOSITE_TYPES};
pub use handlers::ActionHandler;
pub use host::{
  DialogPresenter, DialogRequest, FixedDialogs, Host, RecordingRouter, RecordingToaster, Router,
  Toast, ToastVariant, Toaster,
};
pub use result::ActionResult;
pub use state::StateStore;
