//! Execution events and notifiers for observability.
//!
//! The executor reports every action's lifecycle here in addition to its
//! tracing output, so hosts can drive progress indicators or audit logs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ErrorKind;

/// Events emitted while executing actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionEvent {
  Started {
    execution_id: String,
    action_id: String,
    action_type: String,
  },

  /// An attempt failed and another one is scheduled after `delay_ms`.
  Retrying {
    execution_id: String,
    action_id: String,
    attempt: u32,
    delay_ms: u64,
    kind: ErrorKind,
  },

  /// The `when` guard evaluated false.
  Skipped {
    execution_id: String,
    action_id: String,
  },

  Completed {
    execution_id: String,
    action_id: String,
    duration_ms: u64,
  },

  Failed {
    execution_id: String,
    action_id: String,
    kind: ErrorKind,
    message: String,
  },
}

/// Receives execution events.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ActionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ActionEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls execution; event volume is a
/// handful per action.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ActionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ActionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ActionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
