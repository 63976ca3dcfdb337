//! Action runner with channel-based triggering.
//!
//! The `ActionRunner` owns an mpsc channel of action events and executes
//! each one against a shared `PageSession`.

use std::sync::Arc;

use openportal_action::ActionResult;
use openportal_config::ActionConfig;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::RunnerError;
use crate::session::PageSession;

/// The result of one event handled by the runner.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
  pub action_id: String,
  pub result: ActionResult,
}

/// Executes actions in response to events sent through its channel.
///
/// Every event runs in its own task, so a slow action never holds up an
/// unrelated one.
///
/// # Usage
///
/// ```ignore
/// let runner = ActionRunner::new(session);
///
/// // Hand the sender to whatever fires widget events
/// let sender = runner.sender();
///
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await;
/// ```
pub struct ActionRunner {
  sender: mpsc::Sender<ActionConfig>,
  receiver: mpsc::Receiver<ActionConfig>,
  session: Arc<PageSession>,
  outcomes: Option<mpsc::UnboundedSender<ActionOutcome>>,
}

impl ActionRunner {
  pub fn new(session: Arc<PageSession>) -> Self {
    Self::with_buffer_size(session, 100)
  }

  pub fn with_buffer_size(session: Arc<PageSession>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      session,
      outcomes: None,
    }
  }

  /// Report every finished execution to `sender`.
  pub fn with_outcomes(mut self, sender: mpsc::UnboundedSender<ActionOutcome>) -> Self {
    self.outcomes = Some(sender);
    self
  }

  pub fn sender(&self) -> mpsc::Sender<ActionConfig> {
    self.sender.clone()
  }

  /// Queue an action for execution.
  pub async fn run(&self, action: ActionConfig) -> Result<(), RunnerError> {
    self
      .sender
      .send(action)
      .await
      .map_err(|_| RunnerError::ChannelClosed)
  }

  /// Run the event loop until `cancel` fires or every sender is dropped.
  ///
  /// Cancellation also cancels in-flight executions. Either way the loop
  /// waits for spawned executions before returning.
  #[instrument(name = "action_runner", skip_all)]
  pub async fn start(self, cancel: CancellationToken) {
    let Self {
      sender,
      mut receiver,
      session,
      outcomes,
    } = self;
    // Only external senders keep the channel open
    drop(sender);

    info!("action_runner_started");
    let mut executions = JoinSet::new();

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("action_runner_cancelled");
          break;
        }
        action = receiver.recv() => {
          let Some(action) = action else {
            info!("action_runner_channel_closed");
            break;
          };

          let session = session.clone();
          let outcomes = outcomes.clone();
          let exec_cancel = cancel.child_token();
          executions.spawn(async move {
            let result = session.trigger_with(&action, exec_cancel).await;
            if result.success || result.skipped {
              info!(action_id = %action.id, duration_ms = result.duration_ms, "runner_action_finished");
            } else if result.is_cancelled() {
              info!(action_id = %action.id, "runner_action_cancelled");
            } else {
              warn!(action_id = %action.id, "runner_action_failed");
            }
            if let Some(outcomes) = outcomes {
              let _ = outcomes.send(ActionOutcome {
                action_id: action.id,
                result,
              });
            }
          });
        }
      }
    }

    while let Some(joined) = executions.join_next().await {
      if let Err(e) = joined {
        error!(error = %e, "runner execution task failed");
      }
    }
    info!("action_runner_stopped");
  }
}
