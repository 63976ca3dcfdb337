//! Host capabilities injected into the action context.
//!
//! The engine never renders UI itself. Navigation, toasts and confirmation
//! dialogs are delegated to these traits; the recording implementations at
//! the bottom of this module back tests and headless runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Programmatic navigation.
pub trait Router: Send + Sync {
  fn push(&self, path: &str);
  fn replace(&self, path: &str);
  fn back(&self);
  /// Open a URL outside the application (new tab, mail client, dialer).
  fn open_external(&self, url: &str);
  fn history_len(&self) -> usize;
  fn current_path(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
  #[default]
  Info,
  Success,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
  pub message: String,
  #[serde(default)]
  pub variant: ToastVariant,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<u64>,
}

pub trait Toaster: Send + Sync {
  fn show(&self, toast: Toast);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogRequest {
  #[serde(default)]
  pub title: String,
  pub message: String,
  #[serde(default)]
  pub variant: ToastVariant,
}

/// Presents a confirmation dialog and resolves with the user's answer.
#[async_trait]
pub trait DialogPresenter: Send + Sync {
  async fn confirm(&self, request: DialogRequest) -> bool;
}

/// The set of host capabilities handed to every action.
#[derive(Clone)]
pub struct Host {
  pub router: Arc<dyn Router>,
  pub toaster: Arc<dyn Toaster>,
  pub dialogs: Arc<dyn DialogPresenter>,
}

impl Host {
  pub fn new(
    router: Arc<dyn Router>,
    toaster: Arc<dyn Toaster>,
    dialogs: Arc<dyn DialogPresenter>,
  ) -> Self {
    Self {
      router,
      toaster,
      dialogs,
    }
  }

  /// A host that records everything and declines every dialog.
  pub fn recording() -> Self {
    Self::new(
      Arc::new(RecordingRouter::new("/")),
      Arc::new(RecordingToaster::default()),
      Arc::new(FixedDialogs::new(false)),
    )
  }
}

#[derive(Debug, Default)]
struct RouterLog {
  history: Vec<String>,
  external: Vec<String>,
}

/// In-memory router keeping a history stack.
#[derive(Debug, Default)]
pub struct RecordingRouter {
  log: Mutex<RouterLog>,
}

impl RecordingRouter {
  pub fn new(initial_path: impl Into<String>) -> Self {
    Self {
      log: Mutex::new(RouterLog {
        history: vec![initial_path.into()],
        external: Vec::new(),
      }),
    }
  }

  pub fn history(&self) -> Vec<String> {
    self.log.lock().unwrap_or_else(|e| e.into_inner()).history.clone()
  }

  pub fn external(&self) -> Vec<String> {
    self
      .log
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .external
      .clone()
  }
}

impl Router for RecordingRouter {
  fn push(&self, path: &str) {
    let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
    log.history.push(path.to_string());
  }

  fn replace(&self, path: &str) {
    let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
    match log.history.last_mut() {
      Some(current) => *current = path.to_string(),
      None => log.history.push(path.to_string()),
    }
  }

  fn back(&self) {
    let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
    if log.history.len() > 1 {
      log.history.pop();
    }
  }

  fn open_external(&self, url: &str) {
    let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
    log.external.push(url.to_string());
  }

  fn history_len(&self) -> usize {
    self.log.lock().unwrap_or_else(|e| e.into_inner()).history.len()
  }

  fn current_path(&self) -> String {
    self
      .log
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .history
      .last()
      .cloned()
      .unwrap_or_default()
  }
}

/// Collects shown toasts.
#[derive(Debug, Default)]
pub struct RecordingToaster {
  toasts: Mutex<Vec<Toast>>,
}

impl RecordingToaster {
  pub fn toasts(&self) -> Vec<Toast> {
    self.toasts.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

impl Toaster for RecordingToaster {
  fn show(&self, toast: Toast) {
    self
      .toasts
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(toast);
  }
}

/// Answers every dialog with the same value and records what was asked.
#[derive(Debug)]
pub struct FixedDialogs {
  answer: bool,
  shown: Mutex<Vec<DialogRequest>>,
}

impl FixedDialogs {
  pub fn new(answer: bool) -> Self {
    Self {
      answer,
      shown: Mutex::new(Vec::new()),
    }
  }

  pub fn shown(&self) -> Vec<DialogRequest> {
    self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

#[async_trait]
impl DialogPresenter for FixedDialogs {
  async fn confirm(&self, request: DialogRequest) -> bool {
    self
      .shown
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(request);
    self.answer
  }
}
