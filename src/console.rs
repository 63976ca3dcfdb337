//! Host capabilities for a terminal: navigation and toasts are written to
//! stderr, dialogs get a fixed answer.

use async_trait::async_trait;
use openportal_action::{DialogPresenter, DialogRequest, RecordingRouter, Router, Toast, Toaster};

pub struct ConsoleRouter {
  history: RecordingRouter,
}

impl ConsoleRouter {
  pub fn new() -> Self {
    Self {
      history: RecordingRouter::new("/"),
    }
  }
}

impl Router for ConsoleRouter {
  fn push(&self, path: &str) {
    eprintln!("navigate: push {path}");
    self.history.push(path);
  }

  fn replace(&self, path: &str) {
    eprintln!("navigate: replace {path}");
    self.history.replace(path);
  }

  fn back(&self) {
    eprintln!("navigate: back");
    self.history.back();
  }

  fn open_external(&self, url: &str) {
    eprintln!("navigate: open {url}");
    self.history.open_external(url);
  }

  fn history_len(&self) -> usize {
    self.history.history_len()
  }

  fn current_path(&self) -> String {
    self.history.current_path()
  }
}

pub struct ConsoleToaster;

impl Toaster for ConsoleToaster {
  fn show(&self, toast: Toast) {
    let variant = serde_json::to_value(toast.variant)
      .ok()
      .and_then(|v| v.as_str().map(str::to_string))
      .unwrap_or_default();
    eprintln!("toast [{variant}]: {}", toast.message);
  }
}

/// Answers every dialog with `answer` (`--yes` confirms).
pub struct ConsoleDialogs {
  pub answer: bool,
}

#[async_trait]
impl DialogPresenter for ConsoleDialogs {
  async fn confirm(&self, request: DialogRequest) -> bool {
    let answer = if self.answer { "yes" } else { "no" };
    eprintln!("dialog: {} - {} => {answer}", request.title, request.message);
    self.answer
  }
}
