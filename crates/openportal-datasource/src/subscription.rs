/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
  pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
    Self {
      cancel: Some(Box::new(cancel)),
    }
  }

  /// A subscription with nothing to undo.
  pub fn empty() -> Self {
    Self { cancel: None }
  }

  pub fn unsubscribe(mut self) {
    self.run();
  }

  fn run(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.run();
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.cancel.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn test_runs_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let subscription = Subscription::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    subscription.unsubscribe();
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_drop_unsubscribes() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    {
      let _subscription = Subscription::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      });
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
