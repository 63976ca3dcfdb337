//! WebSocket transport contract and an in-memory reference transport.
//!
//! The datasource engine does not speak any wire protocol. It relies on a
//! [`WebSocketTransport`] for topic subscriptions, publishing and
//! connection-state notifications, and on the transport's
//! [`ReconnectPolicy`] for behaviour during outages.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::subscription::Subscription;

pub type MessageCallback = Arc<dyn Fn(serde_json::Value) + Send + Sync>;
pub type ConnectionCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
  Connecting,
  Connected,
  Reconnecting { attempt: u32 },
  Disconnected,
  /// Reconnect attempts are exhausted.
  Failed,
}

pub trait WebSocketTransport: Send + Sync {
  fn subscribe(&self, topic: &str, on_message: MessageCallback) -> Subscription;

  fn publish(&self, topic: &str, payload: serde_json::Value);

  fn on_connection_state(&self, callback: ConnectionCallback) -> Subscription;

  fn connection_state(&self) -> ConnectionState;

  /// The most recent message seen on `topic`, if any.
  fn last_message(&self, topic: &str) -> Option<serde_json::Value>;
}

/// Exponential, capped, bounded reconnection schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
  fn default() -> Self {
    Self {
      initial_delay: Duration::from_millis(500),
      max_delay: Duration::from_secs(30),
      max_attempts: 10,
    }
  }
}

impl ReconnectPolicy {
  /// Delay before reconnect attempt `attempt` (1-based), or `None` once the
  /// attempt budget is spent.
  pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
    if attempt == 0 || attempt > self.max_attempts {
      return None;
    }
    let factor = 2u32.saturating_pow(attempt - 1);
    Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
  }
}

struct Inner {
  state: ConnectionState,
  next_id: u64,
  topics: HashMap<String, Vec<(u64, MessageCallback)>>,
  listeners: Vec<(u64, ConnectionCallback)>,
  queue: VecDeque<(String, serde_json::Value)>,
  last: HashMap<String, serde_json::Value>,
}

/// Loopback transport: publishes are delivered to local subscribers of the
/// topic. Publishes made while not connected are queued and flushed on
/// [`InMemoryTransport::connect`].
pub struct InMemoryTransport {
  inner: Arc<Mutex<Inner>>,
  policy: ReconnectPolicy,
}

impl InMemoryTransport {
  pub fn new(policy: ReconnectPolicy) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        state: ConnectionState::Disconnected,
        next_id: 0,
        topics: HashMap::new(),
        listeners: Vec::new(),
        queue: VecDeque::new(),
        last: HashMap::new(),
      })),
      policy,
    }
  }

  pub fn policy(&self) -> ReconnectPolicy {
    self.policy
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn set_state(&self, state: ConnectionState) {
    let listeners: Vec<ConnectionCallback> = {
      let mut inner = self.lock();
      inner.state = state;
      inner.listeners.iter().map(|(_, cb)| cb.clone()).collect()
    };
    for listener in listeners {
      listener(state);
    }
  }

  /// Transition to connected and flush queued publishes.
  pub fn connect(&self) {
    self.set_state(ConnectionState::Connected);
    info!(queued = self.queued(), "websocket connected");

    let queued: Vec<(String, serde_json::Value)> = self.lock().queue.drain(..).collect();
    for (topic, payload) in queued {
      self.deliver(&topic, payload);
    }
  }

  /// The connection dropped; start the reconnect schedule.
  pub fn connection_lost(&self) {
    warn!("websocket connection lost");
    self.set_state(ConnectionState::Reconnecting { attempt: 1 });
  }

  /// A reconnect attempt failed. Returns the delay before the next one, or
  /// `None` (and state `Failed`) once the policy gives up.
  pub fn reconnect_failed(&self) -> Option<Duration> {
    let attempt = match self.connection_state() {
      ConnectionState::Reconnecting { attempt } => attempt + 1,
      _ => 1,
    };

    match self.policy.delay_for(attempt) {
      Some(delay) => {
        debug!(attempt, delay_ms = delay.as_millis() as u64, "websocket reconnect scheduled");
        self.set_state(ConnectionState::Reconnecting { attempt });
        Some(delay)
      }
      None => {
        warn!(attempts = self.policy.max_attempts, "websocket reconnect attempts exhausted");
        self.set_state(ConnectionState::Failed);
        None
      }
    }
  }

  pub fn disconnect(&self) {
    self.set_state(ConnectionState::Disconnected);
  }

  /// Deliver a message to every subscriber of `topic`, as if pushed by the
  /// server.
  pub fn deliver(&self, topic: &str, payload: serde_json::Value) {
    let callbacks: Vec<MessageCallback> = {
      let mut inner = self.lock();
      inner.last.insert(topic.to_string(), payload.clone());
      inner
        .topics
        .get(topic)
        .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
        .unwrap_or_default()
    };
    for callback in callbacks {
      callback(payload.clone());
    }
  }

  pub fn queued(&self) -> usize {
    self.lock().queue.len()
  }
}

impl Default for InMemoryTransport {
  fn default() -> Self {
    Self::new(ReconnectPolicy::default())
  }
}

fn weak_inner(inner: &Arc<Mutex<Inner>>) -> Weak<Mutex<Inner>> {
  Arc::downgrade(inner)
}

impl WebSocketTransport for InMemoryTransport {
  fn subscribe(&self, topic: &str, on_message: MessageCallback) -> Subscription {
    let id = {
      let mut inner = self.lock();
      let id = inner.next_id;
      inner.next_id += 1;
      inner
        .topics
        .entry(topic.to_string())
        .or_default()
        .push((id, on_message));
      id
    };

    let weak = weak_inner(&self.inner);
    let topic = topic.to_string();
    Subscription::new(move || {
      if let Some(inner) = weak.upgrade() {
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subs) = inner.topics.get_mut(&topic) {
          subs.retain(|(sub_id, _)| *sub_id != id);
        }
      }
    })
  }

  fn publish(&self, topic: &str, payload: serde_json::Value) {
    if self.connection_state() == ConnectionState::Connected {
      self.deliver(topic, payload);
    } else {
      debug!(topic, "websocket not connected, queueing publish");
      self.lock().queue.push_back((topic.to_string(), payload));
    }
  }

  fn on_connection_state(&self, callback: ConnectionCallback) -> Subscription {
    let id = {
      let mut inner = self.lock();
      let id = inner.next_id;
      inner.next_id += 1;
      inner.listeners.push((id, callback));
      id
    };

    let weak = weak_inner(&self.inner);
    Subscription::new(move || {
      if let Some(inner) = weak.upgrade() {
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
      }
    })
  }

  fn connection_state(&self) -> ConnectionState {
    self.lock().state
  }

  fn last_message(&self, topic: &str) -> Option<serde_json::Value> {
    self.lock().last.get(topic).cloned()
  }
}
