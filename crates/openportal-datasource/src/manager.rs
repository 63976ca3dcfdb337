//! Datasource manager: fetch policies, coalescing, polling and live updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use openportal_config::{DatasourceConfig, DatasourceSource, EngineConfig, FetchPolicy};
use openportal_template::{lookup_path, resolve, resolve_map};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::DatasourceCache;
use crate::error::DatasourceError;
use crate::handlers::{DatasourceHandler, DatasourceRegistry, WatchCallback, WatchEvent};
use crate::key::cache_key;
use crate::state::{DatasourceState, DatasourceStatus, StateError};
use crate::subscription::Subscription;
use crate::websocket::ConnectionState;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, DatasourceError>>>;

/// Receives every state transition of a datasource.
pub type StateCallback = Arc<dyn Fn(&DatasourceState) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// How a starting fetch is reflected in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  /// `status` becomes `loading`.
  Foreground,
  /// Revalidation behind already-served data; `status` is left alone.
  Background,
}

#[derive(Default)]
struct Subscribers {
  next_id: u64,
  callbacks: BTreeMap<u64, StateCallback>,
}

/// One attached datasource.
struct Instance {
  id: String,
  policy: FetchPolicy,
  source: DatasourceSource,
  transform: Option<String>,
  params: Value,
  key: String,
  ttl: Duration,
  handler: Arc<dyn DatasourceHandler>,
  cache: Arc<DatasourceCache>,
  state: Mutex<DatasourceState>,
  subscribers: Mutex<Subscribers>,
  // Lock order: inflight before state
  inflight: Mutex<Option<SharedFetch>>,
  watch: Mutex<Option<Subscription>>,
  cancel: CancellationToken,
}

impl Instance {
  fn snapshot(&self) -> DatasourceState {
    lock(&self.state).clone()
  }

  fn notify(&self, state: &DatasourceState) {
    let callbacks: Vec<StateCallback> = lock(&self.subscribers).callbacks.values().cloned().collect();
    for callback in callbacks {
      callback(state);
    }
  }

  /// Apply `f` to the state and publish the result.
  fn update(&self, f: impl FnOnce(&mut DatasourceState)) -> DatasourceState {
    let snapshot = {
      let mut state = lock(&self.state);
      f(&mut state);
      state.clone()
    };
    self.notify(&snapshot);
    snapshot
  }

  fn apply_transform(&self, raw: Value) -> Result<Value, DatasourceError> {
    match self.transform.as_deref().filter(|p| !p.is_empty()) {
      None => Ok(raw),
      Some(path) => lookup_path(&raw, path)
        .cloned()
        .ok_or_else(|| DatasourceError::Transform {
          path: path.to_string(),
        }),
    }
  }

  /// Start a fetch, or join the one already in flight. `on_start` is
  /// applied to the state either way.
  fn start_fetch(
    self: &Arc<Self>,
    write_cache: bool,
    mode: Mode,
    on_start: impl FnOnce(&mut DatasourceState),
  ) -> SharedFetch {
    let (shared, snapshot, go) = {
      let mut slot = lock(&self.inflight);
      if let Some(existing) = slot.as_ref() {
        debug!(datasource_id = %self.id, "datasource_fetch_coalesced");
        let existing = existing.clone();
        let changed = {
          let mut state = lock(&self.state);
          let before = state.clone();
          on_start(&mut state);
          state.loading = true;
          (*state != before).then(|| state.clone())
        };
        drop(slot);
        if let Some(snapshot) = changed {
          self.notify(&snapshot);
        }
        return existing;
      }

      let snapshot = {
        let mut state = lock(&self.state);
        on_start(&mut state);
        state.loading = true;
        if mode == Mode::Foreground {
          state.status = DatasourceStatus::Loading;
        }
        state.clone()
      };

      // The task waits until the loading transition has been published so
      // subscribers always see it before the outcome.
      let (go, wait) = oneshot::channel::<()>();
      let this = Arc::clone(self);
      let task = tokio::spawn(async move {
        let _ = wait.await;
        this.run_fetch(write_cache).await
      });

      let id = self.id.clone();
      let shared = async move {
        task.await.unwrap_or_else(|e| {
          warn!(datasource_id = %id, error = %e, "datasource fetch task failed");
          Err(DatasourceError::Cancelled)
        })
      }
      .boxed()
      .shared();

      *slot = Some(shared.clone());
      (shared, snapshot, go)
    };

    self.notify(&snapshot);
    let _ = go.send(());
    shared
  }

  async fn run_fetch(self: Arc<Self>, write_cache: bool) -> Result<Value, DatasourceError> {
    info!(datasource_id = %self.id, source = self.source.type_name(), "datasource_fetch_started");
    let started = Instant::now();

    let outcome = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(DatasourceError::Cancelled),
      outcome = self.handler.fetch(&self.source, &self.params, self.cancel.child_token()) => outcome,
    };
    let outcome = outcome.and_then(|raw| self.apply_transform(raw));

    if let (true, Ok(data)) = (write_cache, &outcome) {
      self.cache.set(&self.key, data.clone(), self.ttl);
    }

    let snapshot = {
      let mut slot = lock(&self.inflight);
      *slot = None;
      let mut state = lock(&self.state);
      state.loading = false;
      match &outcome {
        Ok(data) => {
          state.status = DatasourceStatus::Ready;
          state.data = Some(data.clone());
          state.error = None;
          state.is_stale = false;
          state.last_fetched_at = Some(Utc::now());
        }
        Err(DatasourceError::Cancelled) => {
          if state.status == DatasourceStatus::Loading {
            state.status = if state.data.is_some() {
              DatasourceStatus::Ready
            } else {
              DatasourceStatus::Idle
            };
          }
        }
        // Prior data stays in place
        Err(error) => {
          state.status = DatasourceStatus::Error;
          state.error = Some(StateError::from(error));
        }
      }
      state.clone()
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &outcome {
      Ok(_) => info!(datasource_id = %self.id, duration_ms, "datasource_fetch_completed"),
      Err(error) => warn!(datasource_id = %self.id, duration_ms, error = %error, "datasource_fetch_failed"),
    }

    if !self.cancel.is_cancelled() {
      self.notify(&snapshot);
    }
    outcome
  }

  fn on_watch_event(&self, event: WatchEvent) {
    match event {
      WatchEvent::Message(raw) => match self.apply_transform(raw) {
        Ok(data) => {
          self.update(|state| {
            state.status = DatasourceStatus::Ready;
            state.data = Some(data);
            state.error = None;
            state.is_stale = false;
            state.loading = false;
            state.last_fetched_at = Some(Utc::now());
          });
        }
        Err(error) => {
          self.update(|state| {
            state.status = DatasourceStatus::Error;
            state.error = Some(StateError::from(&error));
          });
        }
      },
      WatchEvent::Connection(connection) => {
        debug!(datasource_id = %self.id, ?connection, "datasource connection changed");
        let fetching = lock(&self.inflight).is_some();
        self.update(|state| match connection {
          ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => {
            state.loading = true;
          }
          ConnectionState::Connected | ConnectionState::Disconnected => {
            state.loading = fetching;
          }
          ConnectionState::Failed => {
            let topic = match &self.source {
              DatasourceSource::WebSocket(config) => config.topic.clone(),
              _ => self.id.clone(),
            };
            state.loading = fetching;
            state.status = DatasourceStatus::Error;
            state.error = Some(StateError::from(&DatasourceError::Disconnected { topic }));
          }
        });
      }
    }
  }

  fn teardown(&self) {
    self.cancel.cancel();
    lock(&self.watch).take();
    lock(&self.subscribers).callbacks.clear();
    lock(&self.inflight).take();
  }
}

impl Drop for Instance {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

/// Handle to an attached datasource. Clones share the same instance.
#[derive(Clone)]
pub struct DatasourceHandle {
  inner: Arc<Instance>,
}

impl DatasourceHandle {
  pub fn id(&self) -> &str {
    &self.inner.id
  }

  pub fn policy(&self) -> FetchPolicy {
    self.inner.policy
  }

  /// The cache key of this instance's reads.
  pub fn cache_key(&self) -> &str {
    &self.inner.key
  }

  /// Current state.
  pub fn state(&self) -> DatasourceState {
    self.inner.snapshot()
  }

  /// Read according to the configured fetch policy.
  ///
  /// Under `cache-and-network` with a cached value this returns at once,
  /// with `loading` set while revalidation runs in the background.
  #[instrument(name = "datasource_load", skip(self), fields(datasource_id = %self.inner.id, policy = ?self.inner.policy))]
  pub async fn load(&self) -> DatasourceState {
    let inner = &self.inner;
    match inner.policy {
      FetchPolicy::CacheFirst => {
        if let Some(hit) = inner.cache.get(&inner.key).filter(|hit| !hit.stale) {
          debug!("datasource_cache_hit");
          return inner.update(|state| {
            state.status = DatasourceStatus::Ready;
            state.data = Some(hit.value);
            state.error = None;
            state.is_stale = false;
          });
        }
        self.fetch(true, Mode::Foreground).await
      }
      FetchPolicy::CacheAndNetwork => match inner.cache.get(&inner.key) {
        Some(hit) => {
          debug!(stale = hit.stale, "datasource_cache_hit");
          // Runs on its own task; dropping the handle to it does not cancel it
          let _revalidation = inner.start_fetch(true, Mode::Background, |state| {
            state.status = DatasourceStatus::Ready;
            state.data = Some(hit.value);
            state.error = None;
            state.is_stale = hit.stale;
          });
          inner.snapshot()
        }
        None => self.fetch(true, Mode::Foreground).await,
      },
      FetchPolicy::NetworkOnly => self.fetch(true, Mode::Foreground).await,
      FetchPolicy::NoCache => self.fetch(false, Mode::Foreground).await,
    }
  }

  /// Force a network read regardless of policy. The result is cached
  /// unless the policy is `no-cache`.
  pub async fn refetch(&self) -> DatasourceState {
    self
      .fetch(self.inner.policy.writes_cache(), Mode::Foreground)
      .await
  }

  async fn fetch(&self, write_cache: bool, mode: Mode) -> DatasourceState {
    let _ = self.inner.start_fetch(write_cache, mode, |_| {}).await;
    self.inner.snapshot()
  }

  /// Wait for the in-flight fetch, if any, and return the resulting state.
  pub async fn settled(&self) -> DatasourceState {
    let inflight = lock(&self.inner.inflight).clone();
    if let Some(fetch) = inflight {
      let _ = fetch.await;
    }
    self.inner.snapshot()
  }

  /// Mark this instance's cache entry stale. The next `cache-first` read
  /// fetches; `cache-and-network` still serves it while revalidating.
  pub fn invalidate(&self) {
    self.inner.cache.mark_stale(&self.inner.key);
    self.inner.update(|state| {
      if state.data.is_some() {
        state.is_stale = true;
      }
    });
  }

  /// Register `callback` for every state transition.
  pub fn subscribe(&self, callback: impl Fn(&DatasourceState) + Send + Sync + 'static) -> Subscription {
    let id = {
      let mut subscribers = lock(&self.inner.subscribers);
      let id = subscribers.next_id;
      subscribers.next_id += 1;
      subscribers.callbacks.insert(id, Arc::new(callback));
      id
    };

    let weak: Weak<Instance> = Arc::downgrade(&self.inner);
    Subscription::new(move || {
      if let Some(inner) = weak.upgrade() {
        lock(&inner.subscribers).callbacks.remove(&id);
      }
    })
  }

  /// Stop polling and live updates, drop subscribers and abandon any
  /// in-flight fetch.
  pub fn teardown(&self) {
    debug!(datasource_id = %self.inner.id, "datasource_teardown");
    self.inner.teardown();
  }

  pub fn is_torn_down(&self) -> bool {
    self.inner.cancel.is_cancelled()
  }
}

fn spawn_polling(inner: &Arc<Instance>, period: Duration) {
  let weak = Arc::downgrade(inner);
  let cancel = inner.cancel.clone();
  let id = inner.id.clone();

  tokio::spawn(async move {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let Some(instance) = weak.upgrade() else { break };
          let fetch = instance.start_fetch(instance.policy.writes_cache(), Mode::Background, |_| {});
          drop(instance);
          let _ = fetch.await;
        }
      }
    }
    debug!(datasource_id = %id, "datasource polling stopped");
  });
}

/// Attaches datasources and owns the cache they share.
pub struct DatasourceManager {
  registry: Arc<DatasourceRegistry>,
  cache: Arc<DatasourceCache>,
  default_ttl: Duration,
  handles: Mutex<HashMap<String, DatasourceHandle>>,
}

impl DatasourceManager {
  pub fn new(registry: Arc<DatasourceRegistry>, config: &EngineConfig) -> Self {
    Self::with_cache(
      registry,
      Arc::new(DatasourceCache::new(config.cache_max_entries)),
      config.default_cache_ttl(),
    )
  }

  pub fn with_cache(
    registry: Arc<DatasourceRegistry>,
    cache: Arc<DatasourceCache>,
    default_ttl: Duration,
  ) -> Self {
    Self {
      registry,
      cache,
      default_ttl,
      handles: Mutex::new(HashMap::new()),
    }
  }

  pub fn cache(&self) -> &Arc<DatasourceCache> {
    &self.cache
  }

  /// Attach a datasource, resolving its params and source config against
  /// `context`. Attaching an id again replaces (and tears down) the
  /// previous instance.
  ///
  /// Must be called within a tokio runtime.
  #[instrument(name = "datasource_attach", skip(self, config, context), fields(datasource_id = %config.id))]
  pub fn attach(
    &self,
    config: DatasourceConfig,
    context: &Value,
  ) -> Result<DatasourceHandle, DatasourceError> {
    let type_name = config.source.type_name();
    let handler = self
      .registry
      .get(type_name)
      .map_err(|_| DatasourceError::UnknownType {
        type_name: type_name.to_string(),
      })?;

    let params = Value::Object(resolve_map(&config.params, context));
    let source = resolve_source(&config.source, context)?;
    let key = cache_key(&config.id, &params);

    let inner = Arc::new(Instance {
      id: config.id.clone(),
      policy: config.fetch_policy,
      source,
      transform: config.transform.clone(),
      params,
      key,
      ttl: config.cache_ttl().unwrap_or(self.default_ttl),
      handler,
      cache: self.cache.clone(),
      state: Mutex::new(DatasourceState::default()),
      subscribers: Mutex::new(Subscribers::default()),
      inflight: Mutex::new(None),
      watch: Mutex::new(None),
      cancel: CancellationToken::new(),
    });

    let weak = Arc::downgrade(&inner);
    let on_event: WatchCallback = Arc::new(move |event: WatchEvent| {
      if let Some(instance) = weak.upgrade() {
        instance.on_watch_event(event);
      }
    });
    if let Some(subscription) = inner.handler.watch(&inner.source, on_event) {
      *lock(&inner.watch) = Some(subscription);
    }

    if let Some(period) = config.refetch_interval() {
      spawn_polling(&inner, period);
    }

    let handle = DatasourceHandle { inner };
    if let Some(previous) = lock(&self.handles).insert(config.id.clone(), handle.clone()) {
      previous.teardown();
    }

    info!(key = %handle.cache_key(), "datasource_attached");
    Ok(handle)
  }

  pub fn get(&self, id: &str) -> Option<DatasourceHandle> {
    lock(&self.handles).get(id).cloned()
  }

  /// Tear down and forget a datasource. Returns whether it was attached.
  pub fn detach(&self, id: &str) -> bool {
    match lock(&self.handles).remove(id) {
      Some(handle) => {
        handle.teardown();
        true
      }
      None => false,
    }
  }

  /// Drop every cached value and flag every attached instance stale.
  pub fn invalidate_all(&self) {
    self.cache.clear();
    let handles: Vec<DatasourceHandle> = lock(&self.handles).values().cloned().collect();
    for handle in handles {
      handle.invalidate();
    }
  }

  pub fn teardown_all(&self) {
    let handles: Vec<DatasourceHandle> = lock(&self.handles).drain().map(|(_, h)| h).collect();
    for handle in handles {
      handle.teardown();
    }
  }
}

fn resolve_source(source: &DatasourceSource, context: &Value) -> Result<DatasourceSource, DatasourceError> {
  let invalid = |e: serde_json::Error| DatasourceError::InvalidConfig {
    message: e.to_string(),
  };
  let raw = serde_json::to_value(source).map_err(invalid)?;
  serde_json::from_value(resolve(&raw, context)).map_err(invalid)
}
