//! Polling read cache.
//!
//! Every [`QueryKey`] owns one entry and one poll task. The task fetches
//! immediately, then again one interval after each completed fetch, so a
//! key never has two fetches in flight. [`QueryCache::invalidate`] wakes the
//! matching tasks for an immediate fetch; a wake that lands mid-fetch is
//! queued and runs right after. The entry lives as long as at least one
//! [`QueryHandle`] does.

mod key;

pub use key::QueryKey;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use fms_core::types::Timestamp;
use fms_events::{event_types, EventBus, PortalEvent};
use rand::Rng;
use serde_json::json;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// How a query is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Fetch only while enabled (e.g. once a user id is known).
    pub enabled: bool,
    /// Refresh interval. `None` fetches once and then only on invalidation.
    pub interval: Option<Duration>,
    /// Upper bound of a random delay added to every interval.
    pub jitter: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: None,
            jitter: Duration::ZERO,
        }
    }
}

impl QueryOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Observable state of one cache entry.
pub struct QueryState<T> {
    /// Last successfully fetched value.
    pub data: Option<Arc<T>>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<Arc<AppError>>,
    /// Fetching with no value yet.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub updated_at: Option<Timestamp>,
    /// Completed fetches, successful or not.
    pub fetch_count: u64,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
            fetch_count: self.fetch_count,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_fetching: false,
            updated_at: None,
            fetch_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryCache
// ---------------------------------------------------------------------------

struct Entry {
    handles: usize,
    wake: Arc<Notify>,
    enabled: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
    /// `watch::Sender<QueryState<T>>` for the entry's value type.
    state: Arc<dyn Any + Send + Sync>,
}

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: Arc<EventBus>,
    root: CancellationToken,
}

/// Shared registry of polled queries. Cheap to clone.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                events,
                root: CancellationToken::new(),
            }),
        }
    }

    /// Register or reuse the entry for `key`.
    ///
    /// Reusing an entry never triggers a fetch; the options and fetcher of
    /// the first registration stay in effect. Must be called inside a Tokio
    /// runtime.
    pub fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch: F,
        options: QueryOptions,
    ) -> AppResult<QueryHandle<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(&key) {
            let state = Arc::clone(&entry.state)
                .downcast::<watch::Sender<QueryState<T>>>()
                .map_err(|_| {
                    AppError::Internal(format!("query {key} is registered with another value type"))
                })?;
            entry.handles += 1;
            tracing::trace!(%key, handles = entry.handles, "Reusing cache entry");
            let (wake, enabled) = (Arc::clone(&entry.wake), Arc::clone(&entry.enabled));
            return Ok(QueryHandle::new(self.clone(), key, state, wake, enabled));
        }

        let (state_tx, _) = watch::channel(QueryState {
            is_loading: options.enabled,
            ..QueryState::default()
        });
        let state = Arc::new(state_tx);
        let wake = Arc::new(Notify::new());
        let (enabled_tx, enabled_rx) = watch::channel(options.enabled);
        let enabled = Arc::new(enabled_tx);
        let cancel = self.inner.root.child_token();

        tokio::spawn(
            Poller {
                key: key.clone(),
                fetch,
                state: Arc::clone(&state),
                wake: Arc::clone(&wake),
                enabled: enabled_rx,
                options,
                events: Arc::clone(&self.inner.events),
                cancel: cancel.clone(),
            }
            .run(),
        );

        let erased: Arc<dyn Any + Send + Sync> = state.clone();
        entries.insert(
            key.clone(),
            Entry {
                handles: 1,
                wake: Arc::clone(&wake),
                enabled: Arc::clone(&enabled),
                cancel,
                state: erased,
            },
        );
        tracing::debug!(%key, interval_ms = ?options.interval.map(|i| i.as_millis()), "Query registered");

        Ok(QueryHandle::new(self.clone(), key, state, wake, enabled))
    }

    /// Force an immediate fetch of every enabled entry under `prefix`.
    /// Returns how many entries were woken.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let entries = self.lock();
        let mut woken = 0;
        for (key, entry) in entries.iter().filter(|(k, _)| k.matches_prefix(prefix)) {
            if *entry.enabled.borrow() {
                tracing::debug!(%key, "Invalidating query");
                entry.wake.notify_one();
                woken += 1;
            }
        }
        woken
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop every poll task and forget all entries.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
        let dropped = {
            let mut entries = self.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        tracing::debug!(entries = dropped, "Query cache shut down");
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &QueryKey, wake: &Arc<Notify>) {
        let mut entries = self.lock();
        let last = match entries.get_mut(key) {
            Some(entry) if Arc::ptr_eq(&entry.wake, wake) => {
                entry.handles = entry.handles.saturating_sub(1);
                entry.handles == 0
            }
            _ => return,
        };
        if last {
            if let Some(entry) = entries.remove(key) {
                entry.cancel.cancel();
                tracing::debug!(%key, "Last handle dropped, query stopped");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// QueryHandle
// ---------------------------------------------------------------------------

/// A subscriber's view of one cache entry. Dropping the last handle for a
/// key stops its polling.
pub struct QueryHandle<T> {
    cache: QueryCache,
    key: QueryKey,
    state: Arc<watch::Sender<QueryState<T>>>,
    rx: watch::Receiver<QueryState<T>>,
    wake: Arc<Notify>,
    enabled: Arc<watch::Sender<bool>>,
}

impl<T> QueryHandle<T> {
    fn new(
        cache: QueryCache,
        key: QueryKey,
        state: Arc<watch::Sender<QueryState<T>>>,
        wake: Arc<Notify>,
        enabled: Arc<watch::Sender<bool>>,
    ) -> Self {
        let rx = state.subscribe();
        Self {
            cache,
            key,
            state,
            rx,
            wake,
            enabled,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<Arc<AppError>> {
        self.state.borrow().error.clone()
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> QueryState<T> {
        // The handle owns a sender, so the channel cannot close.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until `ready` holds for the entry's state.
    pub async fn wait_until(
        &mut self,
        ready: impl FnMut(&QueryState<T>) -> bool,
    ) -> QueryState<T> {
        let reached = self.rx.wait_for(ready).await.map(|s| s.clone());
        reached.unwrap_or_else(|_| self.state())
    }

    /// Wait for the next completed fetch, successful or not. Flag-only
    /// changes such as `is_fetching` do not count.
    pub async fn fetched(&mut self) -> QueryState<T> {
        let seen = self.rx.borrow_and_update().fetch_count;
        self.wait_until(|s| s.fetch_count > seen).await
    }

    /// Fetch now and wait for the result. A disabled entry returns its
    /// current state immediately, as does one disabled while waiting.
    pub async fn refetch(&mut self) -> QueryState<T> {
        if !self.is_enabled() {
            return self.state();
        }
        let target = {
            let current = self.state.borrow();
            current.fetch_count + 1 + u64::from(current.is_fetching)
        };
        self.wake.notify_one();

        let mut enabled = self.enabled.subscribe();
        let fetched = tokio::select! {
            reached = self.rx.wait_for(|s| s.fetch_count >= target) => {
                reached.map(|s| s.clone()).ok()
            }
            _ = enabled.wait_for(|on| !*on) => None,
        };
        fetched.unwrap_or_else(|| self.state())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        self.cache.release(&self.key, &self.wake);
    }
}

// ---------------------------------------------------------------------------
// Poll task
// ---------------------------------------------------------------------------

struct Poller<T, F> {
    key: QueryKey,
    fetch: F,
    state: Arc<watch::Sender<QueryState<T>>>,
    wake: Arc<Notify>,
    enabled: watch::Receiver<bool>,
    options: QueryOptions,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

impl<T, F, Fut> Poller<T, F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    async fn run(mut self) {
        loop {
            let enabled = *self.enabled.borrow_and_update();
            if !enabled {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    changed = self.enabled.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            self.state.send_modify(|s| {
                s.is_fetching = true;
                s.is_loading = s.data.is_none();
            });
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = (self.fetch)() => result,
            };
            self.record(result);

            let delay = self
                .options
                .interval
                .map(|interval| interval + jitter(self.options.jitter));
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {
                    tracing::trace!(key = %self.key, "Woken for refetch");
                }
                _ = sleep_opt(delay) => {}
                changed = self.enabled.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(key = %self.key, "Poll task stopped");
    }

    fn record(&self, result: AppResult<T>) {
        match result {
            Ok(value) => {
                tracing::trace!(key = %self.key, "Query refreshed");
                self.state.send_modify(|s| {
                    s.data = Some(Arc::new(value));
                    s.error = None;
                    s.updated_at = Some(Utc::now());
                    s.is_fetching = false;
                    s.is_loading = false;
                    s.fetch_count += 1;
                });
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Query failed, keeping last value");
                self.events.publish(
                    PortalEvent::new(event_types::QUERY_FAILED)
                        .with_source(self.key.to_string())
                        .with_payload(json!({ "error": e.to_string() })),
                );
                self.state.send_modify(|s| {
                    s.error = Some(Arc::new(e));
                    s.is_fetching = false;
                    s.is_loading = false;
                    s.fetch_count += 1;
                });
            }
        }
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

async fn sleep_opt(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
