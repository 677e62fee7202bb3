//! Write path: run a remote write once, then refresh the reads it affects.
//!
//! A [`Mutation`] binds one write operation to the cache keys it
//! invalidates and the notice shown on success. There are no retries and no
//! optimistic patching of cached values; cached reads change only through a
//! refetch.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fms_core::types::Id;
use fms_events::{event_types, EventBus, PortalEvent};
use futures::future::BoxFuture;
use serde_json::json;

use crate::cache::{QueryCache, QueryKey};
use crate::error::AppResult;

type WriteOp<A, T> = Box<dyn Fn(A) -> BoxFuture<'static, AppResult<T>> + Send + Sync>;

/// Builds [`Mutation`]s wired to the shared cache and event bus.
#[derive(Clone)]
pub struct MutationDispatcher {
    cache: QueryCache,
    events: Arc<EventBus>,
}

impl MutationDispatcher {
    pub fn new(cache: QueryCache, events: Arc<EventBus>) -> Self {
        Self { cache, events }
    }

    pub fn mutation<A, T, F, Fut>(&self, name: impl Into<String>, op: F) -> Mutation<A, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        Mutation {
            name: name.into(),
            op: Box::new(move |args| -> BoxFuture<'static, AppResult<T>> { Box::pin(op(args)) }),
            invalidates: Vec::new(),
            success_message: None,
            actor: None,
            pending: AtomicUsize::new(0),
            cache: self.cache.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

pub struct Mutation<A, T> {
    name: String,
    op: WriteOp<A, T>,
    invalidates: Vec<QueryKey>,
    success_message: Option<String>,
    actor: Option<Id>,
    pending: AtomicUsize,
    cache: QueryCache,
    events: Arc<EventBus>,
}

impl<A, T> Mutation<A, T> {
    /// Refetch every entry under `key` after a successful write.
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Attribute published events to `user_id`.
    pub fn acting_as(mut self, user_id: Option<Id>) -> Self {
        self.actor = user_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Run the write exactly once.
    pub async fn mutate(&self, args: A) -> AppResult<T> {
        self.mutate_then(args, |_| {}).await
    }

    /// Run the write and, on success, `on_success` after the cache has been
    /// invalidated.
    pub async fn mutate_then(&self, args: A, on_success: impl FnOnce(&T)) -> AppResult<T> {
        let result = {
            let _pending = PendingGuard::enter(&self.pending);
            (self.op)(args).await
        };

        match result {
            Ok(value) => {
                let refreshed: usize = self
                    .invalidates
                    .iter()
                    .map(|key| self.cache.invalidate(key))
                    .sum();
                tracing::info!(mutation = %self.name, refreshed, "Mutation succeeded");
                let message = self
                    .success_message
                    .clone()
                    .unwrap_or_else(|| "Saved successfully".to_string());
                self.publish(
                    PortalEvent::new(event_types::MUTATION_SUCCEEDED)
                        .with_payload(json!({ "message": message })),
                );
                on_success(&value);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(mutation = %self.name, error = %e, "Mutation failed");
                self.publish(
                    PortalEvent::new(event_types::MUTATION_FAILED)
                        .with_payload(json!({ "error": e.user_message() })),
                );
                Err(e)
            }
        }
    }

    // ---- private helpers ----

    fn publish(&self, event: PortalEvent) {
        let event = event.with_source(self.name.clone());
        let event = match self.actor {
            Some(id) => event.with_actor(id),
            None => event,
        };
        self.events.publish(event);
    }
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
