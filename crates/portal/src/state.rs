//! Application context passed to every view.
//!
//! Replaces global session state: [`AppContext::init`] wires the backend,
//! event bus, session, cache, and dispatcher together once at start-up, and
//! [`AppContext::teardown`] stops every background task on shutdown.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fms_events::{EventBus, ToastFeed};
use fms_remote::{AuthService, DataService, FileStorage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::QueryCache;
use crate::config::PortalConfig;
use crate::mutation::MutationDispatcher;
use crate::session::SessionContext;
use crate::upload::DocumentUploader;

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The three remote contracts the portal depends on.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthService>,
    pub data: Arc<dyn DataService>,
    pub storage: Arc<dyn FileStorage>,
}

impl Backend {
    /// Use one client for auth, data, and storage.
    pub fn shared<B>(client: Arc<B>) -> Self
    where
        B: AuthService + DataService + FileStorage + 'static,
    {
        Self {
            auth: client.clone(),
            data: client.clone(),
            storage: client,
        }
    }
}

pub struct AppContext {
    pub config: PortalConfig,
    pub auth: Arc<dyn AuthService>,
    pub data: Arc<dyn DataService>,
    pub events: Arc<EventBus>,
    pub session: Arc<SessionContext>,
    pub cache: QueryCache,
    pub dispatcher: MutationDispatcher,
    pub uploader: Arc<DocumentUploader>,
    pub toasts: Arc<ToastFeed>,
    cancel: CancellationToken,
    toast_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    /// Wire everything up. Must be called inside a Tokio runtime.
    pub fn init(config: PortalConfig, backend: Backend) -> Self {
        let events = Arc::new(EventBus::default());
        let cancel = CancellationToken::new();

        let toasts = Arc::new(ToastFeed::default());
        let toast_task = {
            let toasts = Arc::clone(&toasts);
            let receiver = events.subscribe();
            let cancel = cancel.clone();
            tokio::spawn(async move { toasts.run(receiver, cancel).await })
        };

        let session = SessionContext::init(Arc::clone(&backend.auth), Arc::clone(&events));
        let cache = QueryCache::new(Arc::clone(&events));
        let dispatcher = MutationDispatcher::new(cache.clone(), Arc::clone(&events));
        let uploader = Arc::new(DocumentUploader::new(
            backend.storage,
            Arc::clone(&events),
            config.document_bucket.clone(),
        ));

        tracing::info!(
            remote_url = %config.remote_url,
            structured_activities = config.structured_activities,
            "Portal context initialised"
        );

        Self {
            config,
            auth: backend.auth,
            data: backend.data,
            events,
            session,
            cache,
            dispatcher,
            uploader,
            toasts,
            cancel,
            toast_task: Mutex::new(Some(toast_task)),
        }
    }

    /// Stop polling, unsubscribe from the auth feed, and stop the toast feed.
    pub async fn teardown(&self) {
        self.cache.shutdown();
        self.session.teardown().await;

        self.cancel.cancel();
        let handle = self
            .toast_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, handle).await;
        }
        tracing::info!("Portal context torn down");
    }
}
