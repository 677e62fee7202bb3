//! Headless view models.
//!
//! Each dashboard mounts its cache queries on construction and drops them
//! with itself; actions go through the mutation dispatcher. Rendering to
//! text lives in [`render`].

pub mod admin;
pub mod auth;
pub mod faculty;
pub mod render;
pub mod router;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fms_remote::{DataService, RemoteError};
use validator::ValidationError;

use crate::cache::{QueryHandle, QueryKey, QueryOptions};
use crate::error::{AppError, AppResult};
use crate::state::AppContext;

/// Register a polled table read for a view.
pub(crate) fn polled_query<T, F, Fut>(
    ctx: &AppContext,
    key: QueryKey,
    interval: Duration,
    fetch: F,
) -> AppResult<QueryHandle<T>>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<dyn DataService>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
{
    let data = Arc::clone(&ctx.data);
    let options = QueryOptions::every(interval).with_jitter(ctx.config.polling.jitter);
    ctx.cache.query(
        key,
        move || {
            let pending = fetch(Arc::clone(&data));
            async move { pending.await.map_err(AppError::from) }
        },
        options,
    )
}

/// Field validator for required text: whitespace-only input counts as empty.
pub(crate) fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Trimmed text, or `None` when blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
