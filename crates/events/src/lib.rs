//! Portal event bus and toast feed.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PortalEvent`]: the event envelope published by the session context,
//!   the read cache, and the mutation dispatcher.
//! - [`ToastFeed`]: background consumer that turns events into transient
//!   user-facing notices.

pub mod bus;
pub mod toast;

pub use bus::{event_types, EventBus, PortalEvent};
pub use toast::{Toast, ToastFeed, ToastVariant};
