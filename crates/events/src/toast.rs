//! Transient user-facing notices.
//!
//! [`ToastFeed`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! keeps the most recent [`Toast`]s for whatever front end is attached. Read
//! failures produce no toast; they are logged where they happen.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{event_types, PortalEvent};

/// How many toasts are retained by default.
pub const DEFAULT_TOAST_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
    pub timestamp: DateTime<Utc>,
}

impl Toast {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
            timestamp: Utc::now(),
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Destructive,
            ..Self::new(title, description)
        }
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == ToastVariant::Destructive
    }

    /// The toast shown for `event`, if any.
    pub fn from_event(event: &PortalEvent) -> Option<Self> {
        let error = || event.payload_str("error").unwrap_or("Unknown error").to_string();
        let toast = match event.event_type.as_str() {
            event_types::AUTH_SIGNED_IN => Self::new("Welcome back!", "Successfully logged in."),
            event_types::AUTH_SIGN_IN_FAILED => Self::destructive("Login Failed", error()),
            event_types::AUTH_SIGNED_UP => {
                let pending = event
                    .payload
                    .get("pending_confirmation")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let description = if pending {
                    "Please check your email to confirm your account."
                } else {
                    "Account created successfully."
                };
                Self::new("Registration Successful", description)
            }
            event_types::AUTH_SIGN_UP_FAILED => Self::destructive("Registration Failed", error()),
            event_types::AUTH_SIGNED_OUT => {
                Self::new("Logged out", "You have been successfully logged out.")
            }
            event_types::MUTATION_SUCCEEDED => Self::new(
                "Success",
                event.payload_str("message").unwrap_or("Saved successfully"),
            ),
            event_types::MUTATION_FAILED => Self::destructive("Error", error()),
            event_types::UPLOAD_FAILED => Self::destructive(
                "Upload failed",
                format!("{}. The record was saved without a document.", error()),
            ),
            _ => return None,
        };
        Some(Self {
            timestamp: event.timestamp,
            ..toast
        })
    }
}

// ---------------------------------------------------------------------------
// ToastFeed
// ---------------------------------------------------------------------------

/// Bounded, newest-last list of toasts fed from the event bus.
pub struct ToastFeed {
    toasts: Mutex<VecDeque<Toast>>,
    limit: usize,
}

impl Default for ToastFeed {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_LIMIT)
    }
}

impl ToastFeed {
    pub fn new(limit: usize) -> Self {
        Self {
            toasts: Mutex::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    pub fn push(&self, toast: Toast) {
        let mut toasts = self.toasts.lock().unwrap_or_else(PoisonError::into_inner);
        if toasts.len() == self.limit {
            toasts.pop_front();
        }
        toasts.push_back(toast);
    }

    /// Snapshot of retained toasts, oldest first.
    pub fn recent(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Remove and return every retained toast.
    pub fn drain(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Run the feed loop until `cancel` fires or the bus closes.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<PortalEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Toast feed cancelled");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        if let Some(toast) = Toast::from_event(&event) {
                            tracing::debug!(title = %toast.title, "Toast");
                            self.push(toast);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Toast feed lagged, some notices were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Event bus closed, toast feed shutting down");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::bus::EventBus;

    #[test]
    fn mutation_events_map_to_toasts() {
        let ok = PortalEvent::new(event_types::MUTATION_SUCCEEDED)
            .with_payload(json!({"message": "Work detail created successfully"}));
        let toast = Toast::from_event(&ok).unwrap();
        assert_eq!(toast.title, "Success");
        assert_eq!(toast.description, "Work detail created successfully");
        assert!(!toast.is_destructive());

        let failed = PortalEvent::new(event_types::MUTATION_FAILED)
            .with_payload(json!({"error": "duplicate key value"}));
        let toast = Toast::from_event(&failed).unwrap();
        assert_eq!(toast.title, "Error");
        assert!(toast.is_destructive());
    }

    #[test]
    fn read_failures_do_not_toast() {
        assert!(Toast::from_event(&PortalEvent::new(event_types::QUERY_FAILED)).is_none());
    }

    #[test]
    fn sign_up_toast_depends_on_confirmation() {
        let pending = PortalEvent::new(event_types::AUTH_SIGNED_UP)
            .with_payload(json!({"pending_confirmation": true}));
        assert_eq!(
            Toast::from_event(&pending).unwrap().description,
            "Please check your email to confirm your account."
        );
    }

    #[test]
    fn feed_keeps_only_the_newest() {
        let feed = ToastFeed::new(2);
        feed.push(Toast::new("a", ""));
        feed.push(Toast::new("b", ""));
        feed.push(Toast::new("c", ""));
        let titles: Vec<String> = feed.recent().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["b", "c"]);
        assert_eq!(feed.drain().len(), 2);
        assert!(feed.recent().is_empty());
    }

    #[tokio::test]
    async fn run_collects_until_cancelled() {
        let bus = EventBus::default();
        let feed = Arc::new(ToastFeed::default());
        let cancel = CancellationToken::new();

        let handle = {
            let feed = Arc::clone(&feed);
            let rx = bus.subscribe();
            let cancel = cancel.clone();
            tokio::spawn(async move { feed.run(rx, cancel).await })
        };

        bus.publish(PortalEvent::new(event_types::AUTH_SIGNED_OUT));
        bus.publish(PortalEvent::new(event_types::QUERY_FAILED));
        while feed.recent().is_empty() {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        handle.await.unwrap();
        let recent = feed.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "Logged out");
    }
}
