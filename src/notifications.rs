//! Human-readable notifications derived from queue events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::events::{QueueEvent, QueueEventPayload, RejectionReason};
use crate::upload_queue::format::{format_confidence, format_file_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub item_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Toast for events a user should see; progress and bookkeeping events map to None.
    pub fn from_event(event: &QueueEvent) -> Option<Self> {
        let (kind, title, message) = match &event.payload {
            QueueEventPayload::Completed { result, .. } => (
                NotificationKind::Success,
                "Analysis Complete",
                format!(
                    "File classified as {} with {} confidence",
                    result.label.display_name(),
                    format_confidence(result.confidence)
                ),
            ),
            QueueEventPayload::Rejected { name, reason, .. } => (
                NotificationKind::Error,
                "Invalid Files",
                match reason {
                    RejectionReason::MediaType => "Only audio files are supported".to_string(),
                    RejectionReason::TooLarge { limit, .. } => format!(
                        "{} exceeds the {} upload limit",
                        name,
                        format_file_size(*limit)
                    ),
                    RejectionReason::QueueFull { limit } => {
                        format!("The processing queue is full ({} files)", limit)
                    }
                },
            ),
            QueueEventPayload::Failed { reason, .. } => {
                (NotificationKind::Error, "Upload Failed", reason.clone())
            }
            _ => return None,
        };

        Some(Self {
            kind,
            title: title.to_string(),
            message,
            item_id: event.item_id().map(str::to_string),
            timestamp: event.timestamp,
        })
    }
}

/// Receiver of transient user-facing messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(
                component = "notifications",
                "{}: {}", notification.title, notification.message
            ),
            NotificationKind::Error => warn!(
                component = "notifications",
                "{}: {}", notification.title, notification.message
            ),
        }
    }
}

/// Sink that forwards notifications into a channel, for presentation layers
/// that render on their own loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is displaying toasts any more
        let _ = self.tx.send(notification);
    }
}
