use super::{EventBus, QueueEvent, QueueEventPayload};
use crate::logging::{log_component_event, log_info};
use crate::notifications::{Notification, NotificationSink};
use crate::shutdown::ShutdownCoordinator;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handler that turns queue events into user-facing notifications
pub struct NotificationHandler {
    event_bus: EventBus,
    sink: Arc<dyn NotificationSink>,
    shutdown: ShutdownCoordinator,
}

impl NotificationHandler {
    pub fn new(
        event_bus: EventBus,
        sink: Arc<dyn NotificationSink>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            event_bus,
            sink,
            shutdown,
        }
    }

    /// Subscribes immediately, so no event published after this call is missed
    pub fn start(self) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();
        let sink = self.sink;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Some(event) => {
                                if let Some(notification) = Notification::from_event(&event) {
                                    sink.notify(notification);
                                }
                            }
                            None => {
                                log_info("events", "Notification handler stopped (event bus closed)")
                                    .unwrap_or_default();
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        log_info("events", "Notification handler gracefully shutting down")
                            .unwrap_or_default();
                        break;
                    }
                }
            }
        })
    }
}

/// Handler that mirrors queue events into the component activity log
pub struct LoggingEventHandler {
    event_bus: EventBus,
    shutdown: ShutdownCoordinator,
}

impl LoggingEventHandler {
    pub fn new(event_bus: EventBus, shutdown: ShutdownCoordinator) -> Self {
        Self {
            event_bus,
            shutdown,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Some(event) => log_event(&event),
                            None => break,
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }
}

/// Activity-log level: stage changes at info, failures and rejections at warn,
/// everything else at debug
fn log_level(payload: &QueueEventPayload) -> &'static str {
    match payload {
        QueueEventPayload::StageChanged { .. } => "INFO",
        QueueEventPayload::Failed { .. } | QueueEventPayload::Rejected { .. } => "WARN",
        _ => "DEBUG",
    }
}

fn log_event(event: &QueueEvent) {
    let message = match &event.payload {
        QueueEventPayload::Added { item } => {
            format!("📥 Queued {} ({} bytes) as {}", item.name, item.size_bytes, item.id)
        }
        QueueEventPayload::Progress { id, progress } => {
            format!("{} upload progress {:.1}%", id, progress)
        }
        QueueEventPayload::StageChanged { id, from, to } => format!("{} {} -> {}", id, from, to),
        QueueEventPayload::Completed { id, name, result } => format!(
            "✓ {} ({}) classified as {} ({:.3})",
            name, id, result.label, result.confidence
        ),
        QueueEventPayload::Failed { id, reason } => format!("✗ {} failed: {}", id, reason),
        QueueEventPayload::Removed { id } => format!("🗑 Removed {}", id),
        QueueEventPayload::Rejected {
            name, media_type, ..
        } => format!("⚠ Rejected {} ({})", name, media_type),
    };

    log_component_event(
        "upload-queue",
        log_level(&event.payload),
        &message,
        serde_json::to_value(&event.payload).ok(),
    )
    .unwrap_or_default();
}
