// Module declarations
pub mod format;
mod processor;
mod queue_manager;
mod sampler;
mod types;
pub mod validation;

pub use sampler::OutcomeSampler;
pub use types::*;

use crate::config::{SimulatorConfig, UploadConfig};
use crate::error::Result;
use crate::events::{EventBus, EventReceiver};
use crate::logging::log_info;
use queue_manager::QueueInner;
use std::sync::Arc;

/// Simulated upload and classification queue.
///
/// Cheap to clone; every clone shares the same queue. `submit` spawns a
/// Tokio task, so it must be called from within a runtime.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("items", &self.inner.len())
            .field("active_tasks", &self.inner.active_tasks())
            .field("config", &self.inner.config)
            .field("event_bus", &"<event bus>")
            .finish()
    }
}

impl UploadQueue {
    pub fn new(config: UploadConfig, sampler: OutcomeSampler, event_bus: EventBus) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(QueueInner::new(config, sampler, event_bus)),
        })
    }

    /// Build from a full simulator config, seeding the sampler from `config.seed`.
    pub fn from_config(config: &SimulatorConfig, event_bus: EventBus) -> Result<Self> {
        Self::new(
            config.upload.clone(),
            OutcomeSampler::new(config.seed),
            event_bus,
        )
    }

    /// Accept a candidate and start its simulated upload.
    ///
    /// Non-audio media types (and candidates violating the optional size or
    /// queue bounds) are rejected synchronously; a `Rejected` event is
    /// published and no item is created.
    pub fn submit(&self, candidate: AudioCandidate) -> Result<String> {
        // The Added event is the activity-log record of acceptance
        let (id, token) = self.inner.accept(candidate)?;
        processor::spawn_item_task(Arc::clone(&self.inner), id.clone(), token);
        Ok(id)
    }

    /// Remove an item and cancel its timers. Unknown ids are ignored.
    ///
    /// Returns whether an item was removed.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.remove(id)
    }

    /// Drive a non-terminal item into `Failed`, discarding any partial result.
    pub fn mark_failed(&self, id: &str, reason: &str) -> Result<()> {
        self.inner.mark_failed(id, reason)
    }

    /// Remove every completed or failed item; returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        self.inner.clear_finished()
    }

    /// Items in submission order
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.inner.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.inner.get(id)
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.status()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.inner.event_bus.subscribe()
    }

    /// Resolves once no item is queued, uploading or processing, or the
    /// queue has been shut down.
    pub async fn wait_idle(&self) {
        let mut in_flight = self.inner.subscribe_in_flight();
        tokio::select! {
            _ = in_flight.wait_for(|count| *count == 0) => {}
            _ = self.inner.root_token.cancelled() => {}
        }
    }

    /// Cancel all item timers. Items keep their current stage and further
    /// submissions fail with `SimulatorError::Shutdown`.
    pub fn shutdown(&self) {
        self.inner.shutdown();
        log_info("upload-queue", "📤 Upload queue stopped").unwrap_or_default();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatorError;
    use std::time::Duration;

    fn queue(seed: u64) -> UploadQueue {
        UploadQueue::new(
            UploadConfig::default(),
            OutcomeSampler::from_seed(seed),
            EventBus::new(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_item_completes() {
        let queue = queue(1);
        let id = queue
            .submit(AudioCandidate::new("alarm.wav", 4096, "audio/wav"))
            .unwrap();

        queue.wait_idle().await;

        let item = queue.get(&id).unwrap();
        assert_eq!(item.stage, Stage::Completed);
        assert_eq!(item.progress, PROGRESS_COMPLETE);
        assert!(item.result.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_takes_at_least_two_seconds() {
        let queue = queue(2);
        let start = tokio::time::Instant::now();
        queue
            .submit(AudioCandidate::new("a.wav", 1, "audio/wav"))
            .unwrap();

        queue.wait_idle().await;

        // Five ticks minimum to reach 100, then at least 2s of processing
        assert!(start.elapsed() >= Duration::from_millis(5 * 200 + 2_000));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = UploadConfig {
            tick_interval_ms: 0,
            ..UploadConfig::default()
        };
        let err = UploadQueue::new(config, OutcomeSampler::from_seed(1), EventBus::new())
            .unwrap_err();
        assert!(matches!(err, SimulatorError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_freezes_items() {
        let queue = queue(3);
        let id = queue
            .submit(AudioCandidate::new("a.wav", 1, "audio/wav"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(450)).await;

        queue.shutdown();
        let frozen = queue.get(&id).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(queue.is_shut_down());
        assert_eq!(queue.get(&id).unwrap(), frozen);
        // Does not hang on the frozen item
        queue.wait_idle().await;
    }

    #[test]
    fn test_debug_output() {
        let queue = queue(4);
        let debug = format!("{:?}", queue);
        assert!(debug.contains("UploadQueue"));
        assert!(debug.contains("items: 0"));
    }
}
