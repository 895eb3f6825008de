//! Queue operations - accept, advance, complete, fail, remove and query items.
//!
//! Every mutation takes the state lock, changes the item, and publishes its
//! event before releasing the lock. That single-writer rule is what keeps
//! event order equal to mutation order and guarantees nothing is published
//! for an id after its `Removed` event.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::error::{Result, SimulatorError};
use crate::events::{EventBus, QueueEventPayload, RejectionReason};
use crate::logging::{log_debug, log_error, log_warn};

use super::sampler::OutcomeSampler;
use super::types::{
    AudioCandidate, ClassificationResult, QueueItem, QueueStatus, Stage, PROGRESS_COMPLETE,
};
use super::validation::validate_candidate;

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// Insertion order is submission order
    items: IndexMap<String, QueueItem>,
    /// Cancellation handle for every item whose task has not finished
    tasks: HashMap<String, CancellationToken>,
}

/// Outcome of one upload progress tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadTick {
    Continue,
    /// Progress hit 100 and the item is now `Processing`
    Finished,
    /// Item was removed or driven to another stage; the task should stop
    Gone,
}

/// Shared state behind every `UploadQueue` handle and item task
pub(crate) struct QueueInner {
    state: Mutex<QueueState>,
    pub(crate) config: UploadConfig,
    pub(crate) sampler: Arc<OutcomeSampler>,
    pub(crate) event_bus: EventBus,
    pub(crate) upload_slots: Option<Arc<Semaphore>>,
    pub(crate) root_token: CancellationToken,
    in_flight: watch::Sender<usize>,
}

impl QueueInner {
    pub(crate) fn new(config: UploadConfig, sampler: OutcomeSampler, event_bus: EventBus) -> Self {
        let upload_slots = config
            .max_concurrent_uploads
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let (in_flight, _) = watch::channel(0);

        Self {
            state: Mutex::new(QueueState::default()),
            config,
            sampler: Arc::new(sampler),
            event_bus,
            upload_slots,
            root_token: CancellationToken::new(),
            in_flight,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // Each mutation publishes only after it is complete, so a poisoned
        // guard still holds a consistent queue
        self.state.lock().unwrap_or_else(|poisoned| {
            log_error("upload-queue", "Queue state lock poisoned, recovering")
                .unwrap_or_default();
            poisoned.into_inner()
        })
    }

    fn refresh_in_flight(&self, state: &QueueState) {
        let count = state
            .items
            .values()
            .filter(|item| !item.stage.is_terminal())
            .count();
        self.in_flight.send_replace(count);
    }

    pub(crate) fn subscribe_in_flight(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Validate and append a candidate; returns its id and task token.
    pub(crate) fn accept(&self, candidate: AudioCandidate) -> Result<(String, CancellationToken)> {
        let mut state = self.lock_state();

        // `shutdown` cancels the root token while holding this lock
        if self.root_token.is_cancelled() {
            return Err(SimulatorError::Shutdown);
        }

        if let Err(err) = validate_candidate(&candidate, &self.config, state.items.len()) {
            log_warn(
                "upload-queue",
                &format!("⚠ Rejecting upload: {}", err),
            )
            .unwrap_or_default();

            if let Some(reason) = RejectionReason::from_error(&err) {
                self.event_bus.publish(QueueEventPayload::Rejected {
                    name: candidate.name,
                    media_type: candidate.media_type,
                    reason,
                });
            }
            return Err(err);
        }

        let id = loop {
            let id = self.sampler.item_id();
            if !state.items.contains_key(&id) {
                break id;
            }
        };

        let item = QueueItem::new(id.clone(), candidate);
        let token = self.root_token.child_token();
        state.items.insert(id.clone(), item.clone());
        state.tasks.insert(id.clone(), token.clone());

        self.event_bus.publish(QueueEventPayload::Added { item });
        self.refresh_in_flight(&state);

        Ok((id, token))
    }

    /// Queued -> Uploading. False when the item no longer waits to start.
    pub(crate) fn begin_upload(&self, id: &str) -> bool {
        let mut state = self.lock_state();
        let Some(item) = state.items.get_mut(id) else {
            return false;
        };
        if item.stage != Stage::Queued {
            return false;
        }

        item.stage = Stage::Uploading;
        self.event_bus.publish(QueueEventPayload::StageChanged {
            id: id.to_string(),
            from: Stage::Queued,
            to: Stage::Uploading,
        });
        true
    }

    /// Add one random increment; flips to `Processing` only at exactly 100.
    pub(crate) fn advance_upload(&self, id: &str) -> UploadTick {
        let mut state = self.lock_state();
        let Some(item) = state.items.get_mut(id) else {
            return UploadTick::Gone;
        };
        if item.stage != Stage::Uploading {
            return UploadTick::Gone;
        }

        let increment = self
            .sampler
            .progress_increment(self.config.max_progress_increment);
        let progress = (item.progress + increment).min(PROGRESS_COMPLETE);
        item.progress = progress;

        self.event_bus.publish(QueueEventPayload::Progress {
            id: id.to_string(),
            progress,
        });

        if progress < PROGRESS_COMPLETE {
            return UploadTick::Continue;
        }

        item.stage = Stage::Processing;
        self.event_bus.publish(QueueEventPayload::StageChanged {
            id: id.to_string(),
            from: Stage::Uploading,
            to: Stage::Processing,
        });
        UploadTick::Finished
    }

    /// Processing -> Completed with a freshly sampled result.
    pub(crate) fn complete(&self, id: &str) -> bool {
        let mut state = self.lock_state();
        let Some(item) = state.items.get_mut(id) else {
            return false;
        };
        if item.stage != Stage::Processing {
            return false;
        }

        let result = ClassificationResult {
            label: self.sampler.label(),
            confidence: self
                .sampler
                .confidence(self.config.confidence_min, self.config.confidence_max),
            completed_at: chrono::Utc::now(),
        };
        item.stage = Stage::Completed;
        item.result = Some(result.clone());
        let name = item.name.clone();

        self.event_bus.publish(QueueEventPayload::Completed {
            id: id.to_string(),
            name,
            result,
        });
        state.tasks.remove(id);
        self.refresh_in_flight(&state);
        true
    }

    pub(crate) fn mark_failed(&self, id: &str, reason: &str) -> Result<()> {
        let mut state = self.lock_state();
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| SimulatorError::NotFound(id.to_string()))?;
        if item.stage.is_terminal() {
            return Err(SimulatorError::InvalidTransition {
                id: id.to_string(),
                stage: item.stage,
            });
        }

        item.stage = Stage::Failed;
        item.result = None;
        item.last_error = Some(reason.to_string());

        if let Some(token) = state.tasks.remove(id) {
            token.cancel();
        }
        self.event_bus.publish(QueueEventPayload::Failed {
            id: id.to_string(),
            reason: reason.to_string(),
        });
        self.refresh_in_flight(&state);
        Ok(())
    }

    pub(crate) fn remove(&self, id: &str) -> bool {
        let mut state = self.lock_state();
        if state.items.shift_remove(id).is_none() {
            log_debug(
                "upload-queue",
                &format!("Ignoring removal of unknown item {}", id),
            )
            .unwrap_or_default();
            return false;
        }

        if let Some(token) = state.tasks.remove(id) {
            token.cancel();
        }
        self.event_bus.publish(QueueEventPayload::Removed { id: id.to_string() });
        self.refresh_in_flight(&state);
        true
    }

    pub(crate) fn clear_finished(&self) -> usize {
        let mut state = self.lock_state();
        let finished: Vec<String> = state
            .items
            .values()
            .filter(|item| item.stage.is_terminal())
            .map(|item| item.id.clone())
            .collect();

        for id in &finished {
            state.items.shift_remove(id);
            self.event_bus
                .publish(QueueEventPayload::Removed { id: id.clone() });
        }
        finished.len()
    }

    /// Cancel every in-flight task; items keep the stage they reached.
    pub(crate) fn shutdown(&self) {
        let mut state = self.lock_state();
        self.root_token.cancel();
        state.tasks.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<QueueItem> {
        self.lock_state().items.values().cloned().collect()
    }

    pub(crate) fn get(&self, id: &str) -> Option<QueueItem> {
        self.lock_state().items.get(id).cloned()
    }

    pub(crate) fn status(&self) -> QueueStatus {
        self.lock_state().items.values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_state().items.len()
    }

    pub(crate) fn active_tasks(&self) -> usize {
        self.lock_state().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> QueueInner {
        QueueInner::new(
            UploadConfig::default(),
            OutcomeSampler::from_seed(11),
            EventBus::new(),
        )
    }

    fn wav(name: &str) -> AudioCandidate {
        AudioCandidate::new(name, 2048, "audio/wav")
    }

    #[test]
    fn test_accept_appends_queued_item() {
        let inner = inner();
        let (id, token) = inner.accept(wav("a.wav")).unwrap();

        let item = inner.get(&id).unwrap();
        assert_eq!(item.stage, Stage::Queued);
        assert_eq!(item.progress, 0.0);
        assert!(item.result.is_none());
        assert!(!token.is_cancelled());
        assert_eq!(inner.active_tasks(), 1);
    }

    #[test]
    fn test_advance_clamps_at_exactly_100() {
        let inner = inner();
        let (id, _token) = inner.accept(wav("a.wav")).unwrap();
        assert!(inner.begin_upload(&id));

        let mut last = 0.0;
        let mut ticks = 0;
        loop {
            ticks += 1;
            match inner.advance_upload(&id) {
                UploadTick::Continue => {
                    let item = inner.get(&id).unwrap();
                    assert!(item.progress >= last);
                    assert!(item.progress < PROGRESS_COMPLETE);
                    assert_eq!(item.stage, Stage::Uploading);
                    last = item.progress;
                }
                UploadTick::Finished => break,
                UploadTick::Gone => panic!("item vanished"),
            }
            assert!(ticks < 10_000);
        }

        let item = inner.get(&id).unwrap();
        assert_eq!(item.progress, PROGRESS_COMPLETE);
        assert_eq!(item.stage, Stage::Processing);
        // Further ticks do nothing once processing
        assert_eq!(inner.advance_upload(&id), UploadTick::Gone);
    }

    #[test]
    fn test_complete_requires_processing() {
        let inner = inner();
        let (id, _token) = inner.accept(wav("a.wav")).unwrap();
        assert!(!inner.complete(&id));

        assert!(inner.begin_upload(&id));
        while inner.advance_upload(&id) == UploadTick::Continue {}
        assert!(inner.complete(&id));

        let item = inner.get(&id).unwrap();
        assert_eq!(item.stage, Stage::Completed);
        let result = item.result.unwrap();
        assert!((0.7..1.0).contains(&result.confidence));
        assert_eq!(inner.active_tasks(), 0);
    }

    #[test]
    fn test_mark_failed_cancels_and_discards_result() {
        let inner = inner();
        let (id, token) = inner.accept(wav("a.wav")).unwrap();
        assert!(inner.begin_upload(&id));

        inner.mark_failed(&id, "connection reset").unwrap();
        assert!(token.is_cancelled());

        let item = inner.get(&id).unwrap();
        assert_eq!(item.stage, Stage::Failed);
        assert!(item.result.is_none());
        assert_eq!(item.last_error.as_deref(), Some("connection reset"));
        assert_eq!(inner.advance_upload(&id), UploadTick::Gone);

        let err = inner.mark_failed(&id, "again").unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidTransition { stage: Stage::Failed, .. }));
    }

    #[test]
    fn test_mark_failed_unknown_id() {
        let inner = inner();
        let err = inner.mark_failed("missing", "x").unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound(_)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let inner = inner();
        let mut rx = inner.event_bus.subscribe();
        let (id, token) = inner.accept(wav("a.wav")).unwrap();

        assert!(inner.remove(&id));
        assert!(token.is_cancelled());
        assert!(!inner.remove(&id));
        assert_eq!(inner.len(), 0);

        let kinds: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.payload_type().to_string())
            .collect();
        assert_eq!(kinds, vec!["added", "removed"]);
    }

    #[test]
    fn test_rejection_publishes_event_and_keeps_queue_empty() {
        let inner = inner();
        let mut rx = inner.event_bus.subscribe();

        let err = inner
            .accept(AudioCandidate::new("clip.mp4", 10, "video/mp4"))
            .unwrap_err();
        assert!(matches!(err, SimulatorError::RejectedMediaType { .. }));
        assert_eq!(inner.len(), 0);

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            QueueEventPayload::Rejected {
                reason: RejectionReason::MediaType,
                ..
            }
        ));
    }

    #[test]
    fn test_accept_after_shutdown() {
        let inner = inner();
        inner.shutdown();
        let err = inner.accept(wav("late.wav")).unwrap_err();
        assert!(matches!(err, SimulatorError::Shutdown));
    }

    #[test]
    fn test_poisoned_state_lock_recovers() {
        let inner = inner();
        let (id, _token) = inner.accept(wav("before.wav")).unwrap();

        let poisoner = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _state = inner.lock_state();
                    panic!("panic while holding the queue lock");
                })
                .join()
        });
        assert!(poisoner.is_err());
        assert!(inner.state.is_poisoned());

        assert!(inner.begin_upload(&id));
        assert!(inner.accept(wav("after.wav")).is_ok());
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_accept_waiting_on_lock_sees_shutdown() {
        let inner = inner();

        std::thread::scope(|scope| {
            let state = inner.lock_state();
            let pending = scope.spawn(|| inner.accept(wav("racing.wav")));

            // Let the submitter block on the lock, then shut down as `shutdown` does
            std::thread::sleep(std::time::Duration::from_millis(50));
            inner.root_token.cancel();
            drop(state);

            let result = pending.join().unwrap();
            assert!(matches!(result, Err(SimulatorError::Shutdown)));
        });

        assert_eq!(inner.len(), 0);
    }

    #[test]
    fn test_clear_finished_keeps_in_flight() {
        let inner = inner();
        let (done, _t1) = inner.accept(wav("done.wav")).unwrap();
        let (failed, _t2) = inner.accept(wav("failed.wav")).unwrap();
        let (pending, _t3) = inner.accept(wav("pending.wav")).unwrap();

        inner.begin_upload(&done);
        while inner.advance_upload(&done) == UploadTick::Continue {}
        inner.complete(&done);
        inner.mark_failed(&failed, "boom").unwrap();

        assert_eq!(inner.clear_finished(), 2);
        let remaining: Vec<String> = inner.snapshot().into_iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![pending]);
    }

    #[test]
    fn test_in_flight_counter() {
        let inner = inner();
        let rx = inner.subscribe_in_flight();
        let (a, _ta) = inner.accept(wav("a.wav")).unwrap();
        let (_b, _tb) = inner.accept(wav("b.wav")).unwrap();
        assert_eq!(*rx.borrow(), 2);

        inner.mark_failed(&a, "x").unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
