//! Per-item lifecycle task.
//!
//! Each accepted item gets one spawned task that waits for an upload slot,
//! ticks progress until 100, sleeps through the processing delay, and then
//! completes the item. Cancelling the item's token drops the task at its
//! next await point.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::logging::log_debug;

use super::queue_manager::{QueueInner, UploadTick};

pub(crate) fn spawn_item_task(
    inner: Arc<QueueInner>,
    id: String,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                log_debug("upload-queue", &format!("Timers cancelled for {}", id))
                    .unwrap_or_default();
            }
            _ = run_lifecycle(&inner, &id) => {}
        }
    })
}

async fn run_lifecycle(inner: &QueueInner, id: &str) {
    // Held until the item finishes or the task is dropped
    let _slot = match &inner.upload_slots {
        Some(slots) => match Arc::clone(slots).acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => return,
        },
        None => None,
    };

    if !inner.begin_upload(id) {
        log_debug("upload-queue", &format!("{} left the queue before uploading", id))
            .unwrap_or_default();
        return;
    }

    let tick = inner.config.tick_interval();
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match inner.advance_upload(id) {
            UploadTick::Continue => {}
            UploadTick::Finished => break,
            UploadTick::Gone => {
                log_debug("upload-queue", &format!("{} left the queue while uploading", id))
                    .unwrap_or_default();
                return;
            }
        }
    }

    let delay = inner.sampler.processing_delay(
        inner.config.processing_delay_min_ms,
        inner.config.processing_delay_max_ms,
    );
    log_debug(
        "upload-queue",
        &format!("{} processing for {}ms", id, delay.as_millis()),
    )
    .unwrap_or_default();
    sleep(delay).await;

    inner.complete(id);
}
