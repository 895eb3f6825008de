//! Live-monitor simulator: a rolling waveform and periodic random detections.
//!
//! While monitoring is on, one task samples the waveform every
//! `waveform_interval_ms` and emits a detection every `detection_interval_ms`.
//! Pausing keeps the task alive but skips both timers; resuming restarts them,
//! so the first detection after a resume is a full interval away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::logging::{log_info, log_warn};
use crate::shutdown::ShutdownCoordinator;
use crate::upload_queue::{Label, OutcomeSampler};

pub const LOCATIONS: [&str; 5] = [
    "Sector A-7",
    "Sector B-3",
    "Sector C-1",
    "Highway-101",
    "Downtown-Plaza",
];

const CONFIDENCE_RANGE: (f64, f64) = (0.7, 1.0);
const WAVEFORM_PEAK: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 3] = [ThreatLevel::High, ThreatLevel::Medium, ThreatLevel::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::High => "HIGH",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: u64,
    pub label: Label,
    pub confidence: f64,
    pub location: String,
    pub threat: ThreatLevel,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug)]
struct FeedState {
    monitoring: bool,
    next_id: u64,
    latest: Option<Detection>,
    /// Newest first
    log: VecDeque<Detection>,
    waveform: VecDeque<f64>,
}

#[derive(Clone)]
pub struct DetectionFeed {
    state: Arc<Mutex<FeedState>>,
    config: MonitorConfig,
    sampler: Arc<OutcomeSampler>,
    detections_tx: broadcast::Sender<Detection>,
    resumed: Arc<Notify>,
    shutdown: ShutdownCoordinator,
}

impl std::fmt::Debug for DetectionFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionFeed")
            .field("monitoring", &self.is_monitoring())
            .field("config", &self.config)
            .finish()
    }
}

impl DetectionFeed {
    pub fn new(
        config: MonitorConfig,
        sampler: Arc<OutcomeSampler>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        let (detections_tx, _) = broadcast::channel(config.log_capacity.max(16));
        Self {
            state: Arc::new(Mutex::new(FeedState {
                monitoring: true,
                next_id: 1,
                latest: None,
                log: VecDeque::with_capacity(config.log_capacity),
                waveform: VecDeque::with_capacity(config.waveform_window),
            })),
            config,
            sampler,
            detections_tx,
            resumed: Arc::new(Notify::new()),
            shutdown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn the timer task; it runs until the shutdown coordinator fires.
    pub fn start(&self) -> JoinHandle<()> {
        let feed = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let waveform_every = Duration::from_millis(feed.config.waveform_interval_ms);
            let detection_every = Duration::from_millis(feed.config.detection_interval_ms);
            let mut waveform_ticker = interval_at(Instant::now() + waveform_every, waveform_every);
            let mut detection_ticker =
                interval_at(Instant::now() + detection_every, detection_every);
            waveform_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            detection_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            log_info("monitor", "🎙 Live monitor started").unwrap_or_default();

            loop {
                tokio::select! {
                    _ = waveform_ticker.tick() => {
                        if feed.is_monitoring() {
                            feed.sample_waveform();
                        }
                    }
                    _ = detection_ticker.tick() => {
                        if feed.is_monitoring() {
                            feed.detect_now();
                        }
                    }
                    _ = feed.resumed.notified() => {
                        waveform_ticker.reset();
                        detection_ticker.reset();
                    }
                    _ = shutdown_rx.recv() => {
                        log_info("monitor", "🎙 Live monitor stopped").unwrap_or_default();
                        break;
                    }
                }
            }
        })
    }

    pub fn pause(&self) {
        self.lock().monitoring = false;
    }

    pub fn resume(&self) {
        let was_paused = !std::mem::replace(&mut self.lock().monitoring, true);
        if was_paused {
            self.resumed.notify_one();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock().monitoring
    }

    /// Append one waveform sample, dropping the oldest beyond the window.
    pub fn sample_waveform(&self) -> f64 {
        let value = self.sampler.uniform(WAVEFORM_PEAK);
        let mut state = self.lock();
        if state.waveform.len() == self.config.waveform_window {
            state.waveform.pop_front();
        }
        state.waveform.push_back(value);
        value
    }

    /// Generate a detection immediately, record it, and broadcast it.
    pub fn detect_now(&self) -> Detection {
        let label = self.sampler.label();
        let confidence = self
            .sampler
            .confidence(CONFIDENCE_RANGE.0, CONFIDENCE_RANGE.1);
        let location = self
            .sampler
            .choose(&LOCATIONS)
            .copied()
            .unwrap_or(LOCATIONS[0])
            .to_string();
        let threat = self
            .sampler
            .choose(&ThreatLevel::ALL)
            .copied()
            .unwrap_or(ThreatLevel::Low);

        let detection = {
            let mut state = self.lock();
            let detection = Detection {
                id: state.next_id,
                label,
                confidence,
                location,
                threat,
                detected_at: Utc::now(),
            };
            state.next_id += 1;
            state.latest = Some(detection.clone());
            state.log.push_front(detection.clone());
            state.log.truncate(self.config.log_capacity);
            detection
        };

        if detection.threat == ThreatLevel::High {
            log_warn(
                "monitor",
                &format!(
                    "🚨 {} at {} ({:.1}%)",
                    detection.label.display_name(),
                    detection.location,
                    detection.confidence * 100.0
                ),
            )
            .unwrap_or_default();
        }

        // Nobody listening is fine; the log still has it
        let _ = self.detections_tx.send(detection.clone());
        detection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Detection> {
        self.detections_tx.subscribe()
    }

    pub fn latest(&self) -> Option<Detection> {
        self.lock().latest.clone()
    }

    /// Recent detections, newest first
    pub fn log(&self) -> Vec<Detection> {
        self.lock().log.iter().cloned().collect()
    }

    /// Waveform samples, oldest first
    pub fn waveform(&self) -> Vec<f64> {
        self.lock().waveform.iter().copied().collect()
    }
}
