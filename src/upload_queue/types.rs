//! Type definitions for the upload queue simulator.
//!
//! Defines core data structures: QueueItem, Stage, Label, ClassificationResult
//! and QueueStatus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress value an item must reach before it may leave `Uploading`.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Prefix a media type must carry to be accepted.
pub const AUDIO_MEDIA_PREFIX: &str = "audio/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::Uploading => "uploading",
            Stage::Processing => "processing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of classification tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    GunShot,
    GlassBreaking,
    Scream,
    Siren,
    EngineIdling,
    Normal,
}

impl Label {
    pub const ALL: [Label; 6] = [
        Label::GunShot,
        Label::GlassBreaking,
        Label::Scream,
        Label::Siren,
        Label::EngineIdling,
        Label::Normal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::GunShot => "gun_shot",
            Label::GlassBreaking => "glass_breaking",
            Label::Scream => "scream",
            Label::Siren => "siren",
            Label::EngineIdling => "engine_idling",
            Label::Normal => "normal",
        }
    }

    /// Human-readable form, e.g. "gun shot".
    pub fn display_name(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f64,
    pub completed_at: DateTime<Utc>,
}

/// What the presentation layer hands to `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCandidate {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
}

impl AudioCandidate {
    pub fn new(name: impl Into<String>, size_bytes: u64, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            media_type: media_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub stage: Stage,
    pub progress: f64,
    pub result: Option<ClassificationResult>,
    pub queued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl QueueItem {
    pub(crate) fn new(id: String, candidate: AudioCandidate) -> Self {
        Self {
            id,
            name: candidate.name,
            size_bytes: candidate.size_bytes,
            media_type: candidate.media_type,
            stage: Stage::Queued,
            progress: 0.0,
            result: None,
            queued_at: Utc::now(),
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub uploading: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl QueueStatus {
    pub fn in_flight(&self) -> usize {
        self.queued + self.uploading + self.processing
    }
}

impl<'a> FromIterator<&'a QueueItem> for QueueStatus {
    fn from_iter<I: IntoIterator<Item = &'a QueueItem>>(iter: I) -> Self {
        let mut status = QueueStatus::default();
        for item in iter {
            match item.stage {
                Stage::Queued => status.queued += 1,
                Stage::Uploading => status.uploading += 1,
                Stage::Processing => status.processing += 1,
                Stage::Completed => status.completed += 1,
                Stage::Failed => status.failed += 1,
            }
            status.total += 1;
        }
        status
    }
}
