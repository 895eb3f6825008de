use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SimulatorError;
use crate::upload_queue::{ClassificationResult, QueueItem, Stage};

/// Sequence number for ordering events
pub type EventSequence = u64;

/// One change notification from the upload queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub payload: QueueEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEventPayload {
    /// Item accepted and appended in `Queued`
    Added { item: QueueItem },

    /// Upload progress advanced
    Progress { id: String, progress: f64 },

    /// Non-terminal stage change (Queued -> Uploading, Uploading -> Processing)
    StageChanged { id: String, from: Stage, to: Stage },

    /// Processing finished and a result was assigned
    Completed {
        id: String,
        name: String,
        result: ClassificationResult,
    },

    /// Item driven into `Failed` by an external caller
    Failed { id: String, reason: String },

    /// Item removed from the queue
    Removed { id: String },

    /// Candidate refused at submission; no item exists for it
    Rejected {
        name: String,
        media_type: String,
        reason: RejectionReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    MediaType,
    TooLarge { size: u64, limit: u64 },
    QueueFull { limit: usize },
}

impl RejectionReason {
    /// Reason for a rejection error; None for errors that are not rejections.
    pub fn from_error(err: &SimulatorError) -> Option<Self> {
        match err {
            SimulatorError::RejectedMediaType { .. } => Some(RejectionReason::MediaType),
            SimulatorError::FileTooLarge { size, limit, .. } => Some(RejectionReason::TooLarge {
                size: *size,
                limit: *limit,
            }),
            SimulatorError::QueueFull { limit } => {
                Some(RejectionReason::QueueFull { limit: *limit })
            }
            _ => None,
        }
    }
}

impl QueueEvent {
    /// Id of the queue item this event refers to, if any
    pub fn item_id(&self) -> Option<&str> {
        match &self.payload {
            QueueEventPayload::Added { item } => Some(&item.id),
            QueueEventPayload::Progress { id, .. }
            | QueueEventPayload::StageChanged { id, .. }
            | QueueEventPayload::Completed { id, .. }
            | QueueEventPayload::Failed { id, .. }
            | QueueEventPayload::Removed { id } => Some(id),
            QueueEventPayload::Rejected { .. } => None,
        }
    }

    pub fn payload_type(&self) -> &str {
        match &self.payload {
            QueueEventPayload::Added { .. } => "added",
            QueueEventPayload::Progress { .. } => "progress",
            QueueEventPayload::StageChanged { .. } => "stage_changed",
            QueueEventPayload::Completed { .. } => "completed",
            QueueEventPayload::Failed { .. } => "failed",
            QueueEventPayload::Removed { .. } => "removed",
            QueueEventPayload::Rejected { .. } => "rejected",
        }
    }
}
