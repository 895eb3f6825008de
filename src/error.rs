use thiserror::Error;

use crate::upload_queue::Stage;

/// CrimeSound simulator errors
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Candidate is not an audio file
    #[error("Rejected media type for {name}: {media_type} (only audio files are supported)")]
    RejectedMediaType { name: String, media_type: String },

    /// Candidate exceeds the configured size bound
    #[error("File too large: {name} ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// Queue already holds the configured maximum number of items
    #[error("Queue is full (limit {limit} items)")]
    QueueFull { limit: usize },

    /// No live item with the given id
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Requested stage change is not allowed from the item's current stage
    #[error("Invalid transition for item {id}: already {stage}")]
    InvalidTransition { id: String, stage: Stage },

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Queue was shut down; no new items are accepted
    #[error("Upload queue has been shut down")]
    Shutdown,
}

impl SimulatorError {
    /// Whether this error came from acceptance-time validation in `submit`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SimulatorError::RejectedMediaType { .. }
                | SimulatorError::FileTooLarge { .. }
                | SimulatorError::QueueFull { .. }
        )
    }
}

/// Convert SimulatorError to String for presentation layers that only
/// display error text
impl From<SimulatorError> for String {
    fn from(err: SimulatorError) -> String {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<SimulatorError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err: SimulatorError = e.into();
            match err {
                SimulatorError::Config(s) => SimulatorError::Config(format!("{}: {}", msg, s)),
                SimulatorError::Io(e) => SimulatorError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: {}", msg, e),
                )),
                other => other,
            }
        })
    }
}
