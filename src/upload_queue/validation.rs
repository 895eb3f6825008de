//! Acceptance checks applied by `submit` before an item is created.

use std::path::Path;

use crate::config::UploadConfig;
use crate::error::{Result, SimulatorError};

use super::types::{AudioCandidate, AUDIO_MEDIA_PREFIX};

/// MIME types are case-insensitive, so "Audio/WAV" is accepted too.
pub fn is_audio_media_type(media_type: &str) -> bool {
    media_type
        .trim()
        .to_ascii_lowercase()
        .starts_with(AUDIO_MEDIA_PREFIX)
}

/// Validate a candidate against the media-type rule and the optional bounds.
pub fn validate_candidate(
    candidate: &AudioCandidate,
    config: &UploadConfig,
    queue_len: usize,
) -> Result<()> {
    if !is_audio_media_type(&candidate.media_type) {
        return Err(SimulatorError::RejectedMediaType {
            name: candidate.name.clone(),
            media_type: candidate.media_type.clone(),
        });
    }

    if let Some(limit) = config.max_file_size_bytes {
        if candidate.size_bytes > limit {
            return Err(SimulatorError::FileTooLarge {
                name: candidate.name.clone(),
                size: candidate.size_bytes,
                limit,
            });
        }
    }

    if let Some(limit) = config.max_queue_len {
        if queue_len >= limit {
            return Err(SimulatorError::QueueFull { limit });
        }
    }

    Ok(())
}

/// Best-effort media type from a file extension, for callers that only have a path.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
