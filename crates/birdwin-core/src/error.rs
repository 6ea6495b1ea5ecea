//! Error types for windowing, indexing and retrieval

use thiserror::Error;

/// Errors raised by the windowing core
#[derive(Debug, Error)]
pub enum WindowError {
    /// Non-positive or inconsistent window/hop lengths
    #[error("Invalid window configuration: {0}")]
    InvalidConfig(String),

    /// Clip metadata that cannot be trusted
    #[error("Data integrity error for clip {clip_id}: {reason}")]
    DataIntegrity { clip_id: String, reason: String },

    /// The clip loader failed to produce a waveform
    #[error("Clip {clip_id} unavailable: {source:#}")]
    ClipUnavailable {
        clip_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Position outside the corpus index
    #[error("Position {position} out of range (index holds {len} windows)")]
    NotFound { position: usize, len: usize },

    /// Two batch items with different feature shapes
    #[error("Shape mismatch at batch item {index}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Feature extraction failure
    #[error("Feature extraction failed: {0}")]
    Feature(String),
}

impl WindowError {
    pub(crate) fn integrity(clip_id: &str, reason: impl Into<String>) -> Self {
        WindowError::DataIntegrity {
            clip_id: clip_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors a training loop may skip over instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WindowError::ClipUnavailable { .. })
    }

    /// Clip the error is attributed to, if any
    pub fn clip_id(&self) -> Option<&str> {
        match self {
            WindowError::DataIntegrity { clip_id, .. }
            | WindowError::ClipUnavailable { clip_id, .. } => Some(clip_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WindowError>;
