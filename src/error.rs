//! Error taxonomy for the narration core.
//!
//! The text transforms never fail (they degrade to pass-through), and the
//! safety filter returns verdicts rather than errors. Everything that *can*
//! fail maps onto one of the variants below so callers get a structured
//! "why" instead of a bare boolean.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NarratorError {
    /// Malformed configuration, rejected at construction time.
    #[error("validation error: {0}")]
    Validation(String),

    /// A post id could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// The safety verdict rejected the content. A policy outcome, not a fault.
    #[error("content filtered: {reason}")]
    ContentFiltered { reason: String },

    /// The narration engine failed or is unreachable. Retryable.
    #[error("engine error: {0}")]
    Engine(String),

    /// A file or metadata write failed. Retryable up to the queue's attempt cap.
    #[error("storage error: {0}")]
    Storage(String),
}

impl NarratorError {
    /// Short machine-readable code used in API responses and queue records.
    pub fn code(&self) -> &'static str {
        match self {
            NarratorError::Validation(_) => "validation",
            NarratorError::NotFound(_) => "not_found",
            NarratorError::ContentFiltered { .. } => "content_filtered",
            NarratorError::Engine(_) => "engine",
            NarratorError::Storage(_) => "storage",
        }
    }

    /// Whether the queue may retry a generation attempt that hit this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NarratorError::Engine(_) | NarratorError::Storage(_)
        )
    }
}
