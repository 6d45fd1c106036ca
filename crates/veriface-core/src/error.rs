use thiserror::Error;

use crate::recognizer::RecognizerError;

/// Request-level failures.
///
/// A face that cannot be located is deliberately absent: the locator falls
/// back to the whole frame instead of failing.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    EmptyImage,
    #[error("embedding extraction failed: {0}")]
    EmbeddingExtraction(String),
    #[error("no enrollment for session {session}; enroll first")]
    EnrollmentMissing { session: String },
    #[error("malformed stored embedding: {0}")]
    MalformedStoredEmbedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl FaceError {
    /// Whether the caller is at fault (bad input or missing enrollment)
    /// rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FaceError::Decode(_)
                | FaceError::EmptyImage
                | FaceError::EnrollmentMissing { .. }
                | FaceError::MalformedStoredEmbedding(_)
        )
    }

    /// Stable machine-readable name for the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            FaceError::Decode(_) => "decode_error",
            FaceError::EmptyImage => "empty_image",
            FaceError::EmbeddingExtraction(_) => "embedding_extraction_error",
            FaceError::EnrollmentMissing { .. } => "enrollment_missing",
            FaceError::MalformedStoredEmbedding(_) => "malformed_stored_embedding",
            FaceError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

impl From<RecognizerError> for FaceError {
    fn from(err: RecognizerError) -> Self {
        FaceError::EmbeddingExtraction(err.to_string())
    }
}
