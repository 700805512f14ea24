use thiserror::Error;

use crate::embedding::DetectionResult;
use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The recognition model is not loaded or not ready — a service-level
    /// precondition failure, not an ordinary per-frame miss.
    #[error("embedding extractor not ready")]
    ModelUnavailable,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Boundary to the opaque face detection + recognition model.
///
/// Implementations may legitimately find zero faces in a frame
/// (`Ok(None)`); that is an ordinary outcome, not an error. The pipeline
/// never retries a frame — callers submit redundant frames instead.
pub trait FaceExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<Option<DetectionResult>, ExtractError>;
}
