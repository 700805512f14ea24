use thiserror::Error;

/// Identity signature dimensionality. Fixed by the recognition model;
/// every embedding crossing the pipeline boundary has exactly this many
/// components.
pub const EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("invalid embedding dimension: {0} (expected {EMBEDDING_DIM})")]
    InvalidDimension(usize),
    #[error("invalid embedding value (NaN/Inf)")]
    NonFiniteValue,
}

/// A 512-dimension identity signature.
///
/// Treated as a point in Euclidean space but compared via cosine
/// geometry — only direction carries identity, not magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Validate and wrap raw model output. Rejects wrong dimensionality
    /// and non-finite components.
    pub fn new(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::InvalidDimension(values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFiniteValue);
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// One frame's worth of detector output: the embedding plus the
/// producer-supplied confidence in [0,1] and an optional sharpness
/// scalar (Laplacian-variance proxy for focus, non-negative).
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub embedding: Embedding,
    pub confidence: f32,
    pub sharpness: Option<f32>,
}

/// Explicit per-frame outcome of running detection over a batch.
///
/// "No face" and "extraction failed" select identically (the frame is
/// skipped) but are kept distinct so callers can log why a frame
/// contributed nothing.
#[derive(Debug, Clone)]
pub enum FrameObservation {
    Face(DetectionResult),
    NoFace,
    Failed(String),
}
