//! Veriface biometric pipeline.
//!
//! Pure, stateless building blocks composed per request, leaf-first:
//!
//! 1. [`quality`] — pick the best detection across redundant frames.
//! 2. [`liveness`] — score temporal pixel variance against a
//!    caller-asserted challenge flag.
//! 3. [`similarity`] / [`decision`] — cosine comparison mapped to a
//!    three-way authentication outcome.
//! 4. [`matcher`] — closest-match identification over a store snapshot.
//!
//! Nothing here performs I/O or holds state across requests; embedding
//! extraction, image transport, and persistence live behind the
//! [`extractor::FaceExtractor`] trait and the daemon crate.

pub mod decision;
pub mod embedding;
pub mod extractor;
pub mod frame;
pub mod liveness;
pub mod matcher;
pub mod quality;
pub mod similarity;

pub use decision::{Decision, DecisionPolicy};
pub use embedding::{DetectionResult, Embedding, EmbeddingError, FrameObservation, EMBEDDING_DIM};
pub use extractor::{ExtractError, FaceExtractor};
pub use frame::{DecodeError, Frame};
pub use liveness::{LivenessConfig, LivenessVerdict};
pub use matcher::{IdentityRecord, MatchOutcome};
pub use quality::{BestFrame, SelectionError};
pub use similarity::{cosine_distance, cosine_similarity, SimilarityError};
