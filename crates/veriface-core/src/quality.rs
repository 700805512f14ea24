//! Frame quality selection.
//!
//! Callers submit several redundant frames per request specifically to
//! tolerate individual detection failures; this module picks the single
//! detection that best represents the subject. Selection is pure — the
//! per-frame extraction calls happened upstream.

use thiserror::Error;

use crate::embedding::{DetectionResult, FrameObservation};

/// Sharpness assumed when the producer did not compute one. Chosen so
/// detector confidence (scaled ×100) still dominates the ranking.
pub const DEFAULT_SHARPNESS: f32 = 100.0;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("no valid face detected in any frame")]
    NoFaceDetected,
}

/// The winning detection and where it came from.
#[derive(Debug, Clone)]
pub struct BestFrame {
    pub detection: DetectionResult,
    /// Index into the submitted frame sequence.
    pub frame_index: usize,
    pub quality_score: f32,
}

/// Quality heuristic: `confidence * 100 + sharpness`.
fn quality_score(detection: &DetectionResult) -> f32 {
    detection.confidence * 100.0 + detection.sharpness.unwrap_or(DEFAULT_SHARPNESS)
}

/// Select the observation maximizing the quality score.
///
/// Frames with no face and frames whose extraction failed are skipped
/// entirely; they do not count toward the "at least one" requirement.
/// Ties break to the earliest frame (strict `>` comparison).
pub fn select_best(observations: &[FrameObservation]) -> Result<BestFrame, SelectionError> {
    let mut best: Option<BestFrame> = None;

    for (idx, obs) in observations.iter().enumerate() {
        let FrameObservation::Face(detection) = obs else {
            continue;
        };

        let score = quality_score(detection);
        let is_better = match &best {
            None => true,
            Some(prev) => score > prev.quality_score,
        };
        if is_better {
            best = Some(BestFrame {
                detection: detection.clone(),
                frame_index: idx,
                quality_score: score,
            });
        }
    }

    best.ok_or(SelectionError::NoFaceDetected)
}
