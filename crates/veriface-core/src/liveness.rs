//! Anti-spoofing liveness scoring via temporal pixel variance.
//!
//! A static photograph or a frozen injected frame produces near-identical
//! pixel intensities across consecutive frames. A live subject exhibits
//! natural micro-motion — head sway, blinks, lighting flicker — that
//! shows up as frame-to-frame intensity change even when the subject
//! holds still.
//!
//! The detector combines two independent signals: a challenge-passed
//! flag asserted by an external challenge-response mechanism (blink or
//! head-turn detection on the client — deliberately not re-verified
//! here), and the sequence variance computed from the frames themselves.
//! The variance check cannot be bypassed by the challenge flag alone.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs, frozen replay frames, static
//!   injected images.
//! - **Does not block:** Video replay with natural motion, 3D masks, or
//!   a compromised client asserting a false challenge result together
//!   with a moving capture.

use crate::frame::Frame;
use image::imageops::{self, FilterType};

/// Liveness thresholds and score weights, injected per evaluation.
///
/// All fields are fixed calibration constants, not learned state — the
/// detector itself is stateless across requests.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Minimum frames required for a temporal baseline.
    pub min_frames: usize,
    /// Keep every `frame_stride`-th frame before pairwise differencing.
    pub frame_stride: usize,
    /// Square resolution frames are downscaled to before differencing.
    pub downscale: u32,
    /// Sequence variance below this classifies the input as a static
    /// replay. Calibration-sensitive: observed deployments range from
    /// 3.0 (indoor webcam) to 100.0 (noisy sensors) — measure the
    /// variance of genuine sessions on the target camera and set the
    /// floor below their 5th percentile.
    pub min_variance: f32,
    /// Variance above this indicates pronounced natural motion.
    pub high_variance: f32,
    /// Score granted for a caller-asserted passed challenge.
    pub base_pass_score: f32,
    /// Boost added when variance exceeds `high_variance`.
    pub boost_high: f32,
    /// Boost added when variance only exceeds `min_variance`.
    pub boost_moderate: f32,
    /// Fixed score reported for static-replay rejections.
    pub static_penalty_score: f32,
    /// Verdict is live iff the final score reaches this.
    pub pass_threshold: f32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            min_frames: 10,
            frame_stride: 2,
            downscale: 100,
            min_variance: 3.0,
            high_variance: 10.0,
            base_pass_score: 0.6,
            boost_high: 0.3,
            boost_moderate: 0.15,
            static_penalty_score: 0.1,
            pass_threshold: 0.7,
        }
    }
}

/// Outcome of one liveness evaluation. Derived per request, never
/// persisted. A negative verdict is an ordinary result, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessVerdict {
    pub is_live: bool,
    /// Composite score in [0, 1].
    pub score: f32,
}

impl LivenessConfig {
    /// Evaluate a chronological frame sequence against the config.
    ///
    /// Rejections, in order: challenge not passed `(false, 0.0)`; too few
    /// frames `(false, 0.0)`; sub-floor variance `(false, static penalty)`.
    /// Otherwise the score starts at the base pass value, gains a boost
    /// tier from variance, and is clamped to 1.0.
    pub fn evaluate(&self, frames: &[Frame], challenge_passed: bool) -> LivenessVerdict {
        if !challenge_passed {
            return LivenessVerdict {
                is_live: false,
                score: 0.0,
            };
        }

        if frames.len() < self.min_frames {
            return LivenessVerdict {
                is_live: false,
                score: 0.0,
            };
        }

        let variance = self.sequence_variance(frames);
        if variance < self.min_variance {
            return LivenessVerdict {
                is_live: false,
                score: self.static_penalty_score,
            };
        }

        let mut score = self.base_pass_score;
        if variance > self.high_variance {
            score += self.boost_high;
        } else if variance > self.min_variance {
            score += self.boost_moderate;
        }
        let score = score.min(1.0);

        LivenessVerdict {
            is_live: score >= self.pass_threshold,
            score,
        }
    }

    /// Mean absolute intensity difference across consecutive subsampled
    /// frame pairs, on grayscale thumbnails. Defined as 0.0 when fewer
    /// than two frames survive subsampling.
    fn sequence_variance(&self, frames: &[Frame]) -> f32 {
        let stride = self.frame_stride.max(1);
        let selected: Vec<&Frame> = frames.iter().step_by(stride).collect();
        if selected.len() < 2 {
            return 0.0;
        }

        let thumbnails: Vec<_> = selected.iter().map(|f| self.thumbnail(f)).collect();

        let mut total = 0.0f32;
        let mut pairs = 0usize;
        for pair in thumbnails.windows(2) {
            total += mean_abs_diff(&pair[0], &pair[1]);
            pairs += 1;
        }

        total / pairs as f32
    }

    fn thumbnail(&self, frame: &Frame) -> image::GrayImage {
        let gray = imageops::grayscale(frame.as_rgb());
        imageops::resize(&gray, self.downscale, self.downscale, FilterType::Triangle)
    }
}

fn mean_abs_diff(a: &image::GrayImage, b: &image::GrayImage) -> f32 {
    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    sum as f32 / a.as_raw().len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame filled with a single intensity.
    fn flat_frame(level: u8) -> Frame {
        Frame::from_rgb(32, 32, vec![level; 32 * 32 * 3]).unwrap()
    }

    fn config() -> LivenessConfig {
        LivenessConfig::default()
    }

    #[test]
    fn failed_challenge_rejects_regardless_of_frames() {
        // Strongly varying sequence — still rejected with score 0.0
        let frames: Vec<Frame> = (0..12u8).map(|i| flat_frame(i * 20)).collect();
        let verdict = config().evaluate(&frames, false);
        assert_eq!(
            verdict,
            LivenessVerdict {
                is_live: false,
                score: 0.0
            }
        );
    }

    #[test]
    fn too_few_frames_rejects() {
        let frames: Vec<Frame> = (0..9u8).map(|i| flat_frame(i * 25)).collect();
        let verdict = config().evaluate(&frames, true);
        assert_eq!(
            verdict,
            LivenessVerdict {
                is_live: false,
                score: 0.0
            }
        );
    }

    #[test]
    fn static_sequence_gets_penalty_score() {
        let frames: Vec<Frame> = (0..10).map(|_| flat_frame(128)).collect();
        let verdict = config().evaluate(&frames, true);
        assert!(!verdict.is_live);
        assert!((verdict.score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn pronounced_motion_passes_with_high_boost() {
        // Subsampled frames (0, 2, 4, ...) differ by 40 intensity levels
        // per pair — well above the high-variance threshold.
        let frames: Vec<Frame> = (0..10u8).map(|i| flat_frame(i * 20)).collect();
        let verdict = config().evaluate(&frames, true);
        assert!(verdict.is_live);
        assert!((verdict.score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn moderate_motion_passes_with_small_boost() {
        // Pairwise thumbnail difference of ~6 levels: above the floor,
        // below the high tier.
        let frames: Vec<Frame> = (0..10u8).map(|i| flat_frame(100 + (i / 2) * 6)).collect();
        let verdict = config().evaluate(&frames, true);
        assert!(verdict.is_live);
        assert!((verdict.score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn alternating_frames_hidden_by_stride_are_static() {
        // Flicker on every odd frame: stride-2 subsampling sees only the
        // even frames, which are identical.
        let frames: Vec<Frame> = (0..10u8)
            .map(|i| flat_frame(if i % 2 == 0 { 100 } else { 200 }))
            .collect();
        let verdict = config().evaluate(&frames, true);
        assert!(!verdict.is_live);
        assert!((verdict.score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn score_is_clamped_to_one() {
        let cfg = LivenessConfig {
            base_pass_score: 0.9,
            boost_high: 0.5,
            ..LivenessConfig::default()
        };
        let frames: Vec<Frame> = (0..10u8).map(|i| flat_frame(i * 20)).collect();
        let verdict = cfg.evaluate(&frames, true);
        assert!(verdict.is_live);
        assert!((verdict.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn variance_zero_when_subsampling_leaves_one_frame() {
        // min_frames lowered so the guard does not trip first: a single
        // surviving subsample defines variance as 0.0 ⇒ static penalty.
        let cfg = LivenessConfig {
            min_frames: 1,
            frame_stride: 4,
            ..LivenessConfig::default()
        };
        let frames: Vec<Frame> = (0..3u8).map(|i| flat_frame(i * 50)).collect();
        let verdict = cfg.evaluate(&frames, true);
        assert!(!verdict.is_live);
        assert!((verdict.score - cfg.static_penalty_score).abs() < 1e-6);
    }

    #[test]
    fn mean_abs_diff_known_geometry() {
        let a = flat_frame(10);
        let b = flat_frame(50);
        let cfg = config();
        let diff = mean_abs_diff(&cfg.thumbnail(&a), &cfg.thumbnail(&b));
        assert!((diff - 40.0).abs() < 1e-3);
    }
}
