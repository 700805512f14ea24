//! Request-level orchestration of the verification pipeline.
//!
//! One method per operation the transport front-end exposes. Transport,
//! request validation, and authentication of the caller itself stay
//! outside; this layer owns composition order (liveness gate first, then
//! extraction, then comparison) and the rate-limit bookkeeping.
//!
//! Denials, failed liveness, and low scores are ordinary results here —
//! `Err` is reserved for malformed input, an unavailable model, and
//! store faults.

use serde::Serialize;
use tokio::sync::Mutex;

use veriface_core::{
    quality, Decision, DecisionPolicy, Embedding, Frame, FrameObservation, LivenessConfig,
    SelectionError,
};

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use crate::rate_limiter::RateLimiter;
use crate::store::{IdentityStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("frame decode error: {0}")]
    Decode(#[from] veriface_core::DecodeError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Similarity(#[from] veriface_core::SimilarityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("rate limited: {0}")]
    RateLimited(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub is_live: bool,
    pub liveness_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorReport {
    pub vector: Vec<f32>,
    /// Index of the winning frame in the submitted sequence.
    pub frame_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub similarity: f32,
    pub distance: f32,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub is_live: bool,
    pub liveness_score: f32,
    pub similarity: f32,
    pub distance: f32,
    pub matched: bool,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyReport {
    pub success: bool,
    pub external_id: Option<String>,
    pub kind: Option<String>,
    pub similarity: f32,
    pub distance: f32,
    pub is_live: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterReport {
    pub face_id: String,
    pub external_id: String,
}

/// The verification backend behind the transport layer.
pub struct VerificationService {
    engine: EngineHandle,
    store: IdentityStore,
    policy: DecisionPolicy,
    liveness: LivenessConfig,
    /// `None` when the lockout is disabled by configuration.
    rate_limiter: Option<Mutex<RateLimiter>>,
}

impl VerificationService {
    pub fn new(engine: EngineHandle, store: IdentityStore, config: &Config) -> Self {
        Self {
            engine,
            store,
            policy: config.decision_policy(),
            liveness: config.liveness_config(),
            rate_limiter: config
                .rate_limit_enabled
                .then(|| Mutex::new(RateLimiter::new())),
        }
    }

    /// Liveness evaluation over a frame sequence.
    ///
    /// Decoding is all-or-nothing: a malformed frame fails the request,
    /// since silently skipping it would change the temporal basis of the
    /// variance computation.
    pub fn check_liveness(
        &self,
        frames: &[Vec<u8>],
        challenge_passed: bool,
    ) -> Result<LivenessReport, ServiceError> {
        let decoded = decode_frames(frames)?;
        let verdict = self.liveness.evaluate(&decoded, challenge_passed);
        tracing::info!(
            frames = frames.len(),
            is_live = verdict.is_live,
            score = verdict.score,
            "liveness check complete"
        );
        Ok(LivenessReport {
            is_live: verdict.is_live,
            liveness_score: verdict.score,
        })
    }

    /// Extract the identity signature from the best-quality frame.
    ///
    /// Unlike liveness, decoding is per-frame here: an undecodable frame
    /// is recorded as a skipped observation and the rest still compete.
    pub async fn extract_vector(&self, frames: &[Vec<u8>]) -> Result<VectorReport, ServiceError> {
        let observations = self.observe_frames(frames).await?;
        let best = quality::select_best(&observations)?;
        tracing::info!(
            frame_index = best.frame_index,
            quality = best.quality_score,
            "extract: best frame selected"
        );
        Ok(VectorReport {
            vector: best.detection.embedding.values().to_vec(),
            frame_index: best.frame_index,
        })
    }

    /// Two-way embedding comparison.
    pub fn compare_vectors(
        &self,
        a: &Embedding,
        b: &Embedding,
    ) -> Result<ComparisonReport, ServiceError> {
        let similarity = veriface_core::cosine_similarity(a, b)?;
        let distance = 1.0 - similarity;
        Ok(ComparisonReport {
            similarity,
            distance,
            matched: self.policy.is_match(distance),
        })
    }

    /// Full verification pipeline: liveness gate, best-frame extraction,
    /// comparison against the subject's stored embedding, decision.
    pub async fn verify(
        &self,
        subject: &str,
        frames: &[Vec<u8>],
        challenge_passed: bool,
        stored: &Embedding,
    ) -> Result<VerifyReport, ServiceError> {
        tracing::info!(subject, frames = frames.len(), "verify requested");

        if let Some(limiter) = &self.rate_limiter {
            limiter
                .lock()
                .await
                .check(subject)
                .map_err(ServiceError::RateLimited)?;
        }

        let decoded = decode_frames(frames)?;

        let verdict = self.liveness.evaluate(&decoded, challenge_passed);
        if !verdict.is_live {
            let report = VerifyReport {
                is_live: false,
                liveness_score: verdict.score,
                similarity: 0.0,
                distance: 1.0,
                matched: false,
                decision: self.policy.decide_verification(verdict, None),
            };
            self.record_outcome(subject, report.decision).await;
            tracing::info!(subject, score = verdict.score, "verify: liveness failed");
            return Ok(report);
        }

        let observations = self.engine.extract_batch(decoded).await?;
        let report = match quality::select_best(&observations) {
            Ok(best) => {
                let similarity =
                    veriface_core::cosine_similarity(&best.detection.embedding, stored)?;
                let distance = 1.0 - similarity;
                VerifyReport {
                    is_live: true,
                    liveness_score: verdict.score,
                    similarity,
                    distance,
                    matched: self.policy.is_match(distance),
                    decision: self.policy.decide_verification(verdict, Some(distance)),
                }
            }
            // Live subject but no usable embedding — deny, not an error
            Err(SelectionError::NoFaceDetected) => VerifyReport {
                is_live: true,
                liveness_score: verdict.score,
                similarity: 0.0,
                distance: 1.0,
                matched: false,
                decision: self.policy.decide_verification(verdict, None),
            },
        };

        self.record_outcome(subject, report.decision).await;
        tracing::info!(
            subject,
            decision = %report.decision,
            similarity = report.similarity,
            distance = report.distance,
            "verify complete"
        );
        Ok(report)
    }

    /// Identify the subject against every registered identity.
    pub async fn identify(
        &self,
        frames: &[Vec<u8>],
        challenge_passed: bool,
    ) -> Result<IdentifyReport, ServiceError> {
        tracing::info!(frames = frames.len(), "identify requested");

        let decoded = decode_frames(frames)?;

        let verdict = self.liveness.evaluate(&decoded, challenge_passed);
        if !verdict.is_live {
            return Ok(IdentifyReport {
                success: false,
                external_id: None,
                kind: None,
                similarity: 0.0,
                distance: 1.0,
                is_live: false,
            });
        }

        let observations = self.engine.extract_batch(decoded).await?;
        let best = match quality::select_best(&observations) {
            Ok(best) => best,
            Err(SelectionError::NoFaceDetected) => {
                return Ok(IdentifyReport {
                    success: false,
                    external_id: None,
                    kind: None,
                    similarity: 0.0,
                    distance: 1.0,
                    is_live: true,
                });
            }
        };

        let snapshot = self.store.list_all().await?;
        let population = snapshot.len();
        let outcome =
            veriface_core::matcher::find_closest(&best.detection.embedding, &snapshot, &self.policy)?;

        tracing::info!(
            population,
            matched = outcome.is_match(),
            similarity = outcome.similarity,
            distance = outcome.distance,
            "identify complete"
        );

        let (external_id, kind) = match &outcome.matched {
            Some(record) => (Some(record.external_id.clone()), Some(record.kind.clone())),
            None => (None, None),
        };
        Ok(IdentifyReport {
            success: outcome.is_match(),
            external_id,
            kind,
            similarity: outcome.similarity,
            distance: outcome.distance,
            is_live: true,
        })
    }

    /// Register (or re-register) an identity from capture frames.
    pub async fn register(
        &self,
        external_id: &str,
        kind: &str,
        frames: &[Vec<u8>],
    ) -> Result<RegisterReport, ServiceError> {
        tracing::info!(external_id, kind, "register requested");

        let observations = self.observe_frames(frames).await?;
        let best = quality::select_best(&observations)?;

        let face_id = self
            .store
            .upsert(external_id, kind, &best.detection.embedding)
            .await?;

        tracing::info!(external_id, face_id = %face_id, quality = best.quality_score, "registered");
        Ok(RegisterReport {
            face_id,
            external_id: external_id.to_string(),
        })
    }

    /// Remove a registered identity. Returns whether it existed.
    pub async fn remove(&self, external_id: &str) -> Result<bool, ServiceError> {
        let removed = self.store.delete(external_id).await?;
        if removed {
            tracing::info!(external_id, "identity removed");
        } else {
            tracing::warn!(external_id, "identity not found");
        }
        Ok(removed)
    }

    /// Daemon status as JSON.
    pub async fn status(&self) -> Result<String, ServiceError> {
        let registered = self.store.count_all().await?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "registered_identities": registered,
            "same_person_threshold": self.policy.same_person_threshold,
            "step_up_ceiling": self.policy.step_up_ceiling,
        })
        .to_string())
    }

    /// Decode frames leniently and run extraction: undecodable frames
    /// become skipped observations instead of failing the batch.
    async fn observe_frames(
        &self,
        frames: &[Vec<u8>],
    ) -> Result<Vec<FrameObservation>, ServiceError> {
        let mut observations = vec![FrameObservation::NoFace; frames.len()];
        let mut decoded = Vec::with_capacity(frames.len());
        let mut decoded_indices = Vec::with_capacity(frames.len());

        for (idx, bytes) in frames.iter().enumerate() {
            match Frame::decode(bytes) {
                Ok(frame) => {
                    decoded_indices.push(idx);
                    decoded.push(frame);
                }
                Err(err) => observations[idx] = FrameObservation::Failed(err.to_string()),
            }
        }

        let extracted = self.engine.extract_batch(decoded).await?;
        for (idx, obs) in decoded_indices.into_iter().zip(extracted) {
            observations[idx] = obs;
        }
        Ok(observations)
    }

    /// Feed the lockout counter. Step-up outcomes are ambiguous and
    /// count neither way.
    async fn record_outcome(&self, subject: &str, decision: Decision) {
        let Some(limiter) = &self.rate_limiter else {
            return;
        };
        let mut limiter = limiter.lock().await;
        match decision {
            Decision::LoginSuccess => limiter.record_success(subject),
            Decision::Deny => limiter.record_failure(subject),
            Decision::RequireStepUp => {}
        }
    }
}

fn decode_frames(frames: &[Vec<u8>]) -> Result<Vec<Frame>, ServiceError> {
    frames
        .iter()
        .map(|bytes| Frame::decode(bytes).map_err(ServiceError::from))
        .collect()
}
