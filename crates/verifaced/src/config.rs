use std::path::PathBuf;

use veriface_core::{DecisionPolicy, LivenessConfig};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Cosine distance below which two embeddings are the same person.
    pub same_person_threshold: f32,
    /// Upper bound of the ambiguous band that triggers a step-up factor.
    pub step_up_ceiling: f32,
    /// Minimum frames per liveness evaluation.
    pub liveness_min_frames: usize,
    /// Static-replay variance floor. Calibration-sensitive — observed
    /// deployments range from 3.0 to 100.0 depending on sensor noise;
    /// measure genuine sessions on the target camera before raising it.
    pub liveness_min_variance: f32,
    /// Variance indicating pronounced natural motion.
    pub liveness_high_variance: f32,
    /// Composite score a sequence must reach to count as live.
    pub liveness_pass_threshold: f32,
    /// Whether failed verifications feed the per-subject lockout.
    pub rate_limit_enabled: bool,
}

impl Config {
    /// Load configuration from `VERIFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("veriface");

        let db_path = std::env::var("VERIFACE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("identities.db"));

        Self {
            db_path,
            same_person_threshold: env_f32("VERIFACE_SAME_PERSON_THRESHOLD", 0.35),
            step_up_ceiling: env_f32("VERIFACE_STEP_UP_CEILING", 0.45),
            liveness_min_frames: env_usize("VERIFACE_LIVENESS_MIN_FRAMES", 10),
            liveness_min_variance: env_f32("VERIFACE_LIVENESS_MIN_VARIANCE", 3.0),
            liveness_high_variance: env_f32("VERIFACE_LIVENESS_HIGH_VARIANCE", 10.0),
            liveness_pass_threshold: env_f32("VERIFACE_LIVENESS_PASS_THRESHOLD", 0.7),
            rate_limit_enabled: std::env::var("VERIFACE_RATE_LIMIT_ENABLED")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            same_person_threshold: self.same_person_threshold,
            step_up_ceiling: self.step_up_ceiling,
        }
    }

    pub fn liveness_config(&self) -> LivenessConfig {
        LivenessConfig {
            min_frames: self.liveness_min_frames,
            min_variance: self.liveness_min_variance,
            high_variance: self.liveness_high_variance,
            pass_threshold: self.liveness_pass_threshold,
            ..LivenessConfig::default()
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
