//! Three-way authentication decisions from cosine distance.

use serde::Serialize;

use crate::liveness::LivenessVerdict;

/// Closed three-state outcome of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    LoginSuccess,
    RequireStepUp,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::LoginSuccess => "LOGIN_SUCCESS",
            Decision::RequireStepUp => "REQUIRE_STEP_UP",
            Decision::Deny => "DENY",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance thresholds shared by verification and identification.
///
/// The step-up band is closed on both ends: a distance of exactly 0.35
/// is not a match (strict `<`) and triggers step-up; 0.45 still triggers
/// step-up; anything above is denied.
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    /// Distances strictly below this are the same person.
    pub same_person_threshold: f32,
    /// Upper bound (inclusive) of the ambiguous step-up band.
    pub step_up_ceiling: f32,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            same_person_threshold: 0.35,
            step_up_ceiling: 0.45,
        }
    }
}

impl DecisionPolicy {
    /// Two-way comparison rule: `distance < same_person_threshold`.
    pub fn is_match(&self, distance: f32) -> bool {
        distance < self.same_person_threshold
    }

    /// Map a distance to the decision table.
    pub fn decide(&self, distance: f32) -> Decision {
        if distance < self.same_person_threshold {
            Decision::LoginSuccess
        } else if distance <= self.step_up_ceiling {
            Decision::RequireStepUp
        } else {
            Decision::Deny
        }
    }

    /// Full verification decision: the liveness gate dominates, then an
    /// absent embedding denies, then the distance bands apply.
    pub fn decide_verification(
        &self,
        verdict: LivenessVerdict,
        distance: Option<f32>,
    ) -> Decision {
        if !verdict.is_live {
            return Decision::Deny;
        }
        match distance {
            Some(d) => self.decide(d),
            None => Decision::Deny,
        }
    }
}
