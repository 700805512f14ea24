//! Closest-match identification over a snapshot of registered identities.

use crate::decision::DecisionPolicy;
use crate::embedding::Embedding;
use crate::similarity::{cosine_similarity, SimilarityError};

/// A registered identity as read from the store. The core only ever sees
/// immutable per-request snapshots; record lifetime belongs to the store.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    /// Caller-assigned unique key (user or admin id in the auth system).
    pub external_id: String,
    /// Caller's category tag, e.g. "USER" or "ADMIN".
    pub kind: String,
    pub embedding: Embedding,
}

/// Result of an identification scan.
///
/// `matched` is populated only when the closest candidate clears the
/// same-person threshold; the similarity/distance of the closest
/// candidate is reported either way for observability. An empty
/// candidate set yields the sentinel distance 1.0 and no match.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub matched: Option<IdentityRecord>,
    pub similarity: f32,
    pub distance: f32,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// Linear scan for the candidate closest to the probe.
///
/// Every candidate is scored — the minimum can occur anywhere, so there
/// is no early exit. O(N) comparisons of 512 components each; a
/// sub-linear index can replace this behind the same contract.
pub fn find_closest(
    probe: &Embedding,
    candidates: &[IdentityRecord],
    policy: &DecisionPolicy,
) -> Result<MatchOutcome, SimilarityError> {
    let mut best: Option<&IdentityRecord> = None;
    let mut min_distance = 1.0f32;
    let mut max_similarity = 0.0f32;

    for candidate in candidates {
        let similarity = cosine_similarity(probe, &candidate.embedding)?;
        let distance = 1.0 - similarity;

        if distance < min_distance {
            min_distance = distance;
            max_similarity = similarity;
            best = Some(candidate);
        }
    }

    let matched = match best {
        Some(record) if policy.is_match(min_distance) => Some(record.clone()),
        _ => None,
    };

    Ok(MatchOutcome {
        matched,
        similarity: max_similarity,
        distance: min_distance,
    })
}
