//! Cosine similarity over identity embeddings — the sole matching metric.

use thiserror::Error;

use crate::embedding::Embedding;

#[derive(Error, Debug)]
pub enum SimilarityError {
    /// A zero-norm vector has no direction; cosine similarity is
    /// undefined. Indicates a caller or upstream-model defect.
    #[error("degenerate zero-norm embedding")]
    DegenerateVector,
}

/// Cosine similarity: `dot(a, b) / (‖a‖ · ‖b‖)`.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f32, SimilarityError> {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.values().iter().zip(b.values()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::DegenerateVector);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine distance: `1 - similarity`. In [0, 2] for well-formed inputs.
pub fn cosine_distance(a: &Embedding, b: &Embedding) -> Result<f32, SimilarityError> {
    Ok(1.0 - cosine_similarity(a, b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EMBEDDING_DIM;

    fn embedding(f: impl Fn(usize) -> f32) -> Embedding {
        Embedding::new((0..EMBEDDING_DIM).map(f).collect()).unwrap()
    }

    #[test]
    fn self_similarity_is_one() {
        let v = embedding(|i| (i as f32 + 1.0) / EMBEDDING_DIM as f32);
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).unwrap().abs() < 1e-6);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = embedding(|i| (i as f32).sin());
        let b = embedding(|i| (i as f32 * 0.7).cos());
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn magnitude_does_not_matter() {
        let a = embedding(|i| (i as f32 + 1.0).sqrt());
        let scaled = Embedding::new(a.values().iter().map(|v| v * 3.5).collect()).unwrap();
        let sim = cosine_similarity(&a, &scaled).unwrap();
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        let a = embedding(|i| if i % 2 == 0 { 1.0 } else { 0.0 });
        let b = embedding(|i| if i % 2 == 1 { 1.0 } else { 0.0 });
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
        assert!((cosine_distance(&a, &b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_norm_is_degenerate() {
        let zero = embedding(|_| 0.0);
        let v = embedding(|_| 1.0);
        assert!(matches!(
            cosine_similarity(&zero, &v).unwrap_err(),
            SimilarityError::DegenerateVector
        ));
        assert!(matches!(
            cosine_similarity(&v, &zero).unwrap_err(),
            SimilarityError::DegenerateVector
        ));
    }
}
