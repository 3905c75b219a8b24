//! Vector similarity utilities for embedding-based matching.

use crate::error::{Error, Result};

/// Cosine similarity between two equal-length vectors.
///
/// Returns a value in [-1, 1]. Zero-norm inputs yield 0.0. A dimension
/// mismatch is an error, never a silent truncation.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "Embedding dimensions must match: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Find the labelled candidate most similar to `query`.
///
/// Candidates whose dimension does not match the query are skipped.
/// Returns `(label, similarity)` of the best match, or None when there are
/// no usable candidates.
pub fn find_most_similar<'a>(
    query: &[f32],
    candidates: &'a [(String, Vec<f32>)],
) -> Option<(&'a str, f32)> {
    let mut best: Option<(&str, f32)> = None;
    for (label, embedding) in candidates {
        let Ok(score) = cosine_similarity(query, embedding) else {
            continue;
        };
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((label.as_str(), score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let a = vec![0.3, -1.2, 4.5, 0.01];
        let b = vec![2.0, 0.5, -0.7, 3.3];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_cosine_bounded() {
        let pairs = [
            (vec![5.0, 5.0, 5.0], vec![0.1, 9.0, -2.0]),
            (vec![-1.0, -1.0], vec![1.0, 1.0]),
            (vec![100.0, 0.0, 0.0], vec![100.0, 1.0, 1.0]),
        ];
        for (a, b) in pairs {
            let sim = cosine_similarity(&a, &b).unwrap();
            assert!((-1.0..=1.0).contains(&sim), "out of bounds: {sim}");
        }
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch_is_error() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        let err = cosine_similarity(&a, &b).unwrap_err();
        assert!(err.to_string().contains("dimensions must match"));
    }

    #[test]
    fn test_find_most_similar() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("orthogonal".to_string(), vec![0.0, 1.0]),
            ("aligned".to_string(), vec![2.0, 0.0]),
            ("opposite".to_string(), vec![-1.0, 0.0]),
        ];
        let (label, score) = find_most_similar(&query, &candidates).unwrap();
        assert_eq!(label, "aligned");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_find_most_similar_skips_mismatched_dimensions() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("bad".to_string(), vec![1.0, 0.0, 0.0]),
            ("good".to_string(), vec![0.5, 0.5]),
        ];
        let (label, _) = find_most_similar(&query, &candidates).unwrap();
        assert_eq!(label, "good");
    }

    #[test]
    fn test_find_most_similar_empty() {
        let query = vec![1.0];
        assert!(find_most_similar(&query, &[]).is_none());
    }
}
