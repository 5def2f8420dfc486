//! Cosine similarity.

/// Cosine similarity of two equal-length vectors.
///
/// Returns `None` if either vector has zero magnitude, or if a NaN or
/// infinite component makes the result non-finite. Callers decide how to
/// rank such records.
///
/// Lengths are not checked here; the index skips mismatched records before
/// calling this.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !similarity.is_finite() {
        return None;
    }
    // Rounding can push parallel vectors slightly past 1.0
    Some(similarity.clamp(-1.0, 1.0))
}
