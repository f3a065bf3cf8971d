/// Cosine similarity of two embeddings, in `[-1, 1]`.
///
/// `None` when the lengths differ or either vector is empty. A zero-magnitude
/// vector scores `0.0` against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f32, 0.0f32, 0.0f32), |acc, (x, y)| {
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}
