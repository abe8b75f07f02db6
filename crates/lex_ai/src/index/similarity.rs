/// Euclidean distance over the common prefix of `a` and `b`; callers check
/// dimensions first.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum.sqrt()
}

/// Bounded, strictly decreasing map from L2 distance to `(0, 1]`.
pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}
