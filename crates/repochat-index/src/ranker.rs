//! Cosine-similarity ranking.

use crate::types::{ScoredUnit, Unit};

/// Cosine similarity of `a` and `b`.
///
/// `None` when the lengths differ or either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    #[expect(clippy::cast_possible_truncation)]
    let score = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    score.is_finite().then_some(score)
}

/// Rank `candidates` against `query`, best first, keeping at most `top_k`.
///
/// Candidates whose similarity is undefined (zero norm, wrong length) are
/// dropped. Equal scores keep candidate order.
#[must_use]
pub fn rank<'a, I>(query: &[f32], candidates: I, top_k: usize) -> Vec<ScoredUnit>
where
    I: IntoIterator<Item = (&'a Unit, &'a [f32])>,
{
    let mut scored: Vec<(&Unit, f32)> = candidates
        .into_iter()
        .filter_map(|(unit, vector)| cosine_similarity(query, vector).map(|s| (unit, s)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(unit, score)| ScoredUnit {
            unit: unit.clone(),
            score,
        })
        .collect()
}
