use std::cmp::Ordering;

use crate::{Embedding, GalleryIndex};

/// Cosine similarity between two embeddings.
///
/// Sums are accumulated in f64, so f32 inputs can neither overflow nor underflow
/// the squared norms. Returns `None` (the invalid-score marker) when either
/// embedding has zero norm or has non-finite components. Callers must treat such
/// a pair as never being the best match.
///
/// # Panics
///
/// If the embeddings have different dimensions.
pub fn similarity(a: &Embedding, b: &Embedding) -> Option<f32> {
    assert_eq!(
        a.dim(),
        b.dim(),
        "cannot compare embeddings of different dimensions"
    );

    let (mut dot, mut sq_a, mut sq_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.vector.iter().zip(b.vector.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        sq_a += x * x;
        sq_b += y * y;
    }
    if sq_a == 0.0 || sq_b == 0.0 {
        return None;
    }

    let score = (dot / (sq_a.sqrt() * sq_b.sqrt())) as f32;
    score.is_finite().then_some(score)
}

/// One gallery entry scored against a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMatch<'g> {
    pub score: f32,
    pub label: &'g str,
}

/// Gallery matches for a single probe, best first.
#[derive(Debug, Default)]
pub struct Ranking<'g> {
    pub matches: Vec<RankedMatch<'g>>,
    /// Pairs excluded because the similarity was undefined.
    pub degenerate: usize,
}

impl<'g> Ranking<'g> {
    pub fn top(&self, n: usize) -> &[RankedMatch<'g>] {
        &self.matches[..n.min(self.matches.len())]
    }

    /// Does `label` appear among the first `n` matches?
    pub fn hit(&self, label: &str, n: usize) -> bool {
        self.top(n).iter().any(|m| m.label == label)
    }
}

/// Score `probe` against every gallery entry and sort by score descending.
///
/// The sort is stable, so equal scores keep gallery order.
pub fn rank<'g>(gallery: &'g GalleryIndex, probe: &Embedding) -> Ranking<'g> {
    let mut ranking = Ranking {
        matches: Vec::with_capacity(gallery.len()),
        degenerate: 0,
    };
    for entry in gallery {
        match similarity(probe, &entry.embedding) {
            Some(score) => ranking.matches.push(RankedMatch {
                score,
                label: &entry.label,
            }),
            None => ranking.degenerate += 1,
        }
    }
    ranking.matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking
}

/// Rank-1 fast path: keep only the single best match.
///
/// Agrees with `rank(..).top(1)`: the earliest entry among equal top scores wins.
pub fn best_match<'g>(gallery: &'g GalleryIndex, probe: &Embedding) -> Ranking<'g> {
    let mut degenerate = 0;
    let best = gallery
        .iter()
        .filter_map(|entry| match similarity(probe, &entry.embedding) {
            Some(score) => Some(RankedMatch {
                score,
                label: &entry.label,
            }),
            None => {
                degenerate += 1;
                None
            }
        })
        .fold(None, |acc: Option<RankedMatch<'g>>, m| match acc {
            Some(best) if m.score.total_cmp(&best.score) != Ordering::Greater => Some(best),
            _ => Some(m),
        });

    Ranking {
        matches: best.into_iter().collect(),
        degenerate,
    }
}
