use std::collections::HashMap;

use crate::domain::{EngineHit, FusedHit};

/// Smoothing constant for Reciprocal Rank Fusion.
/// Higher values reduce the weight difference between high and low-ranked
/// items.
pub const RRF_K: f32 = 60.0;

/// Merge ranked result lists using Reciprocal Rank Fusion.
///
/// Each snippet receives `1 / (RRF_K + rank)` from every list it appears in
/// (rank is 1-based); scores are summed. The returned hits are ordered by
/// fused score descending, ties broken by ascending snippet id, truncated to
/// `limit`. `original_scores` carries each engine's raw score in the order
/// the rankings were passed, 0.0 where an engine did not return the snippet.
pub fn rrf_fuse(rankings: &[Vec<EngineHit>], limit: usize) -> Vec<FusedHit> {
    let engines = rankings.len();
    let mut fused: HashMap<String, FusedHit> = HashMap::new();

    for (engine, ranking) in rankings.iter().enumerate() {
        for (rank, hit) in ranking.iter().enumerate() {
            let rrf = 1.0 / (RRF_K + (rank + 1) as f32);
            let entry = fused
                .entry(hit.snippet_id.clone())
                .or_insert_with(|| FusedHit {
                    snippet_id: hit.snippet_id.clone(),
                    score: 0.0,
                    original_scores: vec![0.0; engines],
                });
            entry.score += rrf;
            entry.original_scores[engine] = hit.score;
        }
    }

    let mut results: Vec<FusedHit> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.snippet_id.cmp(&b.snippet_id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> EngineHit {
        EngineHit {
            snippet_id: id.to_string(),
            score,
        }
    }

    #[test]
    fn test_snippet_in_both_lists_wins() {
        let keyword = vec![hit("a", 3.0), hit("b", 2.0)];
        let vector = vec![hit("b", 0.9), hit("c", 0.8)];

        let fused = rrf_fuse(&[keyword, vector], 10);
        assert_eq!(fused[0].snippet_id, "b");
        let expected = 1.0 / (RRF_K + 2.0) + 1.0 / (RRF_K + 1.0);
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let first = vec![hit("z", 1.0)];
        let second = vec![hit("a", 1.0)];

        let fused = rrf_fuse(&[first, second], 10);
        // Same rank in one list each: identical fused score.
        assert!((fused[0].score - fused[1].score).abs() < 1e-6);
        assert_eq!(fused[0].snippet_id, "a");
        assert_eq!(fused[1].snippet_id, "z");
    }

    #[test]
    fn test_scores_are_monotonically_decreasing() {
        let keyword = vec![hit("a", 5.0), hit("b", 4.0), hit("c", 3.0)];
        let vector = vec![hit("c", 0.9), hit("a", 0.5)];

        let fused = rrf_fuse(&[keyword, vector], 10);
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_original_scores_align_with_engine_order() {
        let keyword = vec![hit("a", 7.5)];
        let vector = vec![hit("a", 0.4)];

        let fused = rrf_fuse(&[keyword, vector], 10);
        assert_eq!(fused[0].original_scores, vec![7.5, 0.4]);
    }

    #[test]
    fn test_limit_truncates() {
        let keyword = vec![hit("a", 3.0), hit("b", 2.0), hit("c", 1.0)];
        let fused = rrf_fuse(&[keyword], 2);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_empty_rankings() {
        assert!(rrf_fuse(&[], 5).is_empty());
        assert!(rrf_fuse(&[vec![], vec![]], 5).is_empty());
    }
}
