//! Weighted Reciprocal Rank Fusion.
//!
//! Fuses the semantic and BM25 ranked lists rank-only:
//! `rrf(c) = w_s / (k + rank_semantic(c)) + w_b / (k + rank_bm25(c))`
//! with a chunk missing from one list contributing nothing for that
//! term. Based on Cormack, Clarke, Buettcher (2009).

use std::collections::HashMap;

/// Configuration for weighted RRF.
#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    /// The `k` constant; higher values flatten the rank curve.
    /// 60 is the value recommended in the original paper.
    pub k: u32,
    /// Weight of the semantic list. The BM25 list gets `1 - semantic_weight`.
    pub semantic_weight: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: 60,
            semantic_weight: 0.7,
        }
    }
}

impl RrfConfig {
    /// Creates a config with the given `k` and semantic weight.
    #[must_use]
    pub const fn new(k: u32, semantic_weight: f64) -> Self {
        Self { k, semantic_weight }
    }
}

/// Fuses two ranked chunk-id lists into `(chunk_id, rrf_score)` sorted
/// by score descending, ties broken by id for determinism.
///
/// Ranks are 1-indexed inside the formula: the top item of a list
/// contributes `w / (k + 1)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn weighted_rrf(
    semantic_ranked: &[String],
    bm25_ranked: &[String],
    config: &RrfConfig,
) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let bm25_weight = 1.0 - config.semantic_weight;

    for (rank, chunk_id) in semantic_ranked.iter().enumerate() {
        let contribution = config.semantic_weight / f64::from(config.k + rank as u32 + 1);
        *scores.entry(chunk_id.as_str()).or_insert(0.0) += contribution;
    }
    for (rank, chunk_id) in bm25_ranked.iter().enumerate() {
        let contribution = bm25_weight / f64::from(config.k + rank as u32 + 1);
        *scores.entry(chunk_id.as_str()).or_insert(0.0) += contribution;
    }

    let mut results: Vec<(String, f64)> = scores
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_item_in_both_lists_wins() {
        let semantic = ids(&["a", "b", "c"]);
        let bm25 = ids(&["b", "d"]);
        let fused = weighted_rrf(&semantic, &bm25, &RrfConfig::default());
        assert_eq!(fused[0].0, "b");
        // b = 0.7/62 + 0.3/61
        let expected = 0.7 / 62.0 + 0.3 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_from_one_list_contributes_zero() {
        let semantic = ids(&["a"]);
        let bm25 = ids(&["b"]);
        let fused = weighted_rrf(&semantic, &bm25, &RrfConfig::default());
        let a = fused.iter().find(|(id, _)| id == "a").unwrap().1;
        let b = fused.iter().find(|(id, _)| id == "b").unwrap().1;
        assert!((a - 0.7 / 61.0).abs() < 1e-12);
        assert!((b - 0.3 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_semantic_weight_dominates_by_default() {
        // Top of semantic beats top of bm25 when each appears in only
        // one list, because w_s > w_b.
        let semantic = ids(&["sem"]);
        let bm25 = ids(&["lex"]);
        let fused = weighted_rrf(&semantic, &bm25, &RrfConfig::default());
        assert_eq!(fused[0].0, "sem");
    }

    #[test]
    fn test_equal_weights_tie_broken_by_id() {
        let config = RrfConfig::new(60, 0.5);
        let fused = weighted_rrf(&ids(&["x"]), &ids(&["a"]), &config);
        assert_eq!(fused[0].0, "a");
        assert!((fused[0].1 - fused[1].1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_lists() {
        let fused = weighted_rrf(&[], &[], &RrfConfig::default());
        assert!(fused.is_empty());
    }

    #[test]
    fn test_k_flattens_rank_gap() {
        let semantic = ids(&["a", "b"]);
        let low_k = weighted_rrf(&semantic, &[], &RrfConfig::new(1, 1.0));
        let high_k = weighted_rrf(&semantic, &[], &RrfConfig::new(100, 1.0));
        let gap_low = low_k[0].1 - low_k[1].1;
        let gap_high = high_k[0].1 - high_k[1].1;
        assert!(gap_low > gap_high);
    }
}
