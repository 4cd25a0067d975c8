//! Hybrid retrieval with domain reranking and calibrated uncertainty.
//!
//! Stage 1 queries both stores and fuses their ranked lists with
//! weighted RRF; stage 2 reranks by domain signals; stage 3 aggregates
//! a confidence and decides whether the result is trustworthy. A
//! single store failing degrades the query (`degraded_retrieval`)
//! instead of failing it; only both stores failing raises.

mod rerank;
mod rrf;

pub use rerank::{
    QueryContext, RerankedCandidate, WEIGHT_EVIDENCE, WEIGHT_ISSUE, WEIGHT_REGION, WEIGHT_RRF,
    WEIGHT_TEMPORAL, current_year, rerank,
};
pub use rrf::{RrfConfig, weighted_rrf};

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{EngineConfig, MIN_CANDIDATE_COUNT, RetrievalConfig};
use crate::core::{DocumentChunk, EvidenceKind, IssueKind};
use crate::embedding::Embedder;
use crate::error::{Result, RetrievalError};
use crate::index::{IndexLayer, SearchFilters, tokenize};

/// One retrieved chunk with its full score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    /// The chunk itself.
    pub chunk: DocumentChunk,
    /// Cosine similarity from the semantic store, when it ranked there.
    pub semantic_score: Option<f32>,
    /// BM25 score from the sparse store, when it ranked there.
    pub bm25_score: Option<f64>,
    /// Fused RRF score.
    pub rrf_score: f64,
    /// Final reranked score in [0, 1].
    pub final_score: f64,
}

/// Machine tag plus human sentence for an uncertain result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UncertaintyReason {
    /// Machine-readable tag (`empty_corpus`, `no_filter_match`,
    /// `low_similarity`, `low_confidence`, `sparse_candidates`,
    /// `degraded_retrieval`).
    pub tag: String,
    /// Human-readable sentence.
    pub message: String,
}

impl UncertaintyReason {
    fn new(tag: &str, message: impl Into<String>) -> Self {
        Self {
            tag: tag.to_string(),
            message: message.into(),
        }
    }
}

/// A ranked result set with aggregate confidence.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    /// Reranked chunks, best first, at most `final_top_k`.
    pub results: Vec<ScoredChunk>,
    /// Mean final score of the returned chunks, in [0, 1].
    pub confidence: f64,
    /// Whether the result should not be trusted on its own.
    pub is_uncertain: bool,
    /// Why, when `is_uncertain`.
    pub uncertainty_reason: Option<UncertaintyReason>,
}

impl RetrievalResult {
    fn empty(reason: UncertaintyReason) -> Self {
        Self {
            results: Vec::new(),
            confidence: 0.0,
            is_uncertain: true,
            uncertainty_reason: Some(reason),
        }
    }

    /// Distinct case references across the returned chunks.
    #[must_use]
    pub fn case_references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .results
            .iter()
            .map(|r| r.chunk.case_reference.clone())
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}

/// Hybrid retriever over the index layer.
#[derive(Debug, Clone)]
pub struct Retriever {
    config: RetrievalConfig,
    issue_keywords: BTreeMap<IssueKind, Vec<String>>,
    evidence_keywords: BTreeMap<EvidenceKind, Vec<String>>,
}

impl Retriever {
    /// Creates a retriever from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.retrieval,
            issue_keywords: config.issue_keywords.clone(),
            evidence_keywords: config.evidence_keywords.clone(),
        }
    }

    /// Builds a query context from free text (CLI path).
    #[must_use]
    pub fn context_for_text(&self, query: &str, region: Option<String>) -> QueryContext {
        QueryContext::from_query_text(query, &self.issue_keywords, &self.evidence_keywords, region)
    }

    /// Runs the full retrieve-fuse-rerank pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::AllStoresFailed`] only when neither
    /// store produced a usable ranked list; single-store failures
    /// degrade the result instead.
    pub async fn retrieve(
        &self,
        index: &IndexLayer,
        embedder: &dyn Embedder,
        query: &str,
        ctx: &QueryContext,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<RetrievalResult> {
        if index.chunk_count()? == 0 {
            return Ok(RetrievalResult::empty(UncertaintyReason::new(
                "empty_corpus",
                "The corpus contains no ingested decisions.",
            )));
        }

        let initial_k = self.config.initial_retrieval_k;
        let mut degraded: Option<String> = None;

        // Semantic leg: embed, then nearest-neighbour. A failure in
        // either step degrades to sparse-only.
        let semantic_hits: Vec<(String, f32)> = match embedder.embed(query).await {
            Ok(embedding) => match index.search_semantic(&embedding, initial_k, filters) {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "semantic store failed, degrading to sparse-only");
                    degraded = Some(format!("semantic store failed: {e}"));
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "query embedding failed, degrading to sparse-only");
                degraded = Some(format!("query embedding failed: {e}"));
                Vec::new()
            }
        };

        // Sparse leg.
        let sparse_hits: Vec<(String, f64)> =
            match index.search_sparse(&tokenize(query), initial_k, filters) {
                Ok(hits) => hits,
                Err(e) => {
                    if let Some(prior) = degraded {
                        return Err(RetrievalError::AllStoresFailed {
                            reason: format!("{prior}; sparse store failed: {e}"),
                        }
                        .into());
                    }
                    warn!(error = %e, "sparse store failed, degrading to semantic-only");
                    degraded = Some(format!("sparse store failed: {e}"));
                    Vec::new()
                }
            };

        if semantic_hits.is_empty() && sparse_hits.is_empty() {
            let reason = if degraded.is_some() {
                UncertaintyReason::new(
                    "degraded_retrieval",
                    "Retrieval ran in degraded mode and found nothing.",
                )
            } else if filters.is_empty() {
                UncertaintyReason::new(
                    "no_results",
                    "Neither store returned candidates for this query.",
                )
            } else {
                UncertaintyReason::new(
                    "no_filter_match",
                    "No indexed chunks match the requested filters.",
                )
            };
            return Ok(RetrievalResult::empty(reason));
        }

        // Stage 1: fuse.
        let semantic_ranked: Vec<String> = semantic_hits.iter().map(|(id, _)| id.clone()).collect();
        let sparse_ranked: Vec<String> = sparse_hits.iter().map(|(id, _)| id.clone()).collect();
        let fused = weighted_rrf(
            &semantic_ranked,
            &sparse_ranked,
            &RrfConfig::new(self.config.rrf_k, self.config.semantic_weight),
        );

        let semantic_scores: HashMap<&str, f32> = semantic_hits
            .iter()
            .map(|(id, s)| (id.as_str(), *s))
            .collect();
        let sparse_scores: HashMap<&str, f64> = sparse_hits
            .iter()
            .map(|(id, s)| (id.as_str(), *s))
            .collect();

        // Stage 2: rerank.
        let mut candidates: Vec<(DocumentChunk, f64)> = Vec::with_capacity(fused.len());
        for (chunk_id, rrf_score) in &fused {
            if let Some(chunk) = index.get_chunk(chunk_id)? {
                candidates.push((chunk, *rrf_score));
            }
        }
        let candidate_count = candidates.len();
        let reranked = rerank(candidates, ctx, &self.issue_keywords, &self.evidence_keywords);

        let results: Vec<ScoredChunk> = reranked
            .into_iter()
            .take(top_k)
            .map(|c| {
                let semantic_score = semantic_scores.get(c.chunk.chunk_id.as_str()).copied();
                let bm25_score = sparse_scores.get(c.chunk.chunk_id.as_str()).copied();
                ScoredChunk {
                    semantic_score,
                    bm25_score,
                    rrf_score: c.rrf_score,
                    final_score: c.final_score,
                    chunk: c.chunk,
                }
            })
            .collect();

        // Stage 3: confidence and uncertainty.
        #[allow(clippy::cast_precision_loss)]
        let confidence = if results.is_empty() {
            0.0
        } else {
            (results.iter().map(|r| r.final_score).sum::<f64>() / results.len() as f64)
                .clamp(0.0, 1.0)
        };

        let top_similarity = results
            .iter()
            .filter_map(|r| r.semantic_score)
            .fold(f32::NEG_INFINITY, f32::max);

        let reason = if let Some(detail) = degraded {
            Some(UncertaintyReason::new(
                "degraded_retrieval",
                format!("One retrieval store was unavailable: {detail}."),
            ))
        } else if top_similarity.is_finite()
            && f64::from(top_similarity) < self.config.min_similarity_threshold
        {
            Some(UncertaintyReason::new(
                "low_similarity",
                format!(
                    "Best semantic similarity {top_similarity:.2} is below the \
                     {:.2} threshold; the corpus has nothing close.",
                    self.config.min_similarity_threshold
                ),
            ))
        } else if confidence < self.config.min_confidence_threshold {
            Some(UncertaintyReason::new(
                "low_confidence",
                format!(
                    "Aggregate confidence {confidence:.2} is below the {:.2} threshold.",
                    self.config.min_confidence_threshold
                ),
            ))
        } else if candidate_count < MIN_CANDIDATE_COUNT {
            Some(UncertaintyReason::new(
                "sparse_candidates",
                format!("Only {candidate_count} candidates survived filtering."),
            ))
        } else {
            None
        };

        debug!(
            results = results.len(),
            confidence,
            uncertain = reason.is_some(),
            "retrieval complete"
        );

        Ok(RetrievalResult {
            results,
            confidence,
            is_uncertain: reason.is_some(),
            uncertainty_reason: reason,
        })
    }
}
