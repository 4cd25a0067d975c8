//! Domain-specific reranking of fused candidates.
//!
//! Blends five signals into a final score in [0, 1]:
//! `0.4*issue_match + 0.2*temporal + 0.1*region + 0.2*evidence + 0.1*rrf_norm`.
//! Issue match is the fraction of the query's tagged issues whose
//! keywords appear in the chunk; temporal decays linearly over ten
//! years; region is exact-match; evidence is Jaccard overlap between
//! the query's evidence kinds and a keyword classification of the
//! chunk; the RRF score is min-max normalized across the candidate set.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::config::TEMPORAL_WINDOW_YEARS;
use crate::core::{DocumentChunk, EvidenceKind, IssueKind};

/// Weight of the issue-match component.
pub const WEIGHT_ISSUE: f64 = 0.4;
/// Weight of the temporal-recency component.
pub const WEIGHT_TEMPORAL: f64 = 0.2;
/// Weight of the region-match component.
pub const WEIGHT_REGION: f64 = 0.1;
/// Weight of the evidence-overlap component.
pub const WEIGHT_EVIDENCE: f64 = 0.2;
/// Weight of the normalized RRF component.
pub const WEIGHT_RRF: f64 = 0.1;

/// Query-side context the reranker scores against.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Issue types tagged on the query.
    pub issues: Vec<IssueKind>,
    /// Evidence kinds present on the query side.
    pub evidence_kinds: Vec<EvidenceKind>,
    /// Region the dispute belongs to, when known.
    pub region: Option<String>,
    /// Year "now" for the temporal decay.
    pub current_year: i32,
}

impl QueryContext {
    /// Builds a context from free query text by reverse keyword
    /// matching, for callers (the CLI) that have no structured case
    /// file.
    #[must_use]
    pub fn from_query_text(
        text: &str,
        issue_keywords: &BTreeMap<IssueKind, Vec<String>>,
        evidence_keywords: &BTreeMap<EvidenceKind, Vec<String>>,
        region: Option<String>,
    ) -> Self {
        let lower = text.to_lowercase();
        let issues = issue_keywords
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(kind, _)| *kind)
            .collect();
        let evidence_kinds = evidence_keywords
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(kind, _)| *kind)
            .collect();
        Self {
            issues,
            evidence_kinds,
            region,
            current_year: current_year(),
        }
    }
}

/// One reranked candidate with its score breakdown.
#[derive(Debug, Clone)]
pub struct RerankedCandidate {
    /// The candidate chunk.
    pub chunk: DocumentChunk,
    /// Fused RRF score from stage 1.
    pub rrf_score: f64,
    /// Final blended score in [0, 1].
    pub final_score: f64,
}

/// Reranks fused candidates. Input order does not matter; output is
/// sorted by final score descending with ties broken by higher year,
/// then lower case reference.
#[must_use]
pub fn rerank(
    candidates: Vec<(DocumentChunk, f64)>,
    ctx: &QueryContext,
    issue_keywords: &BTreeMap<IssueKind, Vec<String>>,
    evidence_keywords: &BTreeMap<EvidenceKind, Vec<String>>,
) -> Vec<RerankedCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let rrf_min = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::INFINITY, f64::min);
    let rrf_max = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    let rrf_span = rrf_max - rrf_min;

    let mut reranked: Vec<RerankedCandidate> = candidates
        .into_par_iter()
        .map(|(chunk, rrf_score)| {
            let text_lower = chunk.text.to_lowercase();

            let issue = issue_match(&text_lower, &ctx.issues, issue_keywords);
            let temporal = temporal_score(chunk.year, ctx.current_year);
            let region = ctx
                .region
                .as_deref()
                .is_some_and(|r| r == chunk.region)
                .then_some(1.0)
                .unwrap_or(0.0);
            let evidence = evidence_overlap(&text_lower, &ctx.evidence_kinds, evidence_keywords);
            // All candidates tied on RRF carry full normalized credit.
            let rrf_norm = if rrf_span > f64::EPSILON {
                (rrf_score - rrf_min) / rrf_span
            } else {
                1.0
            };

            let final_score = (WEIGHT_ISSUE * issue
                + WEIGHT_TEMPORAL * temporal
                + WEIGHT_REGION * region
                + WEIGHT_EVIDENCE * evidence
                + WEIGHT_RRF * rrf_norm)
                .clamp(0.0, 1.0);

            RerankedCandidate {
                chunk,
                rrf_score,
                final_score,
            }
        })
        .collect();

    reranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.chunk.year.cmp(&a.chunk.year))
            .then_with(|| a.chunk.case_reference.cmp(&b.chunk.case_reference))
    });
    reranked
}

/// Fraction of the query's issues with at least one keyword hit in the
/// chunk. No tagged issues means no signal.
fn issue_match(
    text_lower: &str,
    issues: &[IssueKind],
    issue_keywords: &BTreeMap<IssueKind, Vec<String>>,
) -> f64 {
    if issues.is_empty() {
        return 0.0;
    }
    let hits = issues
        .iter()
        .filter(|issue| {
            issue_keywords
                .get(issue)
                .is_some_and(|words| words.iter().any(|w| text_lower.contains(w.as_str())))
        })
        .count();
    #[allow(clippy::cast_precision_loss)]
    {
        hits as f64 / issues.len() as f64
    }
}

/// Linear decay from `current_year` back [`TEMPORAL_WINDOW_YEARS`],
/// clipped to [0, 1]. Future-dated chunks score 1.
fn temporal_score(chunk_year: i32, current_year: i32) -> f64 {
    let age = current_year.saturating_sub(chunk_year);
    (1.0 - f64::from(age) / f64::from(TEMPORAL_WINDOW_YEARS)).clamp(0.0, 1.0)
}

/// Jaccard overlap between the query's evidence kinds and the chunk's
/// keyword-classified evidence kinds. Empty sets yield 0.
fn evidence_overlap(
    text_lower: &str,
    query_kinds: &[EvidenceKind],
    evidence_keywords: &BTreeMap<EvidenceKind, Vec<String>>,
) -> f64 {
    let chunk_kinds = classify_evidence(text_lower, evidence_keywords);
    let query_kinds: BTreeSet<EvidenceKind> = query_kinds.iter().copied().collect();
    if query_kinds.is_empty() && chunk_kinds.is_empty() {
        return 0.0;
    }
    let intersection = query_kinds.intersection(&chunk_kinds).count();
    let union = query_kinds.union(&chunk_kinds).count();
    #[allow(clippy::cast_precision_loss)]
    {
        intersection as f64 / union as f64
    }
}

/// Lightweight evidence-type classification of a chunk.
fn classify_evidence(
    text_lower: &str,
    evidence_keywords: &BTreeMap<EvidenceKind, Vec<String>>,
) -> BTreeSet<EvidenceKind> {
    evidence_keywords
        .iter()
        .filter(|(_, words)| words.iter().any(|w| text_lower.contains(w.as_str())))
        .map(|(kind, _)| *kind)
        .collect()
}

/// Current calendar year from the system clock.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn current_year() -> i32 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    // Average Gregorian year; exact to within a day at this scale.
    1970 + (secs / 31_556_952) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_evidence_keywords, default_issue_keywords};
    use crate::core::{CaseMetadata, SectionKind};

    fn chunk(case: &str, year: i32, region: &str, text: &str) -> DocumentChunk {
        let meta = CaseMetadata {
            case_reference: case.to_string(),
            year,
            region: region.to_string(),
            case_type: "HMF".to_string(),
        };
        DocumentChunk::new(&meta, SectionKind::Reasoning, 0, text.to_string(), 10)
    }

    fn ctx(region: &str, issues: Vec<IssueKind>) -> QueryContext {
        QueryContext {
            issues,
            evidence_kinds: vec![],
            region: Some(region.to_string()),
            current_year: 2025,
        }
    }

    #[test]
    fn test_region_boost_breaks_rrf_tie() {
        // Identical RRF, identical year and text; only region differs.
        let candidates = vec![
            (chunk("CHI_00HB_HMF_2022_0042", 2022, "CHI", "deposit text"), 0.5),
            (chunk("LON_00BK_HMF_2022_0227", 2022, "LON", "deposit text"), 0.5),
        ];
        let reranked = rerank(
            candidates,
            &ctx("LON", vec![]),
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        assert_eq!(reranked[0].chunk.region, "LON");
        assert!(
            (reranked[0].final_score - reranked[1].final_score - WEIGHT_REGION).abs() < 1e-9
        );
    }

    #[test]
    fn test_temporal_decay_prefers_recent() {
        let candidates = vec![
            (chunk("LON_00AA_HMF_2013_0001", 2013, "LON", "same text"), 0.5),
            (chunk("LON_00BB_HMF_2023_0002", 2023, "LON", "same text"), 0.5),
        ];
        let reranked = rerank(
            candidates,
            &ctx("LON", vec![]),
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        assert_eq!(reranked[0].chunk.year, 2023);
    }

    #[test]
    fn test_temporal_component_values() {
        assert!((temporal_score(2025, 2025) - 1.0).abs() < 1e-9);
        assert!((temporal_score(2020, 2025) - 0.5).abs() < 1e-9);
        assert!(temporal_score(2010, 2025).abs() < 1e-9);
        // Older than the window clips to zero.
        assert!(temporal_score(1999, 2025).abs() < 1e-9);
        // Future-dated chunks clip to one.
        assert!((temporal_score(2030, 2025) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_pair_gap_follows_formula() {
        // 2023 vs 2020 with current year 2023: three years of decay at
        // the 0.2 temporal weight is a 0.06 final-score gap.
        let candidates = vec![
            (chunk("LON_00AA_HMF_2020_0001", 2020, "LON", "same text"), 0.5),
            (chunk("LON_00BB_HMF_2023_0002", 2023, "LON", "same text"), 0.5),
        ];
        let mut context = ctx("LON", vec![]);
        context.current_year = 2023;
        let reranked = rerank(
            candidates,
            &context,
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        assert_eq!(reranked[0].chunk.year, 2023);
        let gap = reranked[0].final_score - reranked[1].final_score;
        assert!((gap - WEIGHT_TEMPORAL * 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_issue_match_fraction() {
        let kw = default_issue_keywords();
        let text = "the tribunal considered the cleaning invoice and section 213";
        let full = issue_match(text, &[IssueKind::Cleaning, IssueKind::DepositProtection], &kw);
        assert!((full - 1.0).abs() < 1e-9);
        let half = issue_match(text, &[IssueKind::Cleaning, IssueKind::Gardening], &kw);
        assert!((half - 0.5).abs() < 1e-9);
        assert!(issue_match(text, &[], &kw).abs() < 1e-9);
    }

    #[test]
    fn test_evidence_jaccard() {
        let kw = default_evidence_keywords();
        let text = "photographs and the check-in report inventory were produced";
        // Chunk classifies as {Photographs, InventoryReport}.
        let score = evidence_overlap(text, &[EvidenceKind::Photographs], &kw);
        assert!((score - 0.5).abs() < 1e-9);
        let both = evidence_overlap(
            text,
            &[EvidenceKind::Photographs, EvidenceKind::InventoryReport],
            &kw,
        );
        assert!((both - 1.0).abs() < 1e-9);
        assert!(evidence_overlap("no evidence terms here", &[], &kw).abs() < 1e-9);
    }

    #[test]
    fn test_tie_break_year_then_reference() {
        let candidates = vec![
            (chunk("ZZZ_00AA_HMF_2022_0001", 2022, "MAN", "text"), 0.5),
            (chunk("AAA_00AA_HMF_2022_0001", 2022, "BIR", "text"), 0.5),
            (chunk("MMM_00AA_HMF_2023_0001", 2023, "CAM", "text"), 0.5),
        ];
        // No region/issue signal: 2023 wins on temporal; the two 2022
        // chunks tie and fall back to lexicographic reference order.
        let reranked = rerank(
            candidates,
            &QueryContext {
                current_year: 2025,
                ..QueryContext::default()
            },
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        assert_eq!(reranked[0].chunk.case_reference, "MMM_00AA_HMF_2023_0001");
        assert_eq!(reranked[1].chunk.case_reference, "AAA_00AA_HMF_2022_0001");
        assert_eq!(reranked[2].chunk.case_reference, "ZZZ_00AA_HMF_2022_0001");
    }

    #[test]
    fn test_rrf_normalization_degenerate() {
        // Single candidate: span is zero, rrf_norm is 1.0.
        let reranked = rerank(
            vec![(chunk("LON_00AA_HMF_2025_0001", 2025, "LON", "t"), 0.3)],
            &QueryContext {
                current_year: 2025,
                ..QueryContext::default()
            },
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        // temporal 1.0 * 0.2 + rrf 1.0 * 0.1
        assert!((reranked[0].final_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_query_context_from_text() {
        let ctx = QueryContext::from_query_text(
            "landlord did not protect deposit within 30 days, section 213; \
             photographs of the damage",
            &default_issue_keywords(),
            &default_evidence_keywords(),
            Some("LON".to_string()),
        );
        assert!(ctx.issues.contains(&IssueKind::DepositProtection));
        assert!(ctx.issues.contains(&IssueKind::Damage));
        assert!(ctx.evidence_kinds.contains(&EvidenceKind::Photographs));
        assert_eq!(ctx.region.as_deref(), Some("LON"));
    }

    #[test]
    fn test_scores_bounded() {
        let kw_text = "cleaning damage 213 protect arrears photographs inventory \
                       receipt invoice witness statement tenancy agreement email";
        let candidates = vec![(chunk("LON_00AA_HMF_2025_0001", 2025, "LON", kw_text), 0.9)];
        let context = QueryContext {
            issues: vec![IssueKind::Cleaning, IssueKind::Damage, IssueKind::DepositProtection],
            evidence_kinds: vec![EvidenceKind::Photographs, EvidenceKind::Receipts],
            region: Some("LON".to_string()),
            current_year: 2025,
        };
        let reranked = rerank(
            candidates,
            &context,
            &default_issue_keywords(),
            &default_evidence_keywords(),
        );
        assert!(reranked[0].final_score <= 1.0);
        assert!(reranked[0].final_score > 0.7);
    }
}
