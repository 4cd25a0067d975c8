//! Cite-or-abstain enforcement.
//!
//! Walks every issue prediction and reasoning step and verifies each
//! citation against the retrieval the prediction was generated from: the
//! cited case must appear in the retrieval, and the quote must be a
//! whitespace-normalized substring of one of that case's retrieved
//! chunks. Valid citations are enriched with the matched chunk pointer;
//! invalid ones are removed. An issue left with no citations is
//! load-bearing-unsupported: it is dropped and the overall outcome is
//! downgraded to `uncertain`.

use std::collections::HashMap;

use tracing::warn;

use crate::core::{Citation, IssuePrediction, ReasoningStep};
use crate::ingest::normalize_for_match;
use crate::retrieval::{RetrievalResult, ScoredChunk};

/// Result of citation validation.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Issues that kept at least one valid citation.
    pub issues: Vec<IssuePrediction>,
    /// Reasoning steps with invalid citations removed; steps whose
    /// citations all failed are dropped.
    pub steps: Vec<ReasoningStep>,
    /// Human-readable notes about removed claims.
    pub removed: Vec<String>,
    /// True when a load-bearing claim was removed and the overall
    /// outcome must downgrade to `uncertain`.
    pub downgraded: bool,
}

/// Validates citations against the retrieval.
#[must_use]
pub fn validate_citations(
    issues: Vec<IssuePrediction>,
    steps: Vec<ReasoningStep>,
    retrieval: &RetrievalResult,
) -> ValidationOutcome {
    let by_case: HashMap<&str, Vec<&ScoredChunk>> = {
        let mut map: HashMap<&str, Vec<&ScoredChunk>> = HashMap::new();
        for scored in &retrieval.results {
            map.entry(scored.chunk.case_reference.as_str())
                .or_default()
                .push(scored);
        }
        map
    };

    let mut removed = Vec::new();
    let mut downgraded = false;

    let mut kept_issues = Vec::with_capacity(issues.len());
    for mut issue in issues {
        let had_citations = !issue.citations.is_empty();
        issue.citations = issue
            .citations
            .into_iter()
            .filter_map(|c| resolve_citation(c, &by_case, &mut removed))
            .collect();

        if issue.citations.is_empty() {
            // No surviving support for this issue: the claim was
            // load-bearing, so the whole prediction downgrades.
            downgraded = true;
            let note = if had_citations {
                format!(
                    "issue '{}' removed: no cited case survived validation",
                    issue.issue
                )
            } else {
                format!("issue '{}' removed: asserted without citations", issue.issue)
            };
            warn!(issue = %issue.issue, "dropping uncited issue prediction");
            removed.push(note);
        } else {
            kept_issues.push(issue);
        }
    }

    let mut kept_steps = Vec::with_capacity(steps.len());
    for mut step in steps {
        let had_citations = !step.citations.is_empty();
        step.citations = step
            .citations
            .into_iter()
            .filter_map(|c| resolve_citation(c, &by_case, &mut removed))
            .collect();

        if had_citations && step.citations.is_empty() {
            removed.push(format!(
                "reasoning step removed: citations did not survive validation: {}",
                truncate(&step.text, 80)
            ));
        } else {
            kept_steps.push(step);
        }
    }

    ValidationOutcome {
        issues: kept_issues,
        steps: kept_steps,
        removed,
        downgraded,
    }
}

/// Checks one citation and enriches it with the matched chunk pointer.
/// Returns `None` (recording why) when the cited case is not in the
/// retrieval or the quote is not a normalized substring of any of its
/// chunks.
fn resolve_citation(
    citation: Citation,
    by_case: &HashMap<&str, Vec<&ScoredChunk>>,
    removed: &mut Vec<String>,
) -> Option<Citation> {
    let Some(chunks) = by_case.get(citation.case_reference.as_str()) else {
        removed.push(format!(
            "citation of {} removed: case not in retrieval",
            citation.case_reference
        ));
        return None;
    };

    let quote_norm = normalize_for_match(&citation.quote);
    if quote_norm.is_empty() {
        removed.push(format!(
            "citation of {} removed: empty quote",
            citation.case_reference
        ));
        return None;
    }

    let matched = chunks
        .iter()
        .find(|scored| normalize_for_match(&scored.chunk.text).contains(&quote_norm));

    match matched {
        Some(scored) => Some(Citation {
            year: Some(scored.chunk.year),
            region: Some(scored.chunk.region.clone()),
            chunk_id: Some(scored.chunk.chunk_id.clone()),
            similarity: scored.semantic_score.map(f64::from),
            ..citation
        }),
        None => {
            removed.push(format!(
                "citation of {} removed: quote not found in retrieved chunks",
                citation.case_reference
            ));
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
