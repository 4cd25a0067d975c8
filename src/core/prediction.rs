//! Structured predictions with citations and a reasoning trace.
//!
//! A [`Prediction`] is created once per generation request and never
//! mutated. Refusals (incomplete intake) and degraded outcomes (failed
//! retrieval or synthesis) are themselves predictions with the
//! `uncertain` outcome, so callers always get the same shape back.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::casefile::{IssueKind, RequiredField};

/// Terminal outcome tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The tenant is likely to recover most or all of the claim.
    TenantFavored,
    /// The landlord's deductions are likely to stand.
    LandlordFavored,
    /// Likely split between the parties.
    Split,
    /// Retrieval, gating, or synthesis cannot justify a verdict.
    Uncertain,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TenantFavored => "tenant_favored",
            Self::LandlordFavored => "landlord_favored",
            Self::Split => "split",
            Self::Uncertain => "uncertain",
        };
        f.write_str(s)
    }
}

/// A pointer from an asserted claim into the retrieved evidence.
///
/// Invariant (enforced by the cite-or-abstain validator): the case
/// reference appears in the retrieval the prediction was generated
/// against, and `quote` is a whitespace-normalized substring of one of
/// that case's retrieved chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Cited case reference.
    pub case_reference: String,
    /// Decision year, when known.
    #[serde(default)]
    pub year: Option<i32>,
    /// Region code, when known.
    #[serde(default)]
    pub region: Option<String>,
    /// Chunk the quote was matched against (filled by the validator).
    #[serde(default)]
    pub chunk_id: Option<String>,
    /// Quoted excerpt supporting the claim.
    pub quote: String,
    /// Similarity score of the matched chunk, when known.
    #[serde(default)]
    pub similarity: Option<f64>,
    /// Short note on why the case is relevant.
    #[serde(default)]
    pub relevance: Option<String>,
}

/// One ordered step in the reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Step category tag, e.g. `analysis`, `precedent`, `gate`,
    /// `uncited_claim_removed`, `synthesis_failure`, `timeout`.
    pub category: String,
    /// Step text.
    pub text: String,
    /// Chunks cited by this step.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ReasoningStep {
    /// Creates a step without citations.
    #[must_use]
    pub fn note(category: &str, text: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Predicted outcome for a single issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePrediction {
    /// The issue being predicted.
    pub issue: IssueKind,
    /// Predicted outcome for this issue.
    pub outcome: Outcome,
    /// Point estimate of the awarded amount in GBP.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Low/high award range in GBP, when the model gives one.
    #[serde(default)]
    pub amount_range: Option<[f64; 2]>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Key factors driving the outcome.
    #[serde(default)]
    pub key_factors: Vec<String>,
    /// Supporting citations. Empty only transiently, before validation;
    /// an issue that ends validation uncited is dropped or downgraded.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// A complete structured prediction for one case file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Case id this prediction belongs to.
    pub case_id: String,
    /// Overall outcome.
    pub overall_outcome: Outcome,
    /// Overall confidence in [0, 1].
    pub overall_confidence: f64,
    /// Per-issue predictions.
    #[serde(default)]
    pub issues: Vec<IssuePrediction>,
    /// Ordered reasoning trace.
    #[serde(default)]
    pub reasoning: Vec<ReasoningStep>,
    /// Strongest points for the user's position.
    #[serde(default)]
    pub key_strengths: Vec<String>,
    /// Weakest points.
    #[serde(default)]
    pub key_weaknesses: Vec<String>,
    /// Open uncertainties.
    #[serde(default)]
    pub key_uncertainties: Vec<String>,
    /// Case references actually consulted during retrieval.
    #[serde(default)]
    pub cases_consulted: Vec<String>,
    /// Machine-readable tag when the outcome is `uncertain`
    /// (`missing_required_fields`, `degraded_retrieval`,
    /// `synthesis_failed`, `timeout`, ...).
    #[serde(default)]
    pub uncertainty_reason: Option<String>,
    /// Required fields that blocked the gate, for refusals.
    #[serde(default)]
    pub missing_fields: Vec<RequiredField>,
    /// Model identifier reported by the provider, when available.
    #[serde(default)]
    pub model_version: Option<String>,
    /// Retrieval confidence the synthesis ran against, when available.
    #[serde(default)]
    pub rag_confidence: Option<f64>,
    /// Mandatory disclaimer, always present.
    pub disclaimer: String,
    /// Unix timestamp of generation.
    pub generated_at: i64,
}

impl Prediction {
    /// Builds a gate refusal: intake incomplete, no model consulted.
    #[must_use]
    pub fn refusal(case_id: &str, missing: Vec<RequiredField>, disclaimer: &str) -> Self {
        let fields = missing
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            case_id: case_id.to_string(),
            overall_outcome: Outcome::Uncertain,
            overall_confidence: 0.0,
            issues: Vec::new(),
            reasoning: vec![ReasoningStep::note(
                "gate",
                format!("Intake incomplete; missing required fields: {fields}."),
            )],
            key_strengths: Vec::new(),
            key_weaknesses: Vec::new(),
            key_uncertainties: Vec::new(),
            cases_consulted: Vec::new(),
            uncertainty_reason: Some("missing_required_fields".to_string()),
            missing_fields: missing,
            model_version: None,
            rag_confidence: None,
            disclaimer: disclaimer.to_string(),
            generated_at: super::current_timestamp(),
        }
    }

    /// Builds a degraded `uncertain` prediction with one explanatory
    /// reasoning step.
    #[must_use]
    pub fn uncertain(case_id: &str, reason_tag: &str, detail: &str, disclaimer: &str) -> Self {
        Self {
            case_id: case_id.to_string(),
            overall_outcome: Outcome::Uncertain,
            overall_confidence: 0.0,
            issues: Vec::new(),
            reasoning: vec![ReasoningStep::note(reason_tag, detail)],
            key_strengths: Vec::new(),
            key_weaknesses: Vec::new(),
            key_uncertainties: vec![detail.to_string()],
            cases_consulted: Vec::new(),
            uncertainty_reason: Some(reason_tag.to_string()),
            missing_fields: Vec::new(),
            model_version: None,
            rag_confidence: None,
            disclaimer: disclaimer.to_string(),
            generated_at: super::current_timestamp(),
        }
    }

    /// Every citation in the prediction, across issues and steps.
    pub fn all_citations(&self) -> impl Iterator<Item = &Citation> {
        self.issues
            .iter()
            .flat_map(|i| i.citations.iter())
            .chain(self.reasoning.iter().flat_map(|s| s.citations.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_shape() {
        let p = Prediction::refusal(
            "case-1",
            vec![RequiredField::PropertyAddress],
            "Not legal advice.",
        );
        assert_eq!(p.overall_outcome, Outcome::Uncertain);
        assert_eq!(
            p.uncertainty_reason.as_deref(),
            Some("missing_required_fields")
        );
        assert_eq!(p.missing_fields, vec![RequiredField::PropertyAddress]);
        assert_eq!(p.disclaimer, "Not legal advice.");
        assert_eq!(p.reasoning.len(), 1);
        assert_eq!(p.reasoning[0].category, "gate");
        assert!(p.reasoning[0].text.contains("property_address"));
    }

    #[test]
    fn test_uncertain_shape() {
        let p = Prediction::uncertain("case-1", "timeout", "generation budget elapsed", "d");
        assert_eq!(p.overall_outcome, Outcome::Uncertain);
        assert_eq!(p.uncertainty_reason.as_deref(), Some("timeout"));
        assert!(p.missing_fields.is_empty());
    }

    #[test]
    fn test_all_citations_walks_issues_and_steps() {
        let cite = |case: &str| Citation {
            case_reference: case.to_string(),
            year: None,
            region: None,
            chunk_id: None,
            quote: "q".to_string(),
            similarity: None,
            relevance: None,
        };
        let mut p = Prediction::uncertain("c", "x", "y", "d");
        p.issues.push(IssuePrediction {
            issue: IssueKind::Cleaning,
            outcome: Outcome::TenantFavored,
            amount: Some(100.0),
            amount_range: None,
            confidence: 0.8,
            key_factors: vec![],
            citations: vec![cite("A")],
        });
        p.reasoning.push(ReasoningStep {
            category: "analysis".to_string(),
            text: "t".to_string(),
            citations: vec![cite("B"), cite("C")],
        });
        let refs: Vec<&str> = p.all_citations().map(|c| c.case_reference.as_str()).collect();
        assert_eq!(refs, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_outcome_serde_tags() {
        assert_eq!(
            serde_json::to_string(&Outcome::TenantFavored).unwrap(),
            "\"tenant_favored\""
        );
        let o: Outcome = serde_json::from_str("\"split\"").unwrap();
        assert_eq!(o, Outcome::Split);
    }

    #[test]
    fn test_prediction_roundtrip() {
        let p = Prediction::refusal("case-9", vec![RequiredField::DepositAmount], "d");
        let json = serde_json::to_string(&p).unwrap();
        let back: Prediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
