//! Wire schema for the model's JSON output.
//!
//! The raw types are deliberately forgiving: optional fields default,
//! unknown issue strings fold into `other`, and markdown fences around
//! the object are tolerated. Anything that still fails to parse
//! triggers the single strict-JSON re-prompt.

use serde::Deserialize;

use crate::core::{Citation, IssueKind, IssuePrediction, Outcome, ReasoningStep};
use crate::error::SynthesisError;

/// Raw model output, one-to-one with the schema in the system prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    /// Overall outcome tag.
    pub overall_outcome: Outcome,
    /// Overall confidence.
    #[serde(default)]
    pub overall_confidence: f64,
    /// Per-issue predictions.
    #[serde(default)]
    pub issues: Vec<RawIssuePrediction>,
    /// Reasoning trace.
    #[serde(default)]
    pub reasoning: Vec<RawReasoningStep>,
    /// Strongest points.
    #[serde(default)]
    pub key_strengths: Vec<String>,
    /// Weakest points.
    #[serde(default)]
    pub key_weaknesses: Vec<String>,
    /// Open uncertainties.
    #[serde(default)]
    pub key_uncertainties: Vec<String>,
}

/// Raw per-issue prediction.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssuePrediction {
    /// Issue type; unknown strings fold to `other`.
    pub issue: IssueKind,
    /// Predicted outcome for the issue.
    pub outcome: Outcome,
    /// Point estimate in GBP.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Award range in GBP. Semantics not fully pinned down upstream;
    /// optional until they are.
    #[serde(default)]
    pub amount_range: Option<[f64; 2]>,
    /// Issue confidence.
    #[serde(default)]
    pub confidence: f64,
    /// Key factors.
    #[serde(default)]
    pub key_factors: Vec<String>,
    /// Supporting citations.
    #[serde(default)]
    pub citations: Vec<RawCitation>,
}

/// Raw reasoning step.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReasoningStep {
    /// Step category; free-form from the model.
    #[serde(default = "default_category")]
    pub category: String,
    /// Step text.
    pub text: String,
    /// Citations backing the step.
    #[serde(default)]
    pub citations: Vec<RawCitation>,
}

fn default_category() -> String {
    "analysis".to_string()
}

/// Raw citation as emitted by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCitation {
    /// Cited case reference.
    pub case_reference: String,
    /// Verbatim quote.
    #[serde(default)]
    pub quote: String,
    /// Relevance note.
    #[serde(default)]
    pub relevance: Option<String>,
}

impl RawCitation {
    /// Converts to the domain citation, before validation fills the
    /// chunk pointer and scores.
    #[must_use]
    pub fn into_citation(self) -> Citation {
        Citation {
            case_reference: self.case_reference,
            year: None,
            region: None,
            chunk_id: None,
            quote: self.quote,
            similarity: None,
            relevance: self.relevance,
        }
    }
}

impl RawIssuePrediction {
    /// Converts to the domain issue prediction.
    #[must_use]
    pub fn into_issue_prediction(self) -> IssuePrediction {
        IssuePrediction {
            issue: self.issue,
            outcome: self.outcome,
            amount: self.amount,
            amount_range: self.amount_range,
            confidence: self.confidence.clamp(0.0, 1.0),
            key_factors: self.key_factors,
            citations: self.citations.into_iter().map(RawCitation::into_citation).collect(),
        }
    }
}

impl RawReasoningStep {
    /// Converts to the domain reasoning step.
    #[must_use]
    pub fn into_reasoning_step(self) -> ReasoningStep {
        ReasoningStep {
            category: self.category,
            text: self.text,
            citations: self.citations.into_iter().map(RawCitation::into_citation).collect(),
        }
    }
}

/// Parses model output into a [`RawPrediction`], tolerating markdown
/// fences and surrounding prose by extracting the outermost JSON
/// object.
///
/// # Errors
///
/// Returns [`SynthesisError::MalformedOutput`] when no parseable JSON
/// object is present.
pub fn parse_prediction(content: &str) -> Result<RawPrediction, SynthesisError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(SynthesisError::MalformedOutput {
            reason: "no JSON object in model output".to_string(),
        });
    };
    if end < start {
        return Err(SynthesisError::MalformedOutput {
            reason: "unbalanced JSON object in model output".to_string(),
        });
    }

    let raw: RawPrediction = serde_json::from_str(&content[start..=end])?;
    Ok(raw)
}
