//! Prediction synthesis: (case file, retrieval) to [`Prediction`].
//!
//! The generation state machine is
//! `gate -> retrieve -> prompt -> parse -> cite-validate ->
//! (ok | retry | downgrade) -> emit`. The completeness gate and the
//! retrieval stage run in the engine; this module owns everything from
//! prompting onward, including the cite-or-abstain rule. Terminal
//! states always produce a `Prediction` - provider failures, malformed
//! output, and downgrades emit an `uncertain` prediction rather than an
//! error, with the failure category named in the reasoning trace.

mod prompt;
mod schema;
mod validate;

pub use prompt::{
    MAX_NARRATIVE_CHARS, STRICT_JSON_NUDGE, SYSTEM_PROMPT, build_case_summary,
    build_retrieval_query, build_user_prompt,
};
pub use schema::{RawCitation, RawIssuePrediction, RawPrediction, RawReasoningStep, parse_prediction};
pub use validate::{ValidationOutcome, validate_citations};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::{CaseFile, Outcome, Prediction, ReasoningStep};
use crate::llm::ChatProvider;
use crate::retrieval::RetrievalResult;

/// Options for one generation request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    /// Include the reasoning trace in the emitted prediction.
    pub include_reasoning: bool,
    /// Cap on retrieved chunks consulted (defaults to the configured
    /// final top-k).
    pub max_cases: Option<usize>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            include_reasoning: true,
            max_cases: None,
        }
    }
}

/// Owns prompting, parsing, and cite-or-abstain validation.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    disclaimer: String,
}

impl Synthesizer {
    /// Creates a synthesizer from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            disclaimer: config.disclaimer.clone(),
        }
    }

    /// The completeness gate. Returns a structured refusal when the
    /// intake is incomplete; the caller must not consult the model.
    #[must_use]
    pub fn gate(&self, case: &CaseFile) -> Option<Prediction> {
        let missing = case.missing_required_fields();
        if missing.is_empty() {
            None
        } else {
            info!(case_id = %case.case_id, missing = missing.len(), "intake gate refused");
            Some(Prediction::refusal(&case.case_id, missing, &self.disclaimer))
        }
    }

    /// Builds an `uncertain` prediction carrying the retrieval context.
    #[must_use]
    pub fn uncertain(
        &self,
        case: &CaseFile,
        retrieval: Option<&RetrievalResult>,
        reason_tag: &str,
        detail: &str,
    ) -> Prediction {
        let mut prediction = Prediction::uncertain(&case.case_id, reason_tag, detail, &self.disclaimer);
        if let Some(retrieval) = retrieval {
            prediction.cases_consulted = retrieval.case_references();
            prediction.rag_confidence = Some(retrieval.confidence);
        }
        prediction
    }

    /// Runs prompt, parse (with one strict-JSON re-prompt), and
    /// citation validation, and emits the final prediction.
    pub async fn synthesize(
        &self,
        chat: &dyn ChatProvider,
        case: &CaseFile,
        retrieval: &RetrievalResult,
        options: GenerationOptions,
    ) -> Prediction {
        if let Some(refusal) = self.gate(case) {
            return refusal;
        }

        let user_prompt = build_user_prompt(case, retrieval);

        // Phase B call, with one re-prompt on malformed output.
        let outcome = match chat.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "chat provider failed, emitting uncertain prediction");
                return self.uncertain(
                    case,
                    Some(retrieval),
                    "synthesis_failed",
                    &format!("The language model call failed: {e}."),
                );
            }
        };

        let (raw, model_version) = match parse_prediction(&outcome.content) {
            Ok(raw) => (raw, outcome.model),
            Err(first_err) => {
                debug!(error = %first_err, "malformed model output, re-prompting for strict JSON");
                let nudged = format!("{SYSTEM_PROMPT}{STRICT_JSON_NUDGE}");
                match chat.complete(&nudged, &user_prompt).await {
                    Ok(second) => match parse_prediction(&second.content) {
                        Ok(raw) => (raw, second.model),
                        Err(second_err) => {
                            warn!(error = %second_err, "second parse failed, emitting uncertain");
                            return self.uncertain(
                                case,
                                Some(retrieval),
                                "synthesis_failed",
                                "The model did not produce parseable output after a strict-JSON re-prompt.",
                            );
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "re-prompt call failed, emitting uncertain");
                        return self.uncertain(
                            case,
                            Some(retrieval),
                            "synthesis_failed",
                            &format!("The language model call failed on re-prompt: {e}."),
                        );
                    }
                }
            }
        };

        self.emit(case, retrieval, raw, model_version, options)
    }

    /// Validates citations and assembles the terminal prediction.
    fn emit(
        &self,
        case: &CaseFile,
        retrieval: &RetrievalResult,
        raw: RawPrediction,
        model_version: String,
        options: GenerationOptions,
    ) -> Prediction {
        let issues = raw
            .issues
            .into_iter()
            .map(RawIssuePrediction::into_issue_prediction)
            .collect();
        let steps = raw
            .reasoning
            .into_iter()
            .map(RawReasoningStep::into_reasoning_step)
            .collect();

        let validation = validate_citations(issues, steps, retrieval);

        let mut reasoning = validation.steps;
        if !validation.removed.is_empty() {
            reasoning.push(ReasoningStep::note(
                "uncited_claim_removed",
                validation.removed.join("; "),
            ));
        }

        // Retrieval uncertainty and validation downgrades both force
        // the terminal outcome to uncertain, whatever the model said.
        let (overall_outcome, uncertainty_reason) = if retrieval.is_uncertain {
            let tag = retrieval
                .uncertainty_reason
                .as_ref()
                .map_or_else(|| "uncertain_retrieval".to_string(), |r| r.tag.clone());
            (Outcome::Uncertain, Some(tag))
        } else if validation.downgraded {
            (Outcome::Uncertain, Some("uncited_claim_removed".to_string()))
        } else {
            (raw.overall_outcome, None)
        };

        let overall_confidence = raw
            .overall_confidence
            .clamp(0.0, 1.0)
            .min(retrieval.confidence);

        Prediction {
            case_id: case.case_id.clone(),
            overall_outcome,
            overall_confidence,
            issues: validation.issues,
            reasoning: if options.include_reasoning {
                reasoning
            } else {
                Vec::new()
            },
            key_strengths: raw.key_strengths,
            key_weaknesses: raw.key_weaknesses,
            key_uncertainties: raw.key_uncertainties,
            cases_consulted: retrieval.case_references(),
            uncertainty_reason,
            missing_fields: Vec::new(),
            model_version: Some(model_version),
            rag_confidence: Some(retrieval.confidence),
            disclaimer: self.disclaimer.clone(),
            generated_at: crate::core::current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::{
        CaseMetadata, DocumentChunk, EvidenceItem, EvidenceKind, IssueKind, PartyRole, Property,
        SectionKind, Tenancy,
    };
    use crate::error::SynthesisError;
    use crate::llm::ChatOutcome;
    use crate::retrieval::{ScoredChunk, UncertaintyReason};

    /// Scripted chat provider: pops pre-seeded replies in order.
    struct ScriptedChat {
        replies: Mutex<VecDeque<Result<String, SynthesisError>>>,
        calls: AtomicUsize,
        last_system: Mutex<Option<String>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Result<String, SynthesisError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn complete(
            &self,
            system: &str,
            _user: &str,
        ) -> Result<ChatOutcome, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_system.lock().unwrap() = Some(system.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(SynthesisError::Provider("script exhausted".to_string())));
            reply.map(|content| ChatOutcome {
                content,
                model: "scripted-model".to_string(),
            })
        }
    }

    fn complete_case() -> CaseFile {
        CaseFile {
            case_id: "case-1".to_string(),
            user_role: PartyRole::Tenant,
            property: Property {
                address: Some("12 Example Road".to_string()),
                postcode: None,
                region: Some("LON".to_string()),
                property_type: None,
            },
            tenancy: Tenancy {
                start_date: Some("2023-01-15".to_string()),
                end_date: None,
                monthly_rent: None,
                deposit_amount: Some(1500.0),
                deposit_protected: Some(false),
                deposit_scheme: None,
            },
            issues: vec![IssueKind::DepositProtection],
            evidence: vec![EvidenceItem {
                kind: EvidenceKind::Correspondence,
                description: "emails with the landlord".to_string(),
                extracted_text: None,
            }],
            claims: vec![],
            narrative: None,
        }
    }

    fn retrieval() -> RetrievalResult {
        let meta = CaseMetadata {
            case_reference: "LON_00BK_HMF_2022_0227".to_string(),
            year: 2023,
            region: "LON".to_string(),
            case_type: "HMF".to_string(),
        };
        RetrievalResult {
            results: vec![ScoredChunk {
                chunk: DocumentChunk::new(
                    &meta,
                    SectionKind::Reasoning,
                    0,
                    "The tribunal finds the deposit was not protected within 30 days \
                     and awards twice the deposit."
                        .to_string(),
                    20,
                ),
                semantic_score: Some(0.82),
                bm25_score: Some(5.1),
                rrf_score: 0.016,
                final_score: 0.78,
            }],
            confidence: 0.78,
            is_uncertain: false,
            uncertainty_reason: None,
        }
    }

    fn good_reply() -> String {
        r#"{
            "overall_outcome": "tenant_favored",
            "overall_confidence": 0.8,
            "issues": [{
                "issue": "deposit_protection",
                "outcome": "tenant_favored",
                "amount": 3000.0,
                "confidence": 0.8,
                "key_factors": ["statutory breach"],
                "citations": [{
                    "case_reference": "LON_00BK_HMF_2022_0227",
                    "quote": "the deposit was not protected within 30 days",
                    "relevance": "identical breach"
                }]
            }],
            "reasoning": [{
                "category": "precedent",
                "text": "Awards for unprotected deposits run 1-3x.",
                "citations": [{
                    "case_reference": "LON_00BK_HMF_2022_0227",
                    "quote": "awards twice the deposit"
                }]
            }],
            "key_strengths": ["clear breach"],
            "key_weaknesses": [],
            "key_uncertainties": []
        }"#
        .to_string()
    }

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(&EngineConfig::with_data_dir("/tmp/unused"))
    }

    #[tokio::test]
    async fn test_gate_refusal_makes_zero_llm_calls() {
        let mut case = complete_case();
        case.property.address = None;
        let chat = ScriptedChat::new(vec![Ok(good_reply())]);

        let prediction = synthesizer()
            .synthesize(&chat, &case, &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(chat.calls(), 0);
        assert_eq!(prediction.overall_outcome, Outcome::Uncertain);
        assert_eq!(
            prediction.uncertainty_reason.as_deref(),
            Some("missing_required_fields")
        );
        assert_eq!(
            prediction
                .missing_fields
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>(),
            vec!["property_address"]
        );
    }

    #[tokio::test]
    async fn test_happy_path() {
        let chat = ScriptedChat::new(vec![Ok(good_reply())]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(chat.calls(), 1);
        assert_eq!(prediction.overall_outcome, Outcome::TenantFavored);
        assert_eq!(prediction.issues.len(), 1);
        assert_eq!(prediction.issues[0].citations.len(), 1);
        assert!(prediction.issues[0].citations[0].chunk_id.is_some());
        assert_eq!(prediction.cases_consulted, vec!["LON_00BK_HMF_2022_0227"]);
        assert_eq!(prediction.model_version.as_deref(), Some("scripted-model"));
        assert!((prediction.rag_confidence.unwrap() - 0.78).abs() < 1e-9);
        // Confidence never exceeds retrieval confidence.
        assert!(prediction.overall_confidence <= 0.78);
        assert!(!prediction.disclaimer.is_empty());
    }

    #[tokio::test]
    async fn test_fabricated_citation_downgrades_to_uncertain() {
        let reply = good_reply().replace("LON_00BK_HMF_2022_0227", "LON_00BK_HMF_2099_9999");
        let chat = ScriptedChat::new(vec![Ok(reply)]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(prediction.overall_outcome, Outcome::Uncertain);
        assert_eq!(
            prediction.uncertainty_reason.as_deref(),
            Some("uncited_claim_removed")
        );
        assert!(prediction.issues.is_empty());
        assert!(
            prediction
                .reasoning
                .iter()
                .any(|s| s.category == "uncited_claim_removed")
        );
    }

    #[tokio::test]
    async fn test_malformed_then_valid_reprompts_once() {
        let chat = ScriptedChat::new(vec![
            Ok("Sorry, here is my analysis in prose.".to_string()),
            Ok(good_reply()),
        ]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(chat.calls(), 2);
        assert_eq!(prediction.overall_outcome, Outcome::TenantFavored);
        let system = chat.last_system.lock().unwrap().clone().unwrap();
        assert!(system.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_malformed_twice_emits_uncertain() {
        let chat = ScriptedChat::new(vec![
            Ok("prose".to_string()),
            Ok("still prose".to_string()),
        ]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(chat.calls(), 2);
        assert_eq!(prediction.overall_outcome, Outcome::Uncertain);
        assert_eq!(
            prediction.uncertainty_reason.as_deref(),
            Some("synthesis_failed")
        );
        assert!(
            prediction
                .reasoning
                .iter()
                .any(|s| s.category == "synthesis_failed")
        );
    }

    #[tokio::test]
    async fn test_provider_error_emits_uncertain() {
        let chat = ScriptedChat::new(vec![Err(SynthesisError::Provider(
            "invalid api key".to_string(),
        ))]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), GenerationOptions::default())
            .await;

        assert_eq!(prediction.overall_outcome, Outcome::Uncertain);
        assert_eq!(
            prediction.uncertainty_reason.as_deref(),
            Some("synthesis_failed")
        );
        assert!(!prediction.disclaimer.is_empty());
    }

    #[tokio::test]
    async fn test_uncertain_retrieval_forces_uncertain_outcome() {
        let mut r = retrieval();
        r.is_uncertain = true;
        r.uncertainty_reason = Some(UncertaintyReason {
            tag: "low_confidence".to_string(),
            message: "below threshold".to_string(),
        });
        let chat = ScriptedChat::new(vec![Ok(good_reply())]);
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &r, GenerationOptions::default())
            .await;

        assert_eq!(prediction.overall_outcome, Outcome::Uncertain);
        assert_eq!(prediction.uncertainty_reason.as_deref(), Some("low_confidence"));
        // Cited issues survive; only the verdict is downgraded.
        assert_eq!(prediction.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_include_reasoning_false_strips_trace() {
        let chat = ScriptedChat::new(vec![Ok(good_reply())]);
        let options = GenerationOptions {
            include_reasoning: false,
            max_cases: None,
        };
        let prediction = synthesizer()
            .synthesize(&chat, &complete_case(), &retrieval(), options)
            .await;
        assert!(prediction.reasoning.is_empty());
        assert_eq!(prediction.issues.len(), 1);
    }
}
