//! The engine facade: `open(data_dir) -> serve -> close`.
//!
//! Composes the document processor, chunker, index layer, embedding
//! provider, retriever, and synthesizer behind the five public
//! contracts: `ingest_dir`, `retrieve`, `generate_prediction`,
//! `corpus_stats`, and `rebuild_sparse_from_semantic`. The engine owns
//! the only process-wide state (the index layer); exclusive access
//! during ingestion is enforced by the `&mut self` borrow, so queries
//! observe either the pre-batch or post-batch index, never a mix.
//!
//! All network calls happen before any store mutation for a given
//! document, so cancelling an in-flight ingestion at an await point
//! leaves complete documents behind and at worst re-ingests the
//! current one.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::chunking::LegalChunker;
use crate::config::EngineConfig;
use crate::core::{CaseFile, Prediction};
use crate::embedding::{Embedder, create_embedder};
use crate::error::Result;
use crate::index::{CorpusStats, IndexLayer, SearchFilters};
use crate::ingest::{DocumentProcessor, IngestReport};
use crate::llm::{ChatProvider, OpenAiChat};
use crate::retrieval::{RetrievalResult, Retriever};
use crate::synthesis::{GenerationOptions, Synthesizer, build_retrieval_query};

/// The composed prediction engine.
pub struct Engine {
    config: EngineConfig,
    index: IndexLayer,
    processor: DocumentProcessor,
    chunker: LegalChunker,
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatProvider>,
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl Engine {
    /// Opens the engine with the production providers.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or unusable stores.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding);
        let chat = Box::new(OpenAiChat::new(&config.synthesis));
        Self::with_providers(config, embedder, chat)
    }

    /// Opens the engine with injected providers (tests, offline use).
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or unusable stores.
    pub fn with_providers(
        config: EngineConfig,
        embedder: Box<dyn Embedder>,
        chat: Box<dyn ChatProvider>,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(config.embeddings_dir())?;
        std::fs::create_dir_all(config.predictions_dir())?;

        let index = IndexLayer::open(config.semantic_db_path(), config.sparse_index_path())?;
        let processor = DocumentProcessor::new(config.min_extract_chars);
        let chunker = LegalChunker::new(&config.chunking)?;
        let retriever = Retriever::new(&config);
        let synthesizer = Synthesizer::new(&config);

        Ok(Self {
            config,
            index,
            processor,
            chunker,
            embedder,
            chat,
            retriever,
            synthesizer,
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingests every PDF under `pdf_dir`. Documents are processed
    /// sequentially and written per-document atomically; the sparse
    /// index is persisted after every `batch_size` documents and at the
    /// end of the run. Skippable failures (scan-only PDFs, unresolvable
    /// metadata) are warnings, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable directories and store failures.
    pub async fn ingest_dir(
        &mut self,
        pdf_dir: &Path,
        batch_size: Option<usize>,
    ) -> Result<IngestReport> {
        let mut pdfs: Vec<std::path::PathBuf> = std::fs::read_dir(pdf_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        pdfs.sort();

        let mut report = IngestReport {
            documents_in: pdfs.len(),
            ..IngestReport::default()
        };
        let persist_every = batch_size.unwrap_or(usize::MAX).max(1);
        let mut since_persist = 0usize;

        for pdf in &pdfs {
            let doc = match self.processor.process(pdf) {
                Ok(doc) => doc,
                Err(e) if DocumentProcessor::is_skippable(&e) => {
                    warn!(path = %pdf.display(), error = %e, "skipping document");
                    report.documents_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let chunks = self.chunker.chunk_document(&doc)?;
            if chunks.is_empty() {
                warn!(path = %pdf.display(), "document produced no chunks, skipping");
                report.documents_skipped += 1;
                continue;
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            self.index.ingest_document(
                &doc,
                &chunks,
                &embeddings,
                self.embedder.model_name(),
            )?;

            report.documents_ok += 1;
            report.chunks_created += chunks.len();
            report.embedding_tokens += chunks.iter().map(|c| c.token_count).sum::<usize>();

            since_persist += 1;
            if since_persist >= persist_every {
                self.index.finish_batch()?;
                since_persist = 0;
            }
        }

        self.index.finish_batch()?;

        #[allow(clippy::cast_precision_loss)]
        {
            report.cost_estimate_usd =
                report.embedding_tokens as f64 / 1_000.0 * self.config.embedding.cost_per_1k_tokens;
        }

        info!(
            documents_ok = report.documents_ok,
            documents_skipped = report.documents_skipped,
            chunks = report.chunks_created,
            "ingestion run complete"
        );
        Ok(report)
    }

    /// Runs a hybrid retrieval for free query text.
    ///
    /// # Errors
    ///
    /// Returns an error only when both stores failed.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        filters: &SearchFilters,
        region_hint: Option<String>,
    ) -> Result<RetrievalResult> {
        let ctx = self.retriever.context_for_text(query, region_hint);
        let top_k = top_k.unwrap_or(self.config.retrieval.final_top_k);
        self.retriever
            .retrieve(&self.index, self.embedder.as_ref(), query, &ctx, filters, top_k)
            .await
    }

    /// Generates a prediction for a case file, enforcing the
    /// completeness gate, the generation budget, and write-once
    /// persistence of the emitted prediction.
    ///
    /// # Errors
    ///
    /// Returns an error only for persistence failures; retrieval and
    /// synthesis failures degrade to an `uncertain` prediction.
    pub async fn generate_prediction(
        &self,
        case: &CaseFile,
        options: GenerationOptions,
    ) -> Result<Prediction> {
        // Gate before any retrieval or model call.
        if let Some(refusal) = self.synthesizer.gate(case) {
            self.persist_prediction(&refusal)?;
            return Ok(refusal);
        }

        let budget = Duration::from_secs(self.config.synthesis.generation_budget_secs);
        let prediction =
            match tokio::time::timeout(budget, self.generate_inner(case, options)).await {
                Ok(prediction) => prediction,
                Err(_) => {
                    warn!(case_id = %case.case_id, "generation budget elapsed");
                    self.synthesizer.uncertain(
                        case,
                        None,
                        "timeout",
                        &format!(
                            "Generation exceeded the {}s wall-clock budget.",
                            budget.as_secs()
                        ),
                    )
                }
            };

        self.persist_prediction(&prediction)?;
        Ok(prediction)
    }

    async fn generate_inner(&self, case: &CaseFile, options: GenerationOptions) -> Prediction {
        let query = build_retrieval_query(case);
        let ctx = crate::retrieval::QueryContext {
            issues: case.issues.clone(),
            evidence_kinds: case.evidence_kinds(),
            region: case.property.region.clone(),
            current_year: crate::retrieval::current_year(),
        };
        let top_k = options
            .max_cases
            .unwrap_or(self.config.retrieval.final_top_k)
            .clamp(1, self.config.retrieval.initial_retrieval_k);

        let retrieval = match self
            .retriever
            .retrieve(
                &self.index,
                self.embedder.as_ref(),
                &query,
                &ctx,
                &SearchFilters::default(),
                top_k,
            )
            .await
        {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!(error = %e, "retrieval failed entirely, emitting uncertain prediction");
                return self.synthesizer.uncertain(
                    case,
                    None,
                    "degraded_retrieval",
                    &format!("Retrieval failed: {e}."),
                );
            }
        };

        self.synthesizer
            .synthesize(self.chat.as_ref(), case, &retrieval, options)
            .await
    }

    /// Writes one prediction record under `<data>/predictions/`.
    /// Written once, never mutated.
    fn persist_prediction(&self, prediction: &Prediction) -> Result<()> {
        let prediction_id = format!(
            "{}_{}.json",
            prediction.case_id.replace(['/', '\\'], "_"),
            prediction.generated_at
        );
        let path = self.config.predictions_dir().join(prediction_id);
        let payload = serde_json::to_vec_pretty(prediction)
            .map_err(crate::error::IndexError::from)?;
        std::fs::write(&path, payload)?;
        Ok(())
    }

    /// Corpus statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics queries fail.
    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        self.index.stats()
    }

    /// Rebuilds the sparse index from the semantic store (recovery).
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild or persistence fails.
    pub fn rebuild_sparse_from_semantic(&mut self) -> Result<usize> {
        self.index.rebuild_sparse_from_semantic()
    }

    /// Deletes all corpus state.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub fn clear(&mut self) -> Result<()> {
        self.index.clear()
    }
}
