//! Engine configuration.
//!
//! All tunables live here and are injected explicitly; nothing outside
//! startup reads the environment. Defaults match the deployed scraper
//! corpus and the `text-embedding-3-small`-class embedding provider.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{EvidenceKind, IssueKind};
use crate::error::{ConfigError, Result};

/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "TRIBUNAL_DATA_DIR";

/// Environment variable carrying the provider credential
/// (read by the `async-openai` client itself).
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

/// Minimum extractable characters before a PDF is treated as scan-only.
pub const DEFAULT_MIN_EXTRACT_CHARS: usize = 500;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimensions for the default model.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Hard upper bound on items per embedding request.
pub const MAX_EMBEDDING_BATCH: usize = 50;

/// Default in-flight embedding batches during ingestion.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// Default chunk size in tokens.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default suffix-to-prefix overlap between adjacent chunks, in tokens.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Hard cap on chunk size in tokens.
pub const MAX_CHUNK_SIZE: usize = 2_000;

/// Default candidates fetched from each store before fusion.
pub const DEFAULT_INITIAL_RETRIEVAL_K: usize = 20;

/// Default result count after reranking.
pub const DEFAULT_FINAL_TOP_K: usize = 5;

/// Default RRF `k` constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Default weight of the semantic list in fusion (BM25 gets the rest).
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;

/// Below this retrieval confidence the result is flagged uncertain.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Below this top semantic similarity the result is flagged uncertain.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

/// Fewer surviving candidates than this flags the result uncertain.
pub const MIN_CANDIDATE_COUNT: usize = 3;

/// Years over which the temporal rerank component decays to zero.
pub const TEMPORAL_WINDOW_YEARS: i32 = 10;

/// Default per-call embedding timeout in seconds.
pub const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 30;

/// Default per-call LLM timeout in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Default wall-clock budget for a whole generation, in seconds.
pub const DEFAULT_GENERATION_BUDGET_SECS: u64 = 120;

/// Default retry cap for transient provider errors.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default primary chat model.
pub const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o";

/// Default fallback chat model for explicit provider errors.
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Embedding cost per 1k tokens in USD, for the ingest report estimate.
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.000_02;

/// Disclaimer appended to every prediction.
pub const DEFAULT_DISCLAIMER: &str = "This prediction is generated from past tribunal decisions \
     and is not legal advice. Outcomes depend on facts and evidence the \
     model cannot verify. Consult a qualified adviser before acting.";

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name sent to the provider.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: usize,
    /// Items per request, capped at [`MAX_EMBEDDING_BATCH`].
    pub batch_size: usize,
    /// In-flight batches during ingestion.
    pub concurrency: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retry cap for transient errors.
    pub max_retries: u32,
    /// Cost per 1k tokens in USD.
    pub cost_per_1k_tokens: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            batch_size: MAX_EMBEDDING_BATCH,
            concurrency: DEFAULT_EMBED_CONCURRENCY,
            timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
        }
    }
}

/// Chunker settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks of the same section, in tokens.
    pub chunk_overlap: usize,
    /// Hard cap on chunk size in tokens.
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}

/// Retrieval and rerank settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched from each store before fusion.
    pub initial_retrieval_k: usize,
    /// Results returned after reranking.
    pub final_top_k: usize,
    /// RRF `k` constant.
    pub rrf_k: u32,
    /// Weight of the semantic ranked list; BM25 gets `1 - semantic_weight`.
    pub semantic_weight: f64,
    /// Uncertainty threshold on aggregate confidence.
    pub min_confidence_threshold: f64,
    /// Uncertainty threshold on top semantic similarity.
    pub min_similarity_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            initial_retrieval_k: DEFAULT_INITIAL_RETRIEVAL_K,
            final_top_k: DEFAULT_FINAL_TOP_K,
            rrf_k: DEFAULT_RRF_K,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            min_confidence_threshold: DEFAULT_MIN_CONFIDENCE,
            min_similarity_threshold: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// Synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Primary chat model.
    pub primary_model: String,
    /// Fallback model for explicit provider errors.
    pub fallback_model: String,
    /// Per-call LLM timeout in seconds.
    pub llm_timeout_secs: u64,
    /// Wall-clock budget for a whole generation, in seconds.
    pub generation_budget_secs: u64,
    /// Retry cap for transient errors.
    pub max_retries: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            generation_budget_secs: DEFAULT_GENERATION_BUDGET_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Full engine configuration, injected into every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the persisted state layout.
    pub data_dir: PathBuf,
    /// Minimum extractable characters before a PDF is skipped.
    pub min_extract_chars: usize,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Chunker settings.
    pub chunking: ChunkingConfig,
    /// Retrieval and rerank settings.
    pub retrieval: RetrievalConfig,
    /// Synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Issue-type keyword dictionary for the rerank issue-match term.
    pub issue_keywords: BTreeMap<IssueKind, Vec<String>>,
    /// Evidence-type keyword dictionary for the rerank evidence term.
    pub evidence_keywords: BTreeMap<EvidenceKind, Vec<String>>,
    /// Disclaimer appended to every prediction.
    pub disclaimer: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            min_extract_chars: DEFAULT_MIN_EXTRACT_CHARS,
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            synthesis: SynthesisConfig::default(),
            issue_keywords: default_issue_keywords(),
            evidence_keywords: default_evidence_keywords(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a config rooted at the given data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Directory holding both persistent indices.
    #[must_use]
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }

    /// Semantic store database path.
    #[must_use]
    pub fn semantic_db_path(&self) -> PathBuf {
        self.embeddings_dir().join("semantic.db")
    }

    /// Serialized sparse index path.
    #[must_use]
    pub fn sparse_index_path(&self) -> PathBuf {
        self.embeddings_dir().join("bm25_index.json")
    }

    /// Source PDF directory (read-only for the engine).
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Prediction record directory.
    #[must_use]
    pub fn predictions_dir(&self) -> PathBuf {
        self.data_dir.join("predictions")
    }

    /// Validates value ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range or inconsistent
    /// settings.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            }
            .into())
        };

        if self.chunking.chunk_size == 0 {
            return fail("chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return fail("chunk_overlap must be less than chunk_size");
        }
        if self.chunking.chunk_size > self.chunking.max_chunk_size {
            return fail("chunk_size exceeds max_chunk_size");
        }
        if self.embedding.batch_size == 0 || self.embedding.batch_size > MAX_EMBEDDING_BATCH {
            return fail("embedding batch_size must be in 1..=50");
        }
        if self.embedding.concurrency == 0 {
            return fail("embedding concurrency must be > 0");
        }
        if !(0.0..=1.0).contains(&self.retrieval.semantic_weight) {
            return fail("semantic_weight must be in [0,1]");
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_confidence_threshold)
            || !(0.0..=1.0).contains(&self.retrieval.min_similarity_threshold)
        {
            return fail("confidence and similarity thresholds must be in [0,1]");
        }
        if self.retrieval.final_top_k == 0
            || self.retrieval.final_top_k > self.retrieval.initial_retrieval_k
        {
            return fail("final_top_k must be in 1..=initial_retrieval_k");
        }
        Ok(())
    }

    /// Ensures the provider credential is present. Called once at
    /// startup by commands that reach the network.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the key is unset.
    pub fn require_credentials(&self) -> Result<()> {
        if std::env::var(ENV_API_KEY).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(ConfigError::MissingCredential {
                var: ENV_API_KEY.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Resolves the default data directory: `$TRIBUNAL_DATA_DIR`, falling
/// back to `~/.local/share/tribunal-rs`, falling back to `./data`.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    std::env::var_os(ENV_DATA_DIR).map_or_else(
        || {
            dirs::data_dir().map_or_else(
                || Path::new("data").to_path_buf(),
                |d| d.join("tribunal-rs"),
            )
        },
        PathBuf::from,
    )
}

/// Built-in issue-keyword dictionary. Keywords are matched lowercased
/// against chunk text; substrings are deliberate (e.g. `decorat`
/// matches both "decorating" and "redecoration").
#[must_use]
pub fn default_issue_keywords() -> BTreeMap<IssueKind, Vec<String>> {
    let entry = |kind: IssueKind, words: &[&str]| {
        (kind, words.iter().map(ToString::to_string).collect::<Vec<_>>())
    };
    BTreeMap::from([
        entry(
            IssueKind::Cleaning,
            &["cleaning", "clean", "professional clean", "stain", "grime"],
        ),
        entry(
            IssueKind::Damage,
            &["damage", "inventory", "check-in", "check-out", "repair", "broken", "wear and tear"],
        ),
        entry(
            IssueKind::DepositProtection,
            &[
                "213",
                "214",
                "protect",
                "prescribed information",
                "tenancy deposit scheme",
                "housing act 2004",
            ],
        ),
        entry(
            IssueKind::RentArrears,
            &["arrears", "unpaid rent", "rent due", "outstanding rent"],
        ),
        entry(IssueKind::Redecoration, &["decorat", "repaint", "paintwork"]),
        entry(IssueKind::Gardening, &["garden", "lawn", "overgrown"]),
        entry(
            IssueKind::MissingItems,
            &["missing", "removed from the property", "inventory"],
        ),
        entry(
            IssueKind::UnpaidBills,
            &["utility", "council tax", "outstanding bill", "water charges"],
        ),
        entry(IssueKind::Other, &[]),
    ])
}

/// Built-in evidence-keyword dictionary for the lightweight chunk
/// evidence-type classification.
#[must_use]
pub fn default_evidence_keywords() -> BTreeMap<EvidenceKind, Vec<String>> {
    let entry = |kind: EvidenceKind, words: &[&str]| {
        (kind, words.iter().map(ToString::to_string).collect::<Vec<_>>())
    };
    BTreeMap::from([
        entry(
            EvidenceKind::Photographs,
            &["photograph", "photo", "video evidence"],
        ),
        entry(
            EvidenceKind::InventoryReport,
            &["inventory", "check-in report", "schedule of condition"],
        ),
        entry(
            EvidenceKind::CheckoutReport,
            &["check-out report", "checkout report", "check out report"],
        ),
        entry(
            EvidenceKind::TenancyAgreement,
            &["tenancy agreement", "assured shorthold", "clause"],
        ),
        entry(
            EvidenceKind::Correspondence,
            &["email", "letter", "correspondence", "text message"],
        ),
        entry(
            EvidenceKind::Receipts,
            &["receipt", "invoice", "quotation", "estimate"],
        ),
        entry(
            EvidenceKind::WitnessStatement,
            &["witness statement", "statement of truth"],
        ),
        entry(EvidenceKind::Other, &[]),
    ])
}
