//! Error types for the prediction engine.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! engine operations including ingestion, indexing, retrieval, and
//! synthesis.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing credentials, invalid settings).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ingestion errors (PDF unreadable, metadata unresolvable).
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Index errors (store corruption, cross-store inconsistency).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Embedding provider errors.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Retrieval errors (all stores failed).
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Synthesis errors (LLM or output parsing failures).
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Configuration errors, surfaced at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required provider credential is absent from the environment.
    #[error("missing credential: set {var}")]
    MissingCredential {
        /// Environment variable that must be set.
        var: String,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// Data directory cannot be created or used.
    #[error("data directory unusable: {path}: {reason}")]
    DataDir {
        /// Offending path.
        path: String,
        /// Why it is unusable.
        reason: String,
    },
}

/// Ingestion errors for a single source document.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The PDF could not be opened or parsed at all.
    #[error("unreadable PDF: {path}: {reason}")]
    UnreadablePdf {
        /// Path to the source PDF.
        path: String,
        /// Underlying parser message.
        reason: String,
    },

    /// Too little extractable text; almost certainly a scan-only PDF.
    #[error("scan-only PDF (only {chars} extractable chars, need {min}): {path}")]
    ScanOnly {
        /// Path to the source PDF.
        path: String,
        /// Characters of text actually extracted.
        chars: usize,
        /// Configured minimum.
        min: usize,
    },

    /// No sidecar metadata and the filename does not follow the BAILII
    /// `<REGION>_<office>_<type>_<year>_<seq>` convention.
    #[error("cannot resolve case metadata for {path}")]
    UnresolvableMetadata {
        /// Path to the source PDF.
        path: String,
    },

    /// Sidecar JSON exists but cannot be parsed.
    #[error("malformed sidecar {path}: {reason}")]
    MalformedSidecar {
        /// Path to the sidecar file.
        path: String,
        /// Parse failure detail.
        reason: String,
    },

    /// Chunking produced an invalid configuration outcome.
    #[error("chunking failed: {reason}")]
    Chunking {
        /// Why chunking failed.
        reason: String,
    },
}

/// Index errors for the semantic and sparse stores.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Sparse index file is corrupt or unreadable.
    #[error("sparse index corrupt: {path}: {reason}")]
    SparseCorrupt {
        /// Path to the serialized index.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Refusing to persist an index with zero documents.
    #[error("refusing to persist empty sparse index")]
    EmptySparsePersist,

    /// The two stores disagree about the chunk set.
    #[error("store inconsistency: semantic has {semantic} chunks, sparse has {sparse}")]
    StoreMismatch {
        /// Chunk count in the semantic store.
        semantic: usize,
        /// Chunk count in the sparse store.
        sparse: usize,
    },

    /// Serialization of persisted index state failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure while persisting or loading index state.
    #[error("index I/O error: {path}: {reason}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying message.
        reason: String,
    },
}

/// Embedding provider errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider returned a non-retriable error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Provider error that is retriable (rate limit, transient 5xx).
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Per-call deadline elapsed.
    #[error("timed out after {seconds}s")]
    Timeout {
        /// Elapsed budget in seconds.
        seconds: u64,
    },

    /// Provider returned vectors of an unexpected dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimensions.
        expected: usize,
        /// Dimensions actually returned.
        got: usize,
    },
}

impl EmbeddingError {
    /// Whether the error should be retried with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}

/// Retrieval errors. A single store failing degrades the query instead of
/// raising; these fire only when no candidate path remains.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Both stores failed for the query.
    #[error("all retrieval stores failed: {reason}")]
    AllStoresFailed {
        /// Combined failure detail.
        reason: String,
    },

    /// Embedding the query text failed after retries.
    #[error("query embedding failed: {0}")]
    QueryEmbedding(String),
}

/// Synthesis errors from the LLM provider or output handling.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Provider returned a non-retriable error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Provider error that is retriable (rate limit, transient 5xx).
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The model output could not be parsed as the expected JSON schema.
    #[error("malformed model output: {reason}")]
    MalformedOutput {
        /// Parse failure detail.
        reason: String,
    },

    /// A per-call or whole-generation deadline elapsed.
    #[error("timed out after {seconds}s")]
    Timeout {
        /// Elapsed budget in seconds.
        seconds: u64,
    },
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Index(IndexError::Io {
            path: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Index(IndexError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SynthesisError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedOutput {
            reason: err.to_string(),
        }
    }
}

impl SynthesisError {
    /// Whether the error should trigger the fallback model / a retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}
