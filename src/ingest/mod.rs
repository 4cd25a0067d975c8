//! Document processing: PDF to [`CaseDocument`].
//!
//! The processor runs extract, clean, and metadata resolution for one
//! PDF at a time. Batch orchestration (embedding, the per-document
//! store transaction, skip accounting) lives in the engine, which owns
//! the index layer.

mod clean;
mod extract;
mod metadata;

pub use clean::{
    EMAIL_PLACEHOLDER, PHONE_PLACEHOLDER, POSTCODE_PLACEHOLDER, clean, collapse_whitespace,
    normalize_for_match, redact_pii, repair_ligatures,
};
pub use extract::extract_text;
pub use metadata::{Sidecar, resolve_metadata};

use std::path::Path;

use serde::Serialize;

use crate::core::CaseDocument;
use crate::error::IngestionError;

/// Outcome summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// PDFs found in the input directory.
    pub documents_in: usize,
    /// Documents fully ingested into both stores.
    pub documents_ok: usize,
    /// Documents skipped with a warning (scan-only, bad metadata).
    pub documents_skipped: usize,
    /// Chunks created across all ingested documents.
    pub chunks_created: usize,
    /// Tokens sent to the embedding provider.
    pub embedding_tokens: usize,
    /// Estimated embedding cost in USD.
    pub cost_estimate_usd: f64,
}

/// Stateless PDF-to-document processor.
#[derive(Debug, Clone, Copy)]
pub struct DocumentProcessor {
    /// Minimum extractable characters before a PDF is treated as
    /// scan-only.
    pub min_extract_chars: usize,
}

impl DocumentProcessor {
    /// Creates a processor with the given scan-only threshold.
    #[must_use]
    pub const fn new(min_extract_chars: usize) -> Self {
        Self { min_extract_chars }
    }

    /// Processes one PDF into a cleaned, redacted [`CaseDocument`].
    ///
    /// # Errors
    ///
    /// Propagates extraction and metadata errors; the caller decides
    /// which of them are skip-with-warning versus fatal.
    pub fn process(&self, pdf_path: &Path) -> Result<CaseDocument, IngestionError> {
        let raw = extract_text(pdf_path, self.min_extract_chars)?;
        let sidecar = Sidecar::load_for(pdf_path)?;
        let meta = resolve_metadata(pdf_path, sidecar.as_ref())?;
        let text = clean(&raw);
        Ok(CaseDocument::new(
            meta,
            text,
            Some(pdf_path.display().to_string()),
        ))
    }

    /// Whether an ingestion error is skippable (warn and continue)
    /// rather than fatal for the batch.
    #[must_use]
    pub const fn is_skippable(err: &IngestionError) -> bool {
        matches!(
            err,
            IngestionError::ScanOnly { .. }
                | IngestionError::UnresolvableMetadata { .. }
                | IngestionError::UnreadablePdf { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_classification() {
        assert!(DocumentProcessor::is_skippable(&IngestionError::ScanOnly {
            path: "a.pdf".to_string(),
            chars: 3,
            min: 500,
        }));
        assert!(DocumentProcessor::is_skippable(
            &IngestionError::UnresolvableMetadata {
                path: "a.pdf".to_string()
            }
        ));
        assert!(!DocumentProcessor::is_skippable(
            &IngestionError::Chunking {
                reason: "overlap".to_string()
            }
        ));
    }

    #[test]
    fn test_report_serializes() {
        let report = IngestReport {
            documents_in: 10,
            documents_ok: 8,
            documents_skipped: 2,
            chunks_created: 120,
            embedding_tokens: 48_000,
            cost_estimate_usd: 0.000_96,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["documents_ok"], 8);
        assert_eq!(json["chunks_created"], 120);
    }
}
