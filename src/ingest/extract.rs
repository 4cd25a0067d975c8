//! PDF text extraction.
//!
//! Wraps `pdf-extract` and enforces the minimum-text gate: decisions
//! published as image-only scans yield almost no extractable text and
//! are skipped by the batch driver rather than indexed as noise.

use std::path::Path;

use crate::error::IngestionError;

/// Extracts the full text of a PDF, paragraph breaks preserved.
///
/// # Errors
///
/// Returns [`IngestionError::UnreadablePdf`] when the file cannot be
/// parsed at all, and [`IngestionError::ScanOnly`] when fewer than
/// `min_chars` characters of text are extractable.
pub fn extract_text(path: &Path, min_chars: usize) -> Result<String, IngestionError> {
    let text = pdf_extract::extract_text(path).map_err(|e| IngestionError::UnreadablePdf {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let extractable = text.trim().chars().count();
    if extractable < min_chars {
        return Err(IngestionError::ScanOnly {
            path: path.display().to_string(),
            chars: extractable,
            min: min_chars,
        });
    }

    Ok(text)
}
