//! Case metadata resolution.
//!
//! The scraper writes a sidecar JSON next to each PDF with the decision
//! year and reference. The sidecar is the primary source; when it is
//! absent or partial, the BAILII filename convention
//! `<REGION>_<office>_<type>_<year>_<seq>` fills the gaps. On conflict
//! the sidecar wins. A document with neither source is rejected.

use std::path::Path;

use serde::Deserialize;

use crate::core::{CaseMetadata, CaseReference};
use crate::error::IngestionError;

/// Sidecar JSON written by the scraper. All fields optional; whatever
/// is present takes precedence over the path parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sidecar {
    /// Case reference.
    #[serde(default)]
    pub case_reference: Option<String>,
    /// Decision (publication) year. Aliased because older scraper
    /// versions wrote `year`.
    #[serde(default, alias = "year")]
    pub decision_year: Option<i32>,
    /// Region code.
    #[serde(default)]
    pub region: Option<String>,
    /// Case-type code.
    #[serde(default)]
    pub case_type: Option<String>,
}

impl Sidecar {
    /// Loads the sidecar next to a PDF (`<stem>.json`), if present.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::MalformedSidecar`] when the file exists
    /// but cannot be parsed; a missing file is `Ok(None)`.
    pub fn load_for(pdf_path: &Path) -> Result<Option<Self>, IngestionError> {
        let sidecar_path = pdf_path.with_extension("json");
        if !sidecar_path.exists() {
            return Ok(None);
        }
        let raw =
            std::fs::read_to_string(&sidecar_path).map_err(|e| IngestionError::MalformedSidecar {
                path: sidecar_path.display().to_string(),
                reason: e.to_string(),
            })?;
        let sidecar = serde_json::from_str(&raw).map_err(|e| IngestionError::MalformedSidecar {
            path: sidecar_path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(sidecar))
    }
}

/// Resolves full case metadata for a PDF from its sidecar and filename.
///
/// `year` is the decision year: the sidecar value when present, the
/// filing year embedded in the reference only as a fallback.
///
/// # Errors
///
/// Returns [`IngestionError::UnresolvableMetadata`] when no case
/// reference can be established, and [`IngestionError::MalformedSidecar`]
/// for an unparseable sidecar.
pub fn resolve_metadata(
    pdf_path: &Path,
    sidecar: Option<&Sidecar>,
) -> Result<CaseMetadata, IngestionError> {
    let stem = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let parsed = CaseReference::parse(stem);

    let case_reference = sidecar
        .and_then(|s| s.case_reference.clone())
        .or_else(|| parsed.as_ref().map(ToString::to_string))
        .ok_or_else(|| IngestionError::UnresolvableMetadata {
            path: pdf_path.display().to_string(),
        })?;

    // The sidecar reference may itself be better-formed than the path;
    // parse it for region/type fallbacks before giving up.
    let reference = parsed.or_else(|| CaseReference::parse(&case_reference));

    let region = sidecar
        .and_then(|s| s.region.clone())
        .or_else(|| reference.as_ref().map(|r| r.region.clone()))
        .ok_or_else(|| IngestionError::UnresolvableMetadata {
            path: pdf_path.display().to_string(),
        })?;

    let case_type = sidecar
        .and_then(|s| s.case_type.clone())
        .or_else(|| reference.as_ref().map(|r| r.case_type.clone()))
        .ok_or_else(|| IngestionError::UnresolvableMetadata {
            path: pdf_path.display().to_string(),
        })?;

    let year = sidecar
        .and_then(|s| s.decision_year)
        .or_else(|| reference.as_ref().map(|r| r.filing_year))
        .ok_or_else(|| IngestionError::UnresolvableMetadata {
            path: pdf_path.display().to_string(),
        })?;

    Ok(CaseMetadata {
        case_reference,
        year,
        region,
        case_type,
    })
}
