//! Tribunal decision documents and their identifying metadata.
//!
//! A [`CaseDocument`] is one First-tier Tribunal (Property Chamber)
//! decision after text extraction and cleaning. Documents are created by
//! the ingestion pipeline and immutable thereafter.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifying metadata shared by a document and all of its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    /// Stable case reference, e.g. `LON_00BK_HMF_2022_0227`.
    pub case_reference: String,

    /// Decision (publication) year. Never the filing year embedded in
    /// the case reference.
    pub year: i32,

    /// Three-letter tribunal region code, e.g. `LON`, `CHI`, `MAN`.
    pub region: String,

    /// Case-type code from the reference, e.g. `HMF`.
    pub case_type: String,
}

/// One tribunal decision, cleaned and PII-redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDocument {
    /// Identifying metadata.
    pub metadata: CaseMetadata,

    /// Full cleaned decision text.
    pub full_text: String,

    /// Source PDF path, when ingested from disk.
    pub source_path: Option<String>,

    /// Unix timestamp of ingestion.
    pub ingested_at: i64,
}

impl CaseDocument {
    /// Creates a document from cleaned text and resolved metadata.
    #[must_use]
    pub fn new(metadata: CaseMetadata, full_text: String, source_path: Option<String>) -> Self {
        Self {
            metadata,
            full_text,
            source_path,
            ingested_at: super::current_timestamp(),
        }
    }

    /// Returns the stable case reference.
    #[must_use]
    pub fn case_reference(&self) -> &str {
        &self.metadata.case_reference
    }
}

/// A parsed BAILII-convention case reference:
/// `<REGION>_<office>_<type>_<year>_<seq>`.
///
/// The embedded year is the *filing* year. Decision year comes from the
/// scraper sidecar when available; the filing year is only a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReference {
    /// Three-letter region code.
    pub region: String,
    /// Office code (local authority district), e.g. `00BK`.
    pub office: String,
    /// Case-type code, e.g. `HMF`, `LSC`.
    pub case_type: String,
    /// Filing year embedded in the reference.
    pub filing_year: i32,
    /// Sequence number within the year.
    pub sequence: String,
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"^([A-Z]{3})_([A-Z0-9]+)_([A-Z]+)_(\d{4})_(\d+)$").unwrap()
    })
}

impl CaseReference {
    /// Parses a reference from a file stem such as
    /// `LON_00BK_HMF_2022_0227`.
    ///
    /// Returns `None` when the stem does not follow the convention.
    #[must_use]
    pub fn parse(stem: &str) -> Option<Self> {
        let caps = reference_pattern().captures(stem.trim())?;
        Some(Self {
            region: caps[1].to_string(),
            office: caps[2].to_string(),
            case_type: caps[3].to_string(),
            filing_year: caps[4].parse().ok()?,
            sequence: caps[5].to_string(),
        })
    }
}

impl fmt::Display for CaseReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.region, self.office, self.case_type, self.filing_year, self.sequence
        )
    }
}
