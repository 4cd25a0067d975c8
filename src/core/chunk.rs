//! Chunk representation for indexed tribunal decisions.
//!
//! Chunks are section-aware windows over one document's text. Each chunk
//! carries its parent's case metadata, so store-level filters never need
//! a join back to the document.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::CaseMetadata;

/// Coarse structural tag for a chunk's source section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Background / introduction material.
    Background,
    /// Findings of fact.
    Facts,
    /// The tribunal's reasons or discussion.
    Reasoning,
    /// The decision, determination, or order.
    Decision,
    /// Text before the first recognized header, or unclassified.
    Other,
}

impl SectionKind {
    /// Stable lowercase name used in chunk ids and store columns.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Facts => "facts",
            Self::Reasoning => "reasoning",
            Self::Decision => "decision",
            Self::Other => "other",
        }
    }

    /// Parses a stored section name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "background" => Self::Background,
            "facts" => Self::Facts,
            "reasoning" => Self::Reasoning,
            "decision" => Self::Decision,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous text window from exactly one [`super::CaseDocument`].
///
/// Invariant: `year`, `region`, and `case_type` always equal the parent
/// document's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk id, deterministic for a given document:
    /// `<case_reference>:<section>:<seq>`.
    pub chunk_id: String,

    /// Parent case reference.
    pub case_reference: String,

    /// Section this chunk was cut from.
    pub section: SectionKind,

    /// Sequence number within the section (0-based).
    pub seq: usize,

    /// Chunk text.
    pub text: String,

    /// Token count under the ingestion tokenizer.
    pub token_count: usize,

    /// Decision year, inherited from the document.
    pub year: i32,

    /// Region code, inherited from the document.
    pub region: String,

    /// Case-type code, inherited from the document.
    pub case_type: String,
}

impl DocumentChunk {
    /// Builds the deterministic chunk id for a document section window.
    ///
    /// Re-ingesting the same document yields the same ids, which is what
    /// makes store upserts idempotent.
    #[must_use]
    pub fn make_id(case_reference: &str, section: SectionKind, seq: usize) -> String {
        format!("{case_reference}:{}:{seq:04}", section.as_str())
    }

    /// Creates a chunk inheriting metadata from its parent document.
    #[must_use]
    pub fn new(
        metadata: &CaseMetadata,
        section: SectionKind,
        seq: usize,
        text: String,
        token_count: usize,
    ) -> Self {
        Self {
            chunk_id: Self::make_id(&metadata.case_reference, section, seq),
            case_reference: metadata.case_reference.clone(),
            section,
            seq,
            text,
            token_count,
            year: metadata.year,
            region: metadata.region.clone(),
            case_type: metadata.case_type.clone(),
        }
    }

    /// Checks the chunk's inherited metadata against a document's.
    #[must_use]
    pub fn matches_document(&self, metadata: &CaseMetadata) -> bool {
        self.case_reference == metadata.case_reference
            && self.year == metadata.year
            && self.region == metadata.region
            && self.case_type == metadata.case_type
    }

    /// Returns a preview of the chunk text (first `max_len` bytes, cut
    /// at a character boundary).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.text.len() <= max_len {
            &self.text
        } else {
            let mut end = max_len;
            while !self.text.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.text[..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> CaseMetadata {
        CaseMetadata {
            case_reference: "LON_00BK_HMF_2022_0227".to_string(),
            year: 2023,
            region: "LON".to_string(),
            case_type: "HMF".to_string(),
        }
    }

    #[test]
    fn test_make_id_deterministic() {
        let a = DocumentChunk::make_id("LON_00BK_HMF_2022_0227", SectionKind::Reasoning, 3);
        let b = DocumentChunk::make_id("LON_00BK_HMF_2022_0227", SectionKind::Reasoning, 3);
        assert_eq!(a, b);
        assert_eq!(a, "LON_00BK_HMF_2022_0227:reasoning:0003");
    }

    #[test]
    fn test_chunk_inherits_metadata() {
        let chunk = DocumentChunk::new(&meta(), SectionKind::Facts, 0, "text".to_string(), 1);
        assert_eq!(chunk.year, 2023);
        assert_eq!(chunk.region, "LON");
        assert_eq!(chunk.case_type, "HMF");
        assert!(chunk.matches_document(&meta()));
    }

    #[test]
    fn test_matches_document_detects_drift() {
        let mut chunk = DocumentChunk::new(&meta(), SectionKind::Facts, 0, "text".to_string(), 1);
        chunk.year = 2019;
        assert!(!chunk.matches_document(&meta()));
    }

    #[test]
    fn test_section_kind_roundtrip() {
        for kind in [
            SectionKind::Background,
            SectionKind::Facts,
            SectionKind::Reasoning,
            SectionKind::Decision,
            SectionKind::Other,
        ] {
            assert_eq!(SectionKind::parse(kind.as_str()), kind);
        }
        assert_eq!(SectionKind::parse("garbage"), SectionKind::Other);
    }

    #[test]
    fn test_preview_respects_char_boundary() {
        let chunk = DocumentChunk::new(
            &meta(),
            SectionKind::Other,
            0,
            "d\u{e9}cision text".to_string(),
            3,
        );
        // Cutting inside the two-byte e-acute must back off.
        let p = chunk.preview(2);
        assert!(p.len() <= 2);
        assert!(chunk.text.starts_with(p));
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = DocumentChunk::new(&meta(), SectionKind::Decision, 1, "order".to_string(), 1);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"section\":\"decision\""));
        let back: DocumentChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
