//! Core domain types for the prediction engine.
//!
//! The data model follows the corpus side (documents and chunks), the
//! user side (case files), and the output side (predictions with
//! citations). Corpus types are immutable once created; case files are
//! owned by the intake collaborator and only borrowed here.

mod casefile;
mod chunk;
mod document;
mod prediction;

pub use casefile::{
    CaseFile, ClaimedAmount, EvidenceItem, EvidenceKind, IssueKind, PartyRole, Property,
    RequiredField, Tenancy,
};
pub use chunk::{DocumentChunk, SectionKind};
pub use document::{CaseDocument, CaseMetadata, CaseReference};
pub use prediction::{Citation, IssuePrediction, Outcome, Prediction, ReasoningStep};

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
#[must_use]
pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
