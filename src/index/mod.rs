//! The index layer: two stores, one truth.
//!
//! [`IndexLayer`] owns the semantic (`SQLite` + embeddings) and sparse
//! (BM25) stores over the same chunk set. Ingestion is per-document
//! atomic: the semantic write is one transaction, the sparse update
//! follows in memory, and the sparse file is only persisted when a
//! batch completes with both stores in agreement. The sparse index is
//! always fully reconstructible from the semantic store, which is the
//! recovery path for corrupted sparse state.
//!
//! Lifecycle is `open(data_dir) -> serve -> close` (drop). The engine
//! serializes access, so queries see either the pre-batch or post-batch
//! state, never a mix.

mod schema;
mod semantic;
mod sparse;

pub use semantic::{CorpusStats, SearchFilters, SemanticStore, blob_to_embedding, embedding_to_blob};
pub use sparse::{BM25_B, BM25_K1, SparseIndex, tokenize};

use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::{CaseDocument, DocumentChunk};
use crate::error::{IndexError, Result};

/// Both persistent stores plus the document transaction boundary.
pub struct IndexLayer {
    semantic: SemanticStore,
    sparse: SparseIndex,
    sparse_path: PathBuf,
}

impl IndexLayer {
    /// Opens both stores under the embeddings directory.
    ///
    /// A missing sparse file with a non-empty semantic store is
    /// rebuilt on the spot (the common post-crash state); a corrupt
    /// file is rebuilt with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the semantic store cannot be opened.
    pub fn open(semantic_db: PathBuf, sparse_path: PathBuf) -> Result<Self> {
        let semantic = SemanticStore::open(&semantic_db)?;

        let sparse = if sparse_path.exists() {
            match SparseIndex::load(&sparse_path) {
                Ok(index) => index,
                Err(e) => {
                    warn!(error = %e, "sparse index unreadable, rebuilding from semantic store");
                    Self::build_sparse(&semantic)?
                }
            }
        } else if semantic.chunk_count()? > 0 {
            warn!("sparse index missing, rebuilding from semantic store");
            Self::build_sparse(&semantic)?
        } else {
            SparseIndex::new()
        };

        let layer = Self {
            semantic,
            sparse,
            sparse_path,
        };
        layer.check_in_sync()?;
        Ok(layer)
    }

    /// Creates a fully in-memory layer for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(sparse_path: PathBuf) -> Result<Self> {
        Ok(Self {
            semantic: SemanticStore::in_memory()?,
            sparse: SparseIndex::new(),
            sparse_path,
        })
    }

    fn build_sparse(semantic: &SemanticStore) -> Result<SparseIndex> {
        let chunks = semantic.all_chunks()?;
        Ok(SparseIndex::from_texts(
            chunks.iter().map(|c| (c.chunk_id.as_str(), c.text.as_str())),
        ))
    }

    /// Ingests one document atomically into both stores. The semantic
    /// write is a single transaction; if it fails, the sparse index is
    /// untouched and the document can be re-ingested wholly.
    ///
    /// # Errors
    ///
    /// Returns an error on transaction failure or count mismatch.
    pub fn ingest_document(
        &mut self,
        doc: &CaseDocument,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        model_name: &str,
    ) -> Result<()> {
        self.semantic
            .upsert_document(doc, chunks, embeddings, model_name)?;

        // Drop sparse entries from a previous ingestion of this case
        // that the new chunking no longer produces, then upsert.
        let prefix = format!("{}:", doc.metadata.case_reference);
        let stale: Vec<String> = self
            .sparse
            .chunk_ids()
            .into_iter()
            .filter(|id| {
                id.starts_with(&prefix) && !chunks.iter().any(|c| &c.chunk_id == id)
            })
            .collect();
        for id in stale {
            self.sparse.remove_document(&id);
        }
        for chunk in chunks {
            self.sparse.add_document(&chunk.chunk_id, &chunk.text);
        }
        Ok(())
    }

    /// Completes an ingestion batch: verifies the stores agree and
    /// persists the sparse index atomically. An empty corpus persists
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreMismatch`] when the stores disagree
    /// and persistence errors otherwise.
    pub fn finish_batch(&mut self) -> Result<()> {
        self.check_in_sync()?;
        if !self.sparse.is_empty() {
            self.sparse.save(&self.sparse_path)?;
            info!(
                chunks = self.sparse.len(),
                path = %self.sparse_path.display(),
                "sparse index persisted"
            );
        }
        Ok(())
    }

    /// Verifies `semantic.ids == sparse.ids` as sets.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreMismatch`] when they disagree.
    pub fn check_in_sync(&self) -> Result<()> {
        let semantic_ids = self.semantic.chunk_ids()?;
        let sparse_ids = self.sparse.chunk_ids();
        if semantic_ids != sparse_ids {
            return Err(IndexError::StoreMismatch {
                semantic: semantic_ids.len(),
                sparse: sparse_ids.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Rebuilds the sparse index wholly from semantic-store chunk
    /// texts and persists it. This is the recovery path for corrupted
    /// sparse state.
    ///
    /// # Errors
    ///
    /// Returns an error if the semantic store cannot be read or the
    /// rebuilt index cannot be persisted.
    pub fn rebuild_sparse_from_semantic(&mut self) -> Result<usize> {
        self.sparse = Self::build_sparse(&self.semantic)?;
        if !self.sparse.is_empty() {
            self.sparse.save(&self.sparse_path)?;
        }
        info!(chunks = self.sparse.len(), "sparse index rebuilt from semantic store");
        Ok(self.sparse.len())
    }

    /// Semantic nearest-neighbour search.
    ///
    /// # Errors
    ///
    /// Returns an error if the semantic store fails.
    pub fn search_semantic(
        &self,
        query_embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<(String, f32)>> {
        self.semantic.search(query_embedding, k, filters)
    }

    /// Sparse BM25 search. Filters are applied post-hoc by chunk
    /// metadata lookup so both stores honour the same predicates.
    ///
    /// # Errors
    ///
    /// Returns an error if chunk metadata lookups fail.
    pub fn search_sparse(
        &self,
        query_tokens: &[String],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<(String, f64)>> {
        // Over-fetch when filtering, then trim to k.
        let fetch = if filters.is_empty() { k } else { k * 4 };
        let hits = self.sparse.search(query_tokens, fetch);
        if filters.is_empty() {
            return Ok(hits);
        }

        let mut filtered = Vec::with_capacity(k);
        for (chunk_id, score) in hits {
            let Some(chunk) = self.semantic.get_chunk(&chunk_id)? else {
                continue;
            };
            if Self::chunk_passes(&chunk, filters) {
                filtered.push((chunk_id, score));
                if filtered.len() >= k {
                    break;
                }
            }
        }
        Ok(filtered)
    }

    fn chunk_passes(chunk: &DocumentChunk, filters: &SearchFilters) -> bool {
        if let Some(year_min) = filters.year_min {
            if chunk.year < year_min {
                return false;
            }
        }
        if let Some(regions) = &filters.regions {
            if !regions.iter().any(|r| r == &chunk.region) {
                return false;
            }
        }
        if let Some(case_type) = &filters.case_type {
            if case_type != &chunk.case_type {
                return false;
            }
        }
        if let Some(section) = filters.section {
            if section != chunk.section {
                return false;
            }
        }
        true
    }

    /// Looks up a chunk by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the semantic store fails.
    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        self.semantic.get_chunk(chunk_id)
    }

    /// Number of chunks (both stores agree after any batch).
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn chunk_count(&self) -> Result<usize> {
        self.semantic.chunk_count()
    }

    /// Corpus statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics queries fail.
    pub fn stats(&self) -> Result<CorpusStats> {
        self.semantic.stats()
    }

    /// Deletes all corpus state: semantic rows and the sparse file.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub fn clear(&mut self) -> Result<()> {
        self.semantic.clear()?;
        self.sparse = SparseIndex::new();
        if self.sparse_path.exists() {
            std::fs::remove_file(&self.sparse_path).map_err(|e| IndexError::Io {
                path: self.sparse_path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
