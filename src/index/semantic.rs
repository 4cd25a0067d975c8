//! `SQLite`-backed semantic store.
//!
//! Persists documents, chunks, and dense embeddings. Nearest-neighbour
//! queries score cosine similarity over the (optionally filtered)
//! candidate set in memory; at corpus scale (tens of thousands of
//! chunks) a linear scan with rayon is faster than maintaining an ANN
//! structure and keeps the store trivially rebuildable.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};

use crate::core::{CaseDocument, CaseMetadata, DocumentChunk, SectionKind};
use crate::embedding::cosine_similarity;
use crate::error::{IndexError, Result};
use crate::index::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};

/// Metadata predicates applied before similarity scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Keep chunks with `year >= year_min`.
    pub year_min: Option<i32>,
    /// Keep chunks whose region is in this set.
    pub regions: Option<Vec<String>>,
    /// Keep chunks with this case type.
    pub case_type: Option<String>,
    /// Keep chunks from this section kind.
    pub section: Option<SectionKind>,
}

impl SearchFilters {
    /// True when no predicate is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.year_min.is_none()
            && self.regions.is_none()
            && self.case_type.is_none()
            && self.section.is_none()
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(year) = self.year_min {
            clauses.push("c.year >= ?".to_string());
            values.push(Box::new(year));
        }
        if let Some(regions) = &self.regions {
            let marks = vec!["?"; regions.len()].join(", ");
            clauses.push(format!("c.region IN ({marks})"));
            for region in regions {
                values.push(Box::new(region.clone()));
            }
        }
        if let Some(case_type) = &self.case_type {
            clauses.push("c.case_type = ?".to_string());
            values.push(Box::new(case_type.clone()));
        }
        if let Some(section) = self.section {
            clauses.push("c.section = ?".to_string());
            values.push(Box::new(section.as_str().to_string()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Corpus statistics over the semantic store.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CorpusStats {
    /// Ingested documents.
    pub documents: usize,
    /// Distinct case references across chunks.
    pub unique_cases: usize,
    /// Total chunks.
    pub chunks: usize,
    /// Chunk count per decision year.
    pub year_distribution: BTreeMap<i32, usize>,
    /// Chunk count per region.
    pub region_distribution: BTreeMap<String, usize>,
    /// Chunk count per case type.
    pub case_type_distribution: BTreeMap<String, usize>,
}

/// `SQLite`-backed semantic store.
pub struct SemanticStore {
    /// Database connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SemanticStore {
    /// Opens or creates the store database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                    path: parent.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(&path).map_err(IndexError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(IndexError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(IndexError::from)?;

        let mut store = Self {
            conn,
            path: Some(path),
        };
        store.init()?;
        Ok(store)
    }

    /// Creates an in-memory store. Useful for testing and rebuilds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(IndexError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(IndexError::from)?;
        let mut store = Self { conn, path: None };
        store.init()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(IndexError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(IndexError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()? {
            if current < CURRENT_SCHEMA_VERSION {
                for migration in crate::index::schema::get_migrations_from(current) {
                    self.conn
                        .execute_batch(migration.sql)
                        .map_err(IndexError::from)?;
                }
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            }
        }
        Ok(())
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(IndexError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(IndexError::from)?;
        Ok(())
    }

    /// Upserts one document with its chunks and embeddings in a single
    /// transaction. Idempotent: chunk ids are deterministic per
    /// document, and any stale chunks from a previous ingestion of the
    /// same case are removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk/embedding counts disagree or any
    /// statement fails; the transaction rolls back in full.
    pub fn upsert_document(
        &mut self,
        doc: &CaseDocument,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        model_name: &str,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Database(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }

        let now = crate::core::current_timestamp();
        let tx = self.conn.transaction().map_err(IndexError::from)?;

        tx.execute(
            r"INSERT OR REPLACE INTO documents
              (case_reference, year, region, case_type, full_text, source_path, ingested_at)
              VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                doc.metadata.case_reference,
                doc.metadata.year,
                doc.metadata.region,
                doc.metadata.case_type,
                doc.full_text,
                doc.source_path,
                doc.ingested_at,
            ],
        )
        .map_err(IndexError::from)?;

        // Remove stale chunks from any previous ingestion of this case;
        // embeddings cascade.
        tx.execute(
            "DELETE FROM chunks WHERE case_reference = ?",
            params![doc.metadata.case_reference],
        )
        .map_err(IndexError::from)?;

        {
            let mut chunk_stmt = tx
                .prepare(
                    r"INSERT INTO chunks
                      (chunk_id, case_reference, section, seq, text, token_count,
                       year, region, case_type)
                      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(IndexError::from)?;
            let mut embed_stmt = tx
                .prepare(
                    r"INSERT INTO chunk_embeddings
                      (chunk_id, embedding, dimensions, model_name, created_at)
                      VALUES (?, ?, ?, ?, ?)",
                )
                .map_err(IndexError::from)?;

            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                chunk_stmt
                    .execute(params![
                        chunk.chunk_id,
                        chunk.case_reference,
                        chunk.section.as_str(),
                        chunk.seq as i64,
                        chunk.text,
                        chunk.token_count as i64,
                        chunk.year,
                        chunk.region,
                        chunk.case_type,
                    ])
                    .map_err(IndexError::from)?;
                embed_stmt
                    .execute(params![
                        chunk.chunk_id,
                        embedding_to_blob(embedding),
                        embedding.len() as i64,
                        model_name,
                        now,
                    ])
                    .map_err(IndexError::from)?;
            }
        }

        tx.commit().map_err(IndexError::from)?;
        Ok(())
    }

    /// Nearest-neighbour search by cosine similarity with optional
    /// metadata predicates. Returns `(chunk_id, similarity)` sorted
    /// descending, at most `k` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate query fails.
    pub fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<(String, f32)>> {
        let (where_sql, values) = filters.where_clause();
        let sql = format!(
            r"SELECT c.chunk_id, e.embedding
              FROM chunks c JOIN chunk_embeddings e ON e.chunk_id = c.chunk_id{where_sql}"
        );

        let mut stmt = self.conn.prepare(&sql).map_err(IndexError::from)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            values.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(IndexError::from)?;

        let candidates: Vec<(String, Vec<u8>)> =
            rows.collect::<std::result::Result<_, _>>().map_err(IndexError::from)?;

        let mut scored: Vec<(String, f32)> = candidates
            .into_par_iter()
            .map(|(chunk_id, blob)| {
                let embedding = blob_to_embedding(&blob);
                let sim = cosine_similarity(query_embedding, &embedding);
                (chunk_id, sim)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Retrieves a chunk by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        self.conn
            .query_row(
                r"SELECT chunk_id, case_reference, section, seq, text, token_count,
                         year, region, case_type
                  FROM chunks WHERE chunk_id = ?",
                params![chunk_id],
                row_to_chunk,
            )
            .optional()
            .map_err(|e| IndexError::from(e).into())
    }

    /// Retrieves all chunks ordered by id. This is the rebuild source
    /// for the sparse index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_chunks(&self) -> Result<Vec<DocumentChunk>> {
        let mut stmt = self
            .conn
            .prepare(
                r"SELECT chunk_id, case_reference, section, seq, text, token_count,
                         year, region, case_type
                  FROM chunks ORDER BY chunk_id",
            )
            .map_err(IndexError::from)?;
        let rows = stmt.query_map([], row_to_chunk).map_err(IndexError::from)?;
        rows.collect::<std::result::Result<_, _>>()
            .map_err(|e| IndexError::from(e).into())
    }

    /// All chunk ids, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn chunk_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id FROM chunks ORDER BY chunk_id")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(IndexError::from)?;
        rows.collect::<std::result::Result<_, _>>()
            .map_err(|e| IndexError::from(e).into())
    }

    /// Number of chunks in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        Ok(count as usize)
    }

    /// Number of documents in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        Ok(count as usize)
    }

    /// Retrieves a document's metadata by case reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_document_metadata(&self, case_reference: &str) -> Result<Option<CaseMetadata>> {
        self.conn
            .query_row(
                "SELECT case_reference, year, region, case_type FROM documents WHERE case_reference = ?",
                params![case_reference],
                |row| {
                    Ok(CaseMetadata {
                        case_reference: row.get(0)?,
                        year: row.get(1)?,
                        region: row.get(2)?,
                        case_type: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| IndexError::from(e).into())
    }

    /// Gathers corpus statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if any statistics query fails.
    pub fn stats(&self) -> Result<CorpusStats> {
        let documents = self.document_count()?;
        let chunks = self.chunk_count()?;
        let unique_cases: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(DISTINCT case_reference) FROM chunks",
                [],
                |row| row.get(0),
            )
            .map_err(IndexError::from)?;

        let mut stats = CorpusStats {
            documents,
            unique_cases: unique_cases as usize,
            chunks,
            ..CorpusStats::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT year, COUNT(*) FROM chunks GROUP BY year")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)?)))
            .map_err(IndexError::from)?;
        for row in rows {
            let (year, count) = row.map_err(IndexError::from)?;
            stats.year_distribution.insert(year, count as usize);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT region, COUNT(*) FROM chunks GROUP BY region")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(IndexError::from)?;
        for row in rows {
            let (region, count) = row.map_err(IndexError::from)?;
            stats.region_distribution.insert(region, count as usize);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT case_type, COUNT(*) FROM chunks GROUP BY case_type")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(IndexError::from)?;
        for row in rows {
            let (case_type, count) = row.map_err(IndexError::from)?;
            stats.case_type_distribution.insert(case_type, count as usize);
        }

        Ok(stats)
    }

    /// Deletes all stored state, preserving the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM chunk_embeddings;
            DELETE FROM chunks;
            DELETE FROM documents;
        ",
            )
            .map_err(IndexError::from)?;
        Ok(())
    }
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentChunk> {
    Ok(DocumentChunk {
        chunk_id: row.get(0)?,
        case_reference: row.get(1)?,
        section: SectionKind::parse(&row.get::<_, String>(2)?),
        seq: row.get::<_, i64>(3)? as usize,
        text: row.get(4)?,
        token_count: row.get::<_, i64>(5)? as usize,
        year: row.get(6)?,
        region: row.get(7)?,
        case_type: row.get(8)?,
    })
}

/// Serializes an embedding as little-endian f32 bytes.
#[must_use]
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserializes little-endian f32 bytes back into an embedding.
#[must_use]
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CaseMetadata;

    fn meta(case: &str, year: i32, region: &str) -> CaseMetadata {
        CaseMetadata {
            case_reference: case.to_string(),
            year,
            region: region.to_string(),
            case_type: "HMF".to_string(),
        }
    }

    fn doc_with_chunks(
        case: &str,
        year: i32,
        region: &str,
        texts: &[&str],
    ) -> (CaseDocument, Vec<DocumentChunk>, Vec<Vec<f32>>) {
        let metadata = meta(case, year, region);
        let doc = CaseDocument::new(metadata.clone(), texts.join("\n\n"), None);
        let chunks: Vec<DocumentChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                DocumentChunk::new(&metadata, SectionKind::Reasoning, i, (*t).to_string(), 5)
            })
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let embeddings: Vec<Vec<f32>> = (0..texts.len())
            .map(|i| vec![1.0, i as f32, 0.5])
            .collect();
        (doc, chunks, embeddings)
    }

    fn store_with_corpus() -> SemanticStore {
        let mut store = SemanticStore::in_memory().unwrap();
        let (doc, chunks, embeddings) = doc_with_chunks(
            "LON_00BK_HMF_2022_0227",
            2023,
            "LON",
            &["deposit not protected", "section 213 breach"],
        );
        store
            .upsert_document(&doc, &chunks, &embeddings, "test-model")
            .unwrap();
        let (doc, chunks, embeddings) =
            doc_with_chunks("CHI_00HB_HMF_2019_0042", 2019, "CHI", &["cleaning costs"]);
        store
            .upsert_document(&doc, &chunks, &embeddings, "test-model")
            .unwrap();
        store
    }

    #[test]
    fn test_blob_roundtrip() {
        let embedding = vec![0.25f32, -1.5, 3.25, 0.0];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_upsert_and_counts() {
        let store = store_with_corpus();
        assert_eq!(store.document_count().unwrap(), 2);
        assert_eq!(store.chunk_count().unwrap(), 3);
        assert_eq!(store.chunk_ids().unwrap().len(), 3);
    }

    #[test]
    fn test_upsert_idempotent() {
        let mut store = store_with_corpus();
        let before = store.chunk_ids().unwrap();

        let (doc, chunks, embeddings) = doc_with_chunks(
            "LON_00BK_HMF_2022_0227",
            2023,
            "LON",
            &["deposit not protected", "section 213 breach"],
        );
        store
            .upsert_document(&doc, &chunks, &embeddings, "test-model")
            .unwrap();

        assert_eq!(store.chunk_ids().unwrap(), before);
        assert_eq!(store.document_count().unwrap(), 2);
    }

    #[test]
    fn test_reingest_with_fewer_chunks_removes_stale() {
        let mut store = store_with_corpus();
        let (doc, chunks, embeddings) =
            doc_with_chunks("LON_00BK_HMF_2022_0227", 2023, "LON", &["only chunk now"]);
        store
            .upsert_document(&doc, &chunks, &embeddings, "test-model")
            .unwrap();
        // 1 (replaced doc) + 1 (other doc)
        assert_eq!(store.chunk_count().unwrap(), 2);
    }

    #[test]
    fn test_mismatched_embeddings_rejected() {
        let mut store = SemanticStore::in_memory().unwrap();
        let (doc, chunks, _) = doc_with_chunks("MAN_00BR_HMF_2021_0010", 2021, "MAN", &["a", "b"]);
        let err = store
            .upsert_document(&doc, &chunks, &[vec![1.0]], "m")
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
        // Transaction rolled back: nothing persisted.
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let store = store_with_corpus();
        // Query close to the i=1 embedding [1, 1, 0.5].
        let results = store
            .search(&[1.0, 1.0, 0.5], 10, &SearchFilters::default())
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].1 >= results[1].1);
        assert!((results[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_search_filters_by_year_and_region() {
        let store = store_with_corpus();
        let filters = SearchFilters {
            year_min: Some(2020),
            ..SearchFilters::default()
        };
        let results = store.search(&[1.0, 0.0, 0.5], 10, &filters).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(id, _)| id.starts_with("LON_")));

        let filters = SearchFilters {
            regions: Some(vec!["CHI".to_string()]),
            ..SearchFilters::default()
        };
        let results = store.search(&[1.0, 0.0, 0.5], 10, &filters).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].0.starts_with("CHI_"));
    }

    #[test]
    fn test_search_filter_by_section_no_match() {
        let store = store_with_corpus();
        let filters = SearchFilters {
            section: Some(SectionKind::Decision),
            ..SearchFilters::default()
        };
        let results = store.search(&[1.0, 0.0, 0.5], 10, &filters).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_get_chunk_and_metadata() {
        let store = store_with_corpus();
        let id = DocumentChunk::make_id("LON_00BK_HMF_2022_0227", SectionKind::Reasoning, 0);
        let chunk = store.get_chunk(&id).unwrap().unwrap();
        assert_eq!(chunk.text, "deposit not protected");
        assert_eq!(chunk.year, 2023);

        let meta = store
            .get_document_metadata("LON_00BK_HMF_2022_0227")
            .unwrap()
            .unwrap();
        assert_eq!(meta.region, "LON");
        assert!(store.get_chunk("missing:other:0000").unwrap().is_none());
    }

    #[test]
    fn test_chunk_metadata_matches_document() {
        let store = store_with_corpus();
        for chunk in store.all_chunks().unwrap() {
            let meta = store
                .get_document_metadata(&chunk.case_reference)
                .unwrap()
                .unwrap();
            assert!(chunk.matches_document(&meta));
        }
    }

    #[test]
    fn test_stats() {
        let store = store_with_corpus();
        let stats = store.stats().unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.unique_cases, 2);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.year_distribution[&2023], 2);
        assert_eq!(stats.region_distribution["CHI"], 1);
        assert_eq!(stats.case_type_distribution["HMF"], 3);
    }

    #[test]
    fn test_clear() {
        let mut store = store_with_corpus();
        store.clear().unwrap();
        assert_eq!(store.chunk_count().unwrap(), 0);
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[test]
    fn test_open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("embeddings").join("semantic.db");
        {
            let mut store = SemanticStore::open(&db_path).unwrap();
            let (doc, chunks, embeddings) =
                doc_with_chunks("LON_00AA_HMF_2020_0001", 2020, "LON", &["text"]);
            store
                .upsert_document(&doc, &chunks, &embeddings, "m")
                .unwrap();
        }
        let store = SemanticStore::open(&db_path).unwrap();
        assert_eq!(store.chunk_count().unwrap(), 1);
    }
}
