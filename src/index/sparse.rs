//! Okapi BM25 sparse index.
//!
//! An in-memory inverted index over lowercased, punctuation-stripped
//! tokens, persisted as JSON next to the semantic store. The persisted
//! form holds the tokenized documents, document lengths, and the chunk
//! id ordering; IDF statistics and postings are recomputed on load, so
//! scoring tweaks never invalidate an index on disk.
//!
//! Persistence is atomic (temp file + rename) and an index with zero
//! documents is never written: an empty file on disk once divided by a
//! zero average document length at query time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// BM25 `k1` term-frequency saturation parameter.
pub const BM25_K1: f64 = 1.5;

/// BM25 `b` length-normalization parameter.
pub const BM25_B: f64 = 0.75;

/// Persisted file format version.
const FORMAT_VERSION: u32 = 1;

/// Serialized sparse index state.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSparse {
    version: u32,
    ids: Vec<String>,
    docs: Vec<Vec<String>>,
}

/// Lowercases and splits text on non-alphanumeric characters.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// In-memory BM25 index keyed by chunk id.
#[derive(Debug, Default)]
pub struct SparseIndex {
    ids: Vec<String>,
    id_to_pos: HashMap<String, usize>,
    docs: Vec<Vec<String>>,
    doc_lens: Vec<usize>,
    /// term -> (doc position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    avgdl: f64,
}

impl SparseIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(chunk_id, text)` pairs.
    #[must_use]
    pub fn from_texts<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new();
        for (id, text) in items {
            index.add_document(id, text);
        }
        index
    }

    /// Adds or replaces a document. Adding the same id with the same
    /// text is a no-op, which keeps re-ingestion idempotent.
    pub fn add_document(&mut self, chunk_id: &str, text: &str) {
        let tokens = tokenize(text);
        if let Some(&pos) = self.id_to_pos.get(chunk_id) {
            if self.docs[pos] == tokens {
                return;
            }
            self.docs[pos] = tokens;
            self.rebuild_stats();
            return;
        }

        let pos = self.ids.len();
        self.ids.push(chunk_id.to_string());
        self.id_to_pos.insert(chunk_id.to_string(), pos);
        self.doc_lens.push(tokens.len());
        for (term, tf) in term_frequencies(&tokens) {
            self.postings.entry(term).or_default().push((pos, tf));
        }
        self.docs.push(tokens);
        self.recompute_avgdl();
    }

    /// Removes a document by id, if present.
    pub fn remove_document(&mut self, chunk_id: &str) {
        if self.id_to_pos.remove(chunk_id).is_some() {
            let pos = self.ids.iter().position(|id| id == chunk_id);
            if let Some(pos) = pos {
                self.ids.remove(pos);
                self.docs.remove(pos);
            }
            self.rebuild_stats();
        }
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when the index holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All chunk ids, sorted.
    #[must_use]
    pub fn chunk_ids(&self) -> Vec<String> {
        let mut ids = self.ids.clone();
        ids.sort_unstable();
        ids
    }

    /// Searches with Okapi BM25 and returns `(chunk_id, score)` sorted
    /// descending, at most `k` entries. Only documents sharing at least
    /// one query token can score.
    #[must_use]
    pub fn search(&self, query_tokens: &[String], k: usize) -> Vec<(String, f64)> {
        if self.is_empty() || query_tokens.is_empty() {
            return Vec::new();
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.ids.len() as f64;
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for term in query_tokens {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let df = posting.len() as f64;
            // Okapi BM25 IDF with the +1 inside the log, which keeps it
            // non-negative for very common terms.
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(pos, tf) in posting {
                let tf = f64::from(tf);
                #[allow(clippy::cast_precision_loss)]
                let dl = self.doc_lens[pos] as f64;
                let norm = tf * (BM25_K1 + 1.0)
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / self.avgdl));
                *scores.entry(pos).or_insert(0.0) += idf * norm;
            }
        }

        let mut results: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(pos, score)| (self.ids[pos].clone(), score))
            .collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        results
    }

    /// Persists the index atomically (write temp, rename).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptySparsePersist`] for an empty index and
    /// I/O or serialization errors otherwise.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if self.is_empty() {
            return Err(IndexError::EmptySparsePersist);
        }

        let persisted = PersistedSparse {
            version: FORMAT_VERSION,
            ids: self.ids.clone(),
            docs: self.docs.clone(),
        };
        let payload = serde_json::to_vec(&persisted)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, payload).map_err(|e| IndexError::Io {
            path: tmp_path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| IndexError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Loads a persisted index, recomputing postings and statistics.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::SparseCorrupt`] for unreadable, empty, or
    /// wrong-version files.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::SparseCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let persisted: PersistedSparse =
            serde_json::from_str(&raw).map_err(|e| IndexError::SparseCorrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if persisted.version != FORMAT_VERSION {
            return Err(IndexError::SparseCorrupt {
                path: path.display().to_string(),
                reason: format!("unsupported format version {}", persisted.version),
            });
        }
        if persisted.ids.is_empty() || persisted.ids.len() != persisted.docs.len() {
            return Err(IndexError::SparseCorrupt {
                path: path.display().to_string(),
                reason: "empty or inconsistent document set".to_string(),
            });
        }

        let mut index = Self {
            ids: persisted.ids,
            docs: persisted.docs,
            ..Self::default()
        };
        index.rebuild_stats();
        Ok(index)
    }

    fn rebuild_stats(&mut self) {
        self.id_to_pos = self
            .ids
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();
        self.doc_lens = self.docs.iter().map(Vec::len).collect();
        self.postings.clear();
        for (pos, tokens) in self.docs.iter().enumerate() {
            for (term, tf) in term_frequencies(tokens) {
                self.postings.entry(term).or_default().push((pos, tf));
            }
        }
        self.recompute_avgdl();
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute_avgdl(&mut self) {
        if self.doc_lens.is_empty() {
            self.avgdl = 0.0;
        } else {
            self.avgdl =
                self.doc_lens.iter().sum::<usize>() as f64 / self.doc_lens.len() as f64;
        }
    }
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, u32> {
    let mut freqs: HashMap<String, u32> = HashMap::new();
    for token in tokens {
        *freqs.entry(token.clone()).or_insert(0) += 1;
    }
    freqs
}
