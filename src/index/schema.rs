//! Semantic store schema definitions.
//!
//! Contains SQL schema and migration logic for the semantic store
//! database under `<data>/embeddings/`.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Tribunal decisions (immutable after ingestion)
CREATE TABLE IF NOT EXISTS documents (
    case_reference TEXT PRIMARY KEY,
    year INTEGER NOT NULL,
    region TEXT NOT NULL,
    case_type TEXT NOT NULL,
    full_text TEXT NOT NULL,
    source_path TEXT,
    ingested_at INTEGER NOT NULL
);

-- Section-aware chunks; metadata denormalized from the parent document
-- so store-level filters never need a join
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    case_reference TEXT NOT NULL,
    section TEXT NOT NULL,
    seq INTEGER NOT NULL,
    text TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    year INTEGER NOT NULL,
    region TEXT NOT NULL,
    case_type TEXT NOT NULL,
    FOREIGN KEY (case_reference) REFERENCES documents(case_reference) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_case ON chunks(case_reference);
CREATE INDEX IF NOT EXISTS idx_chunks_year ON chunks(year);
CREATE INDEX IF NOT EXISTS idx_chunks_region ON chunks(region);
CREATE INDEX IF NOT EXISTS idx_chunks_section ON chunks(section);

-- Dense embeddings, f32 little-endian BLOBs
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model_name TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Migrations from older schema versions.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations. None yet; v1 is the first released schema.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}
