//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EngineConfig;

/// tribunal-rs: tenancy deposit dispute outcome prediction.
///
/// Ingests First-tier Tribunal (Property Chamber) decisions into a
/// hybrid semantic + BM25 corpus and predicts likely outcomes for
/// user-supplied case files with cited precedent.
#[derive(Parser, Debug)]
#[command(name = "tribunal-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root of the persisted data layout.
    ///
    /// Defaults to `$TRIBUNAL_DATA_DIR`, then the user data directory.
    #[arg(short, long, env = "TRIBUNAL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest tribunal decision PDFs into the corpus.
    Ingest {
        /// Directory of source PDFs (scraper output).
        #[arg(long)]
        pdf_dir: PathBuf,

        /// Persist the sparse index every N documents.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Run a hybrid retrieval query against the corpus.
    Query {
        /// Query text.
        query: String,

        /// Region hint for the rerank boost (e.g. LON).
        #[arg(short, long)]
        region: Option<String>,

        /// Only consider decisions from this year onward.
        #[arg(long)]
        year_min: Option<i32>,

        /// Only consider decisions with this case-type code.
        #[arg(long)]
        case_type: Option<String>,

        /// Number of results to return.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Generate a prediction for a case file.
    Predict {
        /// Path to the case file JSON (intake collaborator output).
        #[arg(long)]
        case_file: PathBuf,

        /// Omit the reasoning trace from the output.
        #[arg(long)]
        no_reasoning: bool,

        /// Cap on retrieved chunks consulted.
        #[arg(long)]
        max_cases: Option<usize>,
    },

    /// Show corpus statistics.
    Stats,

    /// Delete all corpus state.
    Clear {
        /// Skip confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Rebuild the BM25 index from the semantic store (recovery).
    #[command(name = "rebuild-bm25")]
    RebuildBm25,
}

impl Cli {
    /// Builds the engine configuration for this invocation.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        self.data_dir.clone().map_or_else(EngineConfig::default, EngineConfig::with_data_dir)
    }
}
