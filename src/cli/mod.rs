//! CLI layer for tribunal-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! ingesting tribunal PDFs, querying the corpus, generating
//! predictions, and index maintenance.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
