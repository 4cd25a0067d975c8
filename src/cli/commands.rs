//! Command execution.
//!
//! Dispatches parsed CLI commands against the engine and formats the
//! results. Warnings go to stderr through tracing and never change the
//! exit code; only configuration and fatal errors propagate.

use crate::Engine;
use crate::cli::output::{
    OutputFormat, format_ingest_report, format_prediction, format_retrieval, format_stats,
};
use crate::cli::parser::{Cli, Commands};
use crate::core::CaseFile;
use crate::error::{ConfigError, Result};
use crate::index::SearchFilters;
use crate::synthesis::GenerationOptions;

/// Executes a parsed CLI invocation and returns the rendered output.
///
/// # Errors
///
/// Returns configuration and fatal engine errors; degraded results are
/// rendered, not raised.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = cli.engine_config();

    match &cli.command {
        Commands::Ingest {
            pdf_dir,
            batch_size,
        } => {
            config.require_credentials()?;
            let mut engine = Engine::open(config)?;
            let report = engine.ingest_dir(pdf_dir, *batch_size).await?;
            Ok(format_ingest_report(&report, format))
        }

        Commands::Query {
            query,
            region,
            year_min,
            case_type,
            top_k,
        } => {
            config.require_credentials()?;
            let engine = Engine::open(config)?;
            let filters = SearchFilters {
                year_min: *year_min,
                regions: None,
                case_type: case_type.clone(),
                section: None,
            };
            let result = engine
                .retrieve(query, *top_k, &filters, region.clone())
                .await?;
            Ok(format_retrieval(&result, format))
        }

        Commands::Predict {
            case_file,
            no_reasoning,
            max_cases,
        } => {
            let raw = std::fs::read_to_string(case_file).map_err(|e| ConfigError::Invalid {
                reason: format!("cannot read case file {}: {e}", case_file.display()),
            })?;
            let case: CaseFile = serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                reason: format!("invalid case file {}: {e}", case_file.display()),
            })?;
            config.require_credentials()?;

            let engine = Engine::open(config)?;
            let options = GenerationOptions {
                include_reasoning: !no_reasoning,
                max_cases: *max_cases,
            };
            let prediction = engine.generate_prediction(&case, options).await?;
            Ok(format_prediction(&prediction, format))
        }

        Commands::Stats => {
            let engine = Engine::open(config)?;
            let stats = engine.corpus_stats()?;
            Ok(format_stats(&stats, format))
        }

        Commands::Clear { yes } => {
            if !*yes {
                return Err(ConfigError::Invalid {
                    reason: "clear deletes the whole corpus; pass --yes to confirm".to_string(),
                }
                .into());
            }
            let mut engine = Engine::open(config)?;
            engine.clear()?;
            Ok("Corpus cleared.\n".to_string())
        }

        Commands::RebuildBm25 => {
            let mut engine = Engine::open(config)?;
            let chunks = engine.rebuild_sparse_from_semantic()?;
            match format {
                OutputFormat::Text => Ok(format!("Sparse index rebuilt: {chunks} chunks.\n")),
                OutputFormat::Json => {
                    #[derive(serde::Serialize)]
                    struct RebuildOutput {
                        chunks: usize,
                    }
                    Ok(serde_json::to_string_pretty(&RebuildOutput { chunks })
                        .unwrap_or_default())
                }
            }
        }
    }
}
