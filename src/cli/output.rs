//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use std::fmt::Write;

use serde::Serialize;

use crate::core::Prediction;
use crate::index::CorpusStats;
use crate::ingest::IngestReport;
use crate::retrieval::RetrievalResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Formats an error for the selected output format.
#[must_use]
pub fn format_error(err: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }
            format_json(&ErrorOutput {
                error: err.to_string(),
            })
        }
    }
}

/// Formats an ingestion report.
#[must_use]
pub fn format_ingest_report(report: &IngestReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("Ingestion complete\n");
            out.push_str("==================\n\n");
            let _ = writeln!(out, "  Documents found:    {}", report.documents_in);
            let _ = writeln!(out, "  Documents ingested: {}", report.documents_ok);
            let _ = writeln!(out, "  Documents skipped:  {}", report.documents_skipped);
            let _ = writeln!(out, "  Chunks created:     {}", report.chunks_created);
            let _ = writeln!(out, "  Embedding tokens:   {}", report.embedding_tokens);
            let _ = writeln!(out, "  Cost estimate:      ${:.4}", report.cost_estimate_usd);
            out
        }
    }
}

/// Formats a retrieval result.
#[must_use]
pub fn format_retrieval(result: &RetrievalResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(result),
        OutputFormat::Text => {
            let mut out = String::new();
            if result.results.is_empty() {
                out.push_str("No results.\n");
            } else {
                let _ = writeln!(
                    out,
                    "{:<4} {:<26} {:<5} {:<4} {:<10} {:<7} Preview",
                    "#", "Case", "Year", "Reg", "Section", "Score"
                );
                out.push_str(&"-".repeat(100));
                out.push('\n');
                for (i, scored) in result.results.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "{:<4} {:<26} {:<5} {:<4} {:<10} {:<7.3} {}",
                        i + 1,
                        scored.chunk.case_reference,
                        scored.chunk.year,
                        scored.chunk.region,
                        scored.chunk.section.as_str(),
                        scored.final_score,
                        scored.chunk.preview(60).replace('\n', " "),
                    );
                }
            }
            let _ = writeln!(out, "\nConfidence: {:.2}", result.confidence);
            if let Some(reason) = &result.uncertainty_reason {
                let _ = writeln!(out, "Uncertain:  {} ({})", reason.tag, reason.message);
            }
            out
        }
    }
}

/// Formats a prediction.
#[must_use]
pub fn format_prediction(prediction: &Prediction, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(prediction),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "Prediction for {}", prediction.case_id);
            out.push_str(&"=".repeat(40));
            out.push('\n');
            let _ = writeln!(
                out,
                "  Outcome:     {} (confidence {:.2})",
                prediction.overall_outcome, prediction.overall_confidence
            );
            if let Some(reason) = &prediction.uncertainty_reason {
                let _ = writeln!(out, "  Uncertainty: {reason}");
            }
            if !prediction.missing_fields.is_empty() {
                let fields: Vec<&str> =
                    prediction.missing_fields.iter().map(|f| f.as_str()).collect();
                let _ = writeln!(out, "  Missing:     {}", fields.join(", "));
            }

            for issue in &prediction.issues {
                let _ = writeln!(
                    out,
                    "\n  Issue: {} -> {} (confidence {:.2})",
                    issue.issue, issue.outcome, issue.confidence
                );
                if let Some(amount) = issue.amount {
                    let _ = writeln!(out, "    Amount:  {amount:.2} GBP");
                }
                if let Some([low, high]) = issue.amount_range {
                    let _ = writeln!(out, "    Range:   {low:.2} - {high:.2} GBP");
                }
                for factor in &issue.key_factors {
                    let _ = writeln!(out, "    Factor:  {factor}");
                }
                for citation in &issue.citations {
                    let _ = writeln!(
                        out,
                        "    Cite:    {} \"{}\"",
                        citation.case_reference,
                        truncate(&citation.quote, 70)
                    );
                }
            }

            if !prediction.reasoning.is_empty() {
                out.push_str("\n  Reasoning:\n");
                for (i, step) in prediction.reasoning.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "    {}. [{}] {}",
                        i + 1,
                        step.category,
                        truncate(&step.text, 100)
                    );
                }
            }

            if !prediction.cases_consulted.is_empty() {
                let _ = writeln!(
                    out,
                    "\n  Cases consulted: {}",
                    prediction.cases_consulted.join(", ")
                );
            }
            let _ = writeln!(out, "\n  {}", prediction.disclaimer);
            out
        }
    }
}

/// Formats corpus statistics.
#[must_use]
pub fn format_stats(stats: &CorpusStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(stats),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("Corpus statistics\n");
            out.push_str("=================\n\n");
            let _ = writeln!(out, "  Documents:    {}", stats.documents);
            let _ = writeln!(out, "  Unique cases: {}", stats.unique_cases);
            let _ = writeln!(out, "  Chunks:       {}", stats.chunks);

            if !stats.year_distribution.is_empty() {
                out.push_str("\n  By year:\n");
                for (year, count) in &stats.year_distribution {
                    let _ = writeln!(out, "    {year}: {count}");
                }
            }
            if !stats.region_distribution.is_empty() {
                out.push_str("\n  By region:\n");
                for (region, count) in &stats.region_distribution {
                    let _ = writeln!(out, "    {region}: {count}");
                }
            }
            if !stats.case_type_distribution.is_empty() {
                out.push_str("\n  By case type:\n");
                for (case_type, count) in &stats.case_type_distribution {
                    let _ = writeln!(out, "    {case_type}: {count}");
                }
            }
            out
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
