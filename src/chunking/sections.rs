//! Section-header detection for tribunal decisions.
//!
//! FTT (Property Chamber) decisions follow a loose structural
//! convention: a BACKGROUND/INTRODUCTION block, findings of fact,
//! reasons or discussion, then the decision or order. Headers appear
//! on their own line, usually uppercase, sometimes numbered and
//! sometimes prefixed with "THE". Text between two headers belongs to
//! the section of the preceding header; text before the first header is
//! tagged `other`.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::SectionKind;

/// One detected section with its text (header line included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    /// Section classification.
    pub kind: SectionKind,
    /// Full section text.
    pub text: String,
}

struct HeaderPattern {
    kind: SectionKind,
    pattern: Regex,
}

fn header_patterns() -> &'static [HeaderPattern] {
    static PATTERNS: OnceLock<Vec<HeaderPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // A header is a whole line: optional numbering, optional "THE",
        // the heading phrase, optional trailing colon. Case-insensitive
        // so "Background" and "BACKGROUND" both match.
        let build = |kind: SectionKind, phrase: &str| HeaderPattern {
            kind,
            #[allow(clippy::unwrap_used)] // compile-time constant patterns
            pattern: Regex::new(&format!(
                r"(?i)^\s*(?:\d+[.)]\s*)?(?:the\s+)?(?:{phrase})\s*:?\s*$"
            ))
            .unwrap(),
        };
        vec![
            build(SectionKind::Background, "background|introduction"),
            build(
                SectionKind::Facts,
                r"facts|findings?\s+of\s+fact(?:\s+and\s+reasons)?",
            ),
            build(SectionKind::Reasoning, "reasons?|discussion"),
            build(
                SectionKind::Decision,
                "decisions?|determination|order(?:s)?",
            ),
        ]
    })
}

/// Classifies a line as a section header, if it is one.
#[must_use]
pub fn detect_header(line: &str) -> Option<SectionKind> {
    header_patterns()
        .iter()
        .find(|h| h.pattern.is_match(line))
        .map(|h| h.kind)
}

/// Splits decision text into ordered sections.
///
/// Every returned span is non-empty after trimming. A header with no
/// body keeps its header line as the span text.
#[must_use]
pub fn split_sections(text: &str) -> Vec<SectionSpan> {
    let mut spans: Vec<SectionSpan> = Vec::new();
    let mut current_kind = SectionKind::Other;
    let mut current_lines: Vec<&str> = Vec::new();

    let mut flush = |kind: SectionKind, lines: &mut Vec<&str>, spans: &mut Vec<SectionSpan>| {
        let body = lines.join("\n");
        if !body.trim().is_empty() {
            spans.push(SectionSpan {
                kind,
                text: body.trim().to_string(),
            });
        }
        lines.clear();
    };

    for line in text.lines() {
        if let Some(kind) = detect_header(line) {
            flush(current_kind, &mut current_lines, &mut spans);
            current_kind = kind;
        }
        current_lines.push(line);
    }
    flush(current_kind, &mut current_lines, &mut spans);

    spans
}
