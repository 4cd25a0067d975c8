//! Text cleaning and mandatory PII redaction.
//!
//! Extracted tribunal text is NFC-normalized, ligature-repaired, and
//! whitespace-collapsed (paragraph breaks preserved). PII is redacted
//! with typed placeholders before anything reaches an index: parties'
//! postcodes, phone numbers, and e-mail addresses all identify real
//! people even after names are removed.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Placeholder substituted for UK postcodes.
pub const POSTCODE_PLACEHOLDER: &str = "[POSTCODE]";

/// Placeholder substituted for phone numbers.
pub const PHONE_PLACEHOLDER: &str = "[PHONE]";

/// Placeholder substituted for e-mail addresses.
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // compile-time constant pattern
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap()
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // +44 or 0-prefixed UK numbers, tolerant of spacing and
        // bracketed area codes, with one or two trailing digit groups.
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?:\+44[\s\-]?\d{2,4}|\(?0\d{2,4}\)?)(?:[\s\-]?\d{3,4}){1,2}").unwrap()
    })
}

fn postcode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\b[A-Z]{1,2}\d[A-Z\d]? ?\d[A-Z]{2}\b").unwrap()
    })
}

/// Cleans extracted decision text: NFC normalization, ligature repair,
/// whitespace collapse with paragraph breaks preserved, then PII
/// redaction. Redaction is mandatory before indexing.
#[must_use]
pub fn clean(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    let repaired = repair_ligatures(&normalized);
    let collapsed = collapse_whitespace(&repaired);
    redact_pii(&collapsed)
}

/// Replaces common PDF ligature mis-decodings with their letter pairs.
#[must_use]
pub fn repair_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{fb00}' => out.push_str("ff"),
            '\u{fb01}' => out.push_str("fi"),
            '\u{fb02}' => out.push_str("fl"),
            '\u{fb03}' => out.push_str("ffi"),
            '\u{fb04}' => out.push_str("ffl"),
            '\u{fb05}' => out.push_str("ft"),
            '\u{fb06}' => out.push_str("st"),
            _ => out.push(c),
        }
    }
    out
}

/// Collapses whitespace runs to single spaces while keeping blank-line
/// paragraph breaks.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&line.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

/// Redacts e-mail addresses, UK phone numbers, and UK postcodes with
/// typed placeholders. Idempotent: placeholders never re-match.
#[must_use]
pub fn redact_pii(text: &str) -> String {
    let text = email_pattern().replace_all(text, EMAIL_PLACEHOLDER);
    let text = phone_pattern().replace_all(&text, PHONE_PLACEHOLDER);
    postcode_pattern()
        .replace_all(&text, POSTCODE_PLACEHOLDER)
        .into_owned()
}

/// Lowercases and collapses all whitespace to single spaces. Used for
/// the cite-or-abstain substring check, where quote and chunk may have
/// been reflowed differently.
#[must_use]
pub fn normalize_for_match(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
