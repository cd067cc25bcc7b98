//! Structured-text rendering: parse freeform generated prose into a
//! typed document tree.
//!
//! Generated summaries and answers arrive as markdown-ish text: `###`
//! headers, `-`/`*`/numbered list lines, `**bold**` spans, `[n]` citation
//! markers, and measurements like `38.8%` or `36 weeks`. This module
//! turns that into a `StructuredDocument` of blocks, lines, and tagged
//! inline spans. The grammar is a fixed rule table; malformed markup
//! degrades to literal text and never aborts the rest of the document.

use crate::models::{Block, InlineSpan, Line, StructuredDocument};
use crate::registry::CitationRegistry;
use regex::Regex;

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

// ============================================================================
// Document Assembly
// ============================================================================

/// Render a whole piece of generated prose. Deterministic: the same text
/// and registry state always produce the same tree.
pub fn render_document(text: &str, registry: &CitationRegistry) -> StructuredDocument {
    let header_re = Regex::new(r"^#{1,6}\s*").unwrap();

    let mut blocks: Vec<Block> = Vec::new();
    let mut current = Block {
        heading: None,
        items: Vec::new(),
    };
    let mut started = false;

    for raw_line in text.lines() {
        if let Some(m) = header_re.find(raw_line) {
            // A header line opens a new block. A leading block with no
            // header is kept only if it accumulated any content.
            if started && (!current.items.is_empty() || current.heading.is_some()) {
                blocks.push(current);
            }
            let heading_text = raw_line[m.end()..].trim();
            current = Block {
                heading: Some(tokenize_inline(heading_text, registry)),
                items: Vec::new(),
            };
            started = true;
            continue;
        }

        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        started = true;
        current.items.push(classify_line(trimmed, registry));
    }

    if started && (!current.items.is_empty() || current.heading.is_some()) {
        blocks.push(current);
    }

    StructuredDocument { blocks }
}

/// Classify one non-header line as a list item or paragraph, stripping the
/// list prefix when present.
fn classify_line(line: &str, registry: &CitationRegistry) -> Line {
    let list_re = Regex::new(r"^(?:[-*\u{2022}]|\d+[.)])\s+").unwrap();

    if let Some(m) = list_re.find(line) {
        Line {
            is_list_item: true,
            spans: tokenize_inline(line[m.end()..].trim(), registry),
        }
    } else {
        Line {
            is_list_item: false,
            spans: tokenize_inline(line, registry),
        }
    }
}

// ============================================================================
// Inline Tokenizer
// ============================================================================

/// Tokenize a line of text into inline spans, scanning left to right for
/// the highest-priority match at each position: bold first, then citation
/// markers, then metric patterns. Citations and metrics still resolve one
/// level deep inside bold spans.
pub fn tokenize_inline(text: &str, registry: &CitationRegistry) -> Vec<InlineSpan> {
    scan_spans(text, registry, true)
}

fn scan_spans(text: &str, registry: &CitationRegistry, allow_bold: bool) -> Vec<InlineSpan> {
    let metric_re =
        Regex::new(r"^\d+(?:\.\d+)?\s?(?:%|months?|years?|weeks?|days?|mg|ml|patients)\b").unwrap();

    let mut spans: Vec<InlineSpan> = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        // Bold: needs a matching closer with non-empty content between.
        if allow_bold && rest.starts_with("**") {
            if let Some(close) = rest[2..].find("**") {
                let inner = &rest[2..2 + close];
                if !inner.is_empty() {
                    flush_plain(&mut plain, &mut spans);
                    spans.push(InlineSpan::Bold {
                        spans: scan_spans(inner, registry, false),
                    });
                    i += 2 + close + 2;
                    continue;
                }
            }
            // Unmatched or empty marker: literal.
            plain.push_str("**");
            i += 2;
            continue;
        }

        // Citation marker [n].
        if rest.starts_with('[') {
            if let Some((id, len)) = parse_citation_marker(rest) {
                flush_plain(&mut plain, &mut spans);
                spans.push(InlineSpan::Citation {
                    id,
                    resolved: registry.preview(id),
                });
                i += len;
                continue;
            }
            plain.push('[');
            i += 1;
            continue;
        }

        // Metric pattern, only at a word boundary.
        if at_word_boundary(&plain) {
            if let Some(m) = metric_re.find(rest) {
                flush_plain(&mut plain, &mut spans);
                spans.push(InlineSpan::Metric {
                    text: m.as_str().to_string(),
                });
                i += m.end();
                continue;
            }
        }

        let ch = rest.chars().next().unwrap_or('\u{FFFD}');
        plain.push(ch);
        i += ch.len_utf8();
    }

    flush_plain(&mut plain, &mut spans);
    spans
}

fn flush_plain(plain: &mut String, spans: &mut Vec<InlineSpan>) {
    if !plain.is_empty() {
        spans.push(InlineSpan::Text {
            text: std::mem::take(plain),
        });
    }
}

/// Parse a `[n]` marker at the start of `text`. Returns the id and the
/// byte length consumed. Anything that is not all-digits between the
/// brackets (e.g. `[see 3]`, `[]`) is not a marker.
fn parse_citation_marker(text: &str) -> Option<(u32, usize)> {
    let close = text.find(']')?;
    if close < 2 {
        return None;
    }
    let digits = &text[1..close];
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let id: u32 = digits.parse().ok()?;
    Some((id, close + 1))
}

/// A metric may only start where the preceding character (if any) is not
/// alphanumeric, so "ICD10" or "B12" never yield a metric for the digits.
fn at_word_boundary(accumulated: &str) -> bool {
    match accumulated.chars().last() {
        None => true,
        Some(c) => !c.is_alphanumeric(),
    }
}
