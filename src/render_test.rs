//! Tests for the structured-text renderer.
//!
//! Inputs are plain strings shaped like real generated summaries, so the
//! tests double as a record of the markup conventions the service emits.

use super::*;
use crate::models::Paper;

// ============================================================================
// Helpers
// ============================================================================

fn mock_paper(id: u32, title: &str) -> Paper {
    Paper {
        id,
        title: title.to_string(),
        authors: "King B, et al.".to_string(),
        journal: "New England Journal of Medicine".to_string(),
        date: "May 2022".to_string(),
        citation_count: 145,
        abstract_text: "Oral baricitinib was superior to placebo.".to_string(),
        tags: vec!["RCT".to_string(), "Phase 3".to_string()],
        url: None,
    }
}

fn registry_with(papers: &[Paper]) -> CitationRegistry {
    let mut reg = CitationRegistry::new();
    reg.register(papers);
    reg
}

fn empty_registry() -> CitationRegistry {
    CitationRegistry::new()
}

/// Collapse a span list back into display text, for assertions that only
/// care about content, not structure.
fn span_text(spans: &[InlineSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            InlineSpan::Text { text } => out.push_str(text),
            InlineSpan::Bold { spans } => out.push_str(&span_text(spans)),
            InlineSpan::Citation { id, .. } => out.push_str(&format!("[{}]", id)),
            InlineSpan::Metric { text } => out.push_str(text),
        }
    }
    out
}

// ============================================================================
// Block Structure
// ============================================================================

#[test]
fn splits_blocks_at_headers() {
    let text = "### Primary Outcome\nBaricitinib works.\n### Safety Profile\nHeadache was common.\n- acne\n- nausea";
    let doc = render_document(text, &empty_registry());

    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(span_text(doc.blocks[0].heading.as_ref().unwrap()), "Primary Outcome");
    assert_eq!(doc.blocks[0].items.len(), 1);
    assert_eq!(span_text(doc.blocks[1].heading.as_ref().unwrap()), "Safety Profile");
    assert_eq!(doc.blocks[1].items.len(), 3);
    assert!(!doc.blocks[1].items[0].is_list_item);
    assert!(doc.blocks[1].items[1].is_list_item);
    assert!(doc.blocks[1].items[2].is_list_item);
}

#[test]
fn leading_block_without_header_is_valid() {
    let text = "Intro paragraph.\n\n### Findings\nBody.";
    let doc = render_document(text, &empty_registry());

    assert_eq!(doc.blocks.len(), 2);
    assert!(doc.blocks[0].heading.is_none());
    assert_eq!(span_text(&doc.blocks[0].items[0].spans), "Intro paragraph.");
}

#[test]
fn blank_lines_are_skipped() {
    let doc = render_document("### H\n\n\nOne.\n\nTwo.\n", &empty_registry());
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].items.len(), 2);
}

#[test]
fn numbered_and_bulleted_prefixes_are_stripped() {
    let doc = render_document("1. first\n2) second\n* third\n- fourth", &empty_registry());
    let items = &doc.blocks[0].items;
    assert!(items.iter().all(|l| l.is_list_item));
    assert_eq!(span_text(&items[0].spans), "first");
    assert_eq!(span_text(&items[1].spans), "second");
    assert_eq!(span_text(&items[2].spans), "third");
    assert_eq!(span_text(&items[3].spans), "fourth");
}

#[test]
fn empty_input_renders_empty_document() {
    assert!(render_document("", &empty_registry()).blocks.is_empty());
    assert!(render_document("\n\n  \n", &empty_registry()).blocks.is_empty());
}

// ============================================================================
// Inline Spans
// ============================================================================

#[test]
fn tokenizes_bold_citation_and_metric() {
    let reg = registry_with(&[mock_paper(1, "Baricitinib Trials")]);
    let spans = tokenize_inline(
        "**Baricitinib** achieved 38.8% regrowth at 36 weeks [1].",
        &reg,
    );

    assert_eq!(
        spans[0],
        InlineSpan::Bold {
            spans: vec![InlineSpan::Text {
                text: "Baricitinib".to_string()
            }]
        }
    );
    assert!(matches!(&spans[1], InlineSpan::Text { text } if text == " achieved "));
    assert_eq!(
        spans[2],
        InlineSpan::Metric {
            text: "38.8%".to_string()
        }
    );
    assert!(matches!(&spans[4], InlineSpan::Metric { text } if text == "36 weeks"));
    let citation = spans
        .iter()
        .find(|s| matches!(s, InlineSpan::Citation { .. }))
        .unwrap();
    match citation {
        InlineSpan::Citation { id, resolved } => {
            assert_eq!(*id, 1);
            assert_eq!(resolved.as_ref().unwrap().title, "Baricitinib Trials");
        }
        _ => unreachable!(),
    }
}

#[test]
fn citations_resolve_inside_bold() {
    let reg = registry_with(&[mock_paper(2, "Ritlecitinib Study")]);
    let spans = tokenize_inline("**superior to placebo [2]**", &reg);

    match &spans[0] {
        InlineSpan::Bold { spans: inner } => {
            let cite = inner
                .iter()
                .find(|s| matches!(s, InlineSpan::Citation { .. }))
                .unwrap();
            assert!(matches!(cite, InlineSpan::Citation { id: 2, resolved: Some(_) }));
        }
        other => panic!("expected bold span, got {:?}", other),
    }
}

#[test]
fn metrics_resolve_inside_bold() {
    let spans = tokenize_inline("**response in 4 mg arm**", &empty_registry());
    match &spans[0] {
        InlineSpan::Bold { spans: inner } => {
            assert!(inner
                .iter()
                .any(|s| matches!(s, InlineSpan::Metric { text } if text == "4 mg")));
        }
        other => panic!("expected bold span, got {:?}", other),
    }
}

#[test]
fn dangling_citation_is_unresolved_not_error() {
    let reg = registry_with(&[mock_paper(1, "Only Paper")]);
    let spans = tokenize_inline("stale claim [9]", &reg);
    assert!(spans
        .iter()
        .any(|s| matches!(s, InlineSpan::Citation { id: 9, resolved: None })));
}

#[test]
fn unmatched_bold_renders_literally() {
    let spans = tokenize_inline("a **broken marker", &empty_registry());
    assert_eq!(span_text(&spans), "a **broken marker");
    assert!(spans.iter().all(|s| matches!(s, InlineSpan::Text { .. })));
}

#[test]
fn malformed_citation_renders_literally() {
    let spans = tokenize_inline("see [ref 3] and [12", &empty_registry());
    assert_eq!(span_text(&spans), "see [ref 3] and [12");
    assert!(!spans.iter().any(|s| matches!(s, InlineSpan::Citation { .. })));
}

#[test]
fn digits_inside_words_are_not_metrics() {
    let spans = tokenize_inline("vitamin B12 levels over 6 months", &empty_registry());
    let metrics: Vec<_> = spans
        .iter()
        .filter(|s| matches!(s, InlineSpan::Metric { .. }))
        .collect();
    assert_eq!(metrics.len(), 1);
    assert!(matches!(metrics[0], InlineSpan::Metric { text } if text == "6 months"));
}

#[test]
fn unit_word_must_end_at_word_boundary() {
    // "3 mgx" is not a dose
    let spans = tokenize_inline("3 mgx", &empty_registry());
    assert!(!spans.iter().any(|s| matches!(s, InlineSpan::Metric { .. })));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn rendering_is_idempotent() {
    let reg = registry_with(&[mock_paper(1, "A"), mock_paper(2, "B")]);
    let text = "### Efficacy\n**Both drugs** beat placebo [1], with 52% response [2].\n- 36 weeks follow-up\nPlain close.";
    let first = render_document(text, &reg);
    let second = render_document(text, &reg);
    assert_eq!(first, second);
}

#[test]
fn registry_state_changes_resolution_but_not_structure() {
    let text = "Result [1].";
    let resolved = render_document(text, &registry_with(&[mock_paper(1, "A")]));
    let unresolved = render_document(text, &empty_registry());

    assert_eq!(resolved.blocks.len(), unresolved.blocks.len());
    let get_cite = |doc: &StructuredDocument| match &doc.blocks[0].items[0].spans[1] {
        InlineSpan::Citation { id, resolved } => (*id, resolved.is_some()),
        other => panic!("expected citation, got {:?}", other),
    };
    assert_eq!(get_cite(&resolved), (1, true));
    assert_eq!(get_cite(&unresolved), (1, false));
}
