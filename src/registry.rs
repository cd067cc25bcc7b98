//! Citation registry: the single source of truth for resolving `[n]`
//! markers in generated text to paper records.
//!
//! The registry is rebuilt wholesale each time a new search result set
//! arrives; render code only ever reads it. A separate scroll-target map
//! is maintained by the view layer (registered on mount, unregistered on
//! unmount) so activation does not depend on global document lookup.

use crate::models::{CitationPreview, Paper};
use serde::Serialize;
use std::collections::HashMap;

/// Transient highlight duration applied to an activated paper card.
pub const HIGHLIGHT_MS: u64 = 2000;

#[derive(Debug, Default)]
pub struct CitationRegistry {
    papers: HashMap<u32, Paper>,
    scroll_targets: HashMap<u32, String>,
}

/// What the view layer should do in response to activating a citation.
/// `target` is `None` when the paper's card has not registered a scroll
/// target yet (for example the papers tab is still rendering); the caller
/// may retry the lookup once after a short delay before giving up.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivationOutcome {
    pub paper_id: u32,
    pub known: bool,
    pub target: Option<String>,
    pub switch_to_papers: bool,
    pub expand_references: bool,
    pub highlight_ms: u64,
}

impl CitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire id -> paper mapping. Scroll targets from the
    /// previous result set are dropped too: they referred to cards that no
    /// longer exist.
    pub fn register(&mut self, papers: &[Paper]) {
        self.papers = papers.iter().map(|p| (p.id, p.clone())).collect();
        self.scroll_targets.clear();
    }

    pub fn resolve(&self, id: u32) -> Option<&Paper> {
        self.papers.get(&id)
    }

    /// Hover preview for a citation marker, if the id is known.
    pub fn preview(&self, id: u32) -> Option<CitationPreview> {
        self.papers.get(&id).map(|p| p.preview())
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    // ------------------------------------------------------------------
    // Scroll targets
    // ------------------------------------------------------------------

    /// Record the anchor for a paper's card. Called by the view layer when
    /// the card mounts; anchors for unknown ids are ignored.
    pub fn register_target(&mut self, paper_id: u32, anchor: &str) {
        if self.papers.contains_key(&paper_id) {
            self.scroll_targets.insert(paper_id, anchor.to_string());
        }
    }

    pub fn unregister_target(&mut self, paper_id: u32) {
        self.scroll_targets.remove(&paper_id);
    }

    pub fn target(&self, paper_id: u32) -> Option<&str> {
        self.scroll_targets.get(&paper_id).map(|s| s.as_str())
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    /// Resolve an activation ([n] clicked) into the side effects the view
    /// should perform. Unknown ids produce an inert outcome rather than an
    /// error: stale markers from a previous search must not crash anything.
    pub fn activate(&self, id: u32, references_collapsed: bool) -> ActivationOutcome {
        let known = self.papers.contains_key(&id);
        ActivationOutcome {
            paper_id: id,
            known,
            target: if known {
                self.scroll_targets.get(&id).cloned()
            } else {
                None
            },
            switch_to_papers: known,
            expand_references: known && references_collapsed,
            highlight_ms: if known { HIGHLIGHT_MS } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: u32, title: &str) -> Paper {
        Paper {
            id,
            title: title.to_string(),
            authors: "King B, et al.".to_string(),
            journal: "NEJM".to_string(),
            date: "May 2022".to_string(),
            citation_count: 145,
            abstract_text: "Abstract.".to_string(),
            tags: vec!["RCT".to_string()],
            url: None,
        }
    }

    #[test]
    fn register_replaces_wholesale() {
        let mut reg = CitationRegistry::new();
        reg.register(&[paper(1, "a"), paper(2, "b")]);
        reg.register_target(1, "paper-card-1");
        assert_eq!(reg.resolve(1).unwrap().title, "a");

        reg.register(&[paper(1, "c")]);
        assert_eq!(reg.resolve(1).unwrap().title, "c");
        assert!(reg.resolve(2).is_none());
        // Targets from the old result set are gone
        assert!(reg.target(1).is_none());
    }

    #[test]
    fn activate_known_paper_with_target() {
        let mut reg = CitationRegistry::new();
        reg.register(&[paper(2, "b")]);
        reg.register_target(2, "paper-card-2");

        let out = reg.activate(2, true);
        assert!(out.known);
        assert_eq!(out.target.as_deref(), Some("paper-card-2"));
        assert!(out.switch_to_papers);
        assert!(out.expand_references);
        assert_eq!(out.highlight_ms, HIGHLIGHT_MS);
    }

    #[test]
    fn activate_known_paper_without_target_is_retryable() {
        let mut reg = CitationRegistry::new();
        reg.register(&[paper(1, "a")]);
        let out = reg.activate(1, false);
        assert!(out.known);
        assert!(out.target.is_none());
        assert!(!out.expand_references);
    }

    #[test]
    fn activate_dangling_id_is_inert() {
        let reg = CitationRegistry::new();
        let out = reg.activate(7, true);
        assert!(!out.known);
        assert!(out.target.is_none());
        assert!(!out.switch_to_papers);
        assert!(!out.expand_references);
        assert_eq!(out.highlight_ms, 0);
    }

    #[test]
    fn target_for_unknown_paper_is_ignored() {
        let mut reg = CitationRegistry::new();
        reg.register(&[paper(1, "a")]);
        reg.register_target(9, "paper-card-9");
        assert!(reg.target(9).is_none());
    }

    #[test]
    fn preview_carries_title_authors_date() {
        let mut reg = CitationRegistry::new();
        reg.register(&[paper(1, "Two Phase 3 Trials of Baricitinib")]);
        let p = reg.preview(1).unwrap();
        assert_eq!(p.title, "Two Phase 3 Trials of Baricitinib");
        assert_eq!(p.authors, "King B, et al.");
        assert_eq!(p.date, "May 2022");
        assert!(reg.preview(2).is_none());
    }
}
