//! The research session: the single root of mutable application state.
//!
//! One session lives behind `Arc<Mutex<_>>` in `AppState` and is mutated
//! only at event granularity by request handlers: a whole lock-mutate-
//! unlock is one turn, and generation calls happen outside the lock. The
//! search epoch counter makes late responses harmless: every summary
//! request remembers the epoch it was issued under, and an apply with a
//! stale epoch is discarded instead of being rendered under the wrong
//! result set.

use crate::conversation::ConversationController;
use crate::discovery::DiscoveryController;
use crate::generation::number_papers;
use crate::models::{ChatScope, Paper, RelatedQuestion, SearchStats};
use crate::notes::NoteStore;
use crate::registry::CitationRegistry;
use std::collections::{HashMap, HashSet};

/// Seed queries shown on the dashboard before any search is run.
const RECENT_HISTORY: &[&str] = &[
    "JAK inhibitors efficacy",
    "mRNA vaccine durability",
    "CRISPR off-target effects",
];

const MAX_RECENT_QUERIES: usize = 5;

/// Context given to the global assistant before any summary exists.
const NO_SUMMARY_CONTEXT: &str =
    "No research summary is available yet. Answer from general medical research knowledge.";

pub struct ResearchSession {
    pub stats: SearchStats,
    pub papers: Vec<Paper>,
    pub registry: CitationRegistry,
    pub conversations: ConversationController,
    pub discovery: DiscoveryController,
    pub notes: NoteStore,
    pub references_collapsed: bool,
    pub assistant_collapsed: bool,
    pub recent_queries: Vec<String>,
    pub search_pending: bool,
    pub suggested_questions: Vec<RelatedQuestion>,
    corpus_summary: Option<String>,
    corpus_summary_pending: bool,
    paper_summaries: HashMap<u32, String>,
    paper_summaries_pending: HashSet<u32>,
    search_epoch: u64,
}

impl ResearchSession {
    pub fn new() -> Self {
        Self {
            stats: SearchStats::default(),
            papers: Vec::new(),
            registry: CitationRegistry::new(),
            conversations: ConversationController::new(),
            discovery: DiscoveryController::new(),
            notes: NoteStore::new(),
            references_collapsed: false,
            assistant_collapsed: false,
            recent_queries: RECENT_HISTORY.iter().map(|s| s.to_string()).collect(),
            search_pending: false,
            suggested_questions: Vec::new(),
            corpus_summary: None,
            corpus_summary_pending: false,
            paper_summaries: HashMap::new(),
            paper_summaries_pending: HashSet::new(),
            search_epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.search_epoch
    }

    // ------------------------------------------------------------------
    // Search lifecycle
    // ------------------------------------------------------------------

    /// Start a new search. Bumps the epoch so anything still in flight
    /// for the previous result set gets discarded on arrival.
    pub fn begin_search(&mut self, query: &str) -> u64 {
        self.search_epoch += 1;
        self.search_pending = true;
        self.stats.query = query.to_string();
        self.search_epoch
    }

    /// Install a search result set: replaces the papers and the citation
    /// registry wholesale and clears all derived summaries. Returns false
    /// (no change) when a newer search started in the meantime.
    pub fn apply_search(&mut self, epoch: u64, query: &str, papers: Vec<Paper>) -> bool {
        if epoch != self.search_epoch {
            return false;
        }
        self.registry.register(&papers);
        self.stats = SearchStats {
            query: query.to_string(),
            found_articles: papers.len(),
            filtered_articles: papers.len(),
            updated_at: Some(chrono::Utc::now()),
        };
        self.papers = papers;
        self.corpus_summary = None;
        self.corpus_summary_pending = false;
        self.paper_summaries.clear();
        self.paper_summaries_pending.clear();
        self.suggested_questions.clear();
        self.search_pending = false;
        self.remember_query(query);
        true
    }

    fn remember_query(&mut self, query: &str) {
        self.recent_queries.retain(|q| q != query);
        self.recent_queries.insert(0, query.to_string());
        self.recent_queries.truncate(MAX_RECENT_QUERIES);
    }

    pub fn paper(&self, id: u32) -> Option<&Paper> {
        self.registry.resolve(id)
    }

    // ------------------------------------------------------------------
    // Corpus summary
    // ------------------------------------------------------------------

    pub fn corpus_summary(&self) -> Option<&str> {
        self.corpus_summary.as_deref()
    }

    pub fn corpus_summary_pending(&self) -> bool {
        self.corpus_summary_pending
    }

    pub fn mark_corpus_summary_pending(&mut self) {
        self.corpus_summary_pending = true;
    }

    /// Install the executive summary, unless the result set it was written
    /// against has been replaced.
    pub fn apply_corpus_summary(&mut self, epoch: u64, text: String) -> bool {
        if epoch != self.search_epoch {
            return false;
        }
        self.corpus_summary = Some(text);
        self.corpus_summary_pending = false;
        true
    }

    /// Install the suggested discovery questions generated from the
    /// summary. Same staleness rule as the summary itself.
    pub fn apply_suggested_questions(&mut self, epoch: u64, questions: Vec<RelatedQuestion>) -> bool {
        if epoch != self.search_epoch {
            return false;
        }
        self.suggested_questions = questions;
        true
    }

    // ------------------------------------------------------------------
    // Per-paper summaries
    // ------------------------------------------------------------------

    pub fn paper_summary(&self, id: u32) -> Option<&str> {
        self.paper_summaries.get(&id).map(|s| s.as_str())
    }

    pub fn paper_summary_pending(&self, id: u32) -> bool {
        self.paper_summaries_pending.contains(&id)
    }

    pub fn mark_paper_summary_pending(&mut self, id: u32) {
        self.paper_summaries_pending.insert(id);
    }

    /// Install a deep-dive summary for one paper. Discarded when stale:
    /// a summary requested for an earlier result set never shows up under
    /// a paper that happens to reuse the id.
    pub fn apply_paper_summary(&mut self, epoch: u64, id: u32, text: String) -> bool {
        self.paper_summaries_pending.remove(&id);
        if epoch != self.search_epoch || self.registry.resolve(id).is_none() {
            return false;
        }
        self.paper_summaries.insert(id, text);
        true
    }

    // ------------------------------------------------------------------
    // Context assembly
    // ------------------------------------------------------------------

    /// The context string injected into a chat turn for the given scope.
    pub fn chat_context(&self, scope: ChatScope) -> String {
        match scope {
            ChatScope::Paper(id) => match self.registry.resolve(id) {
                Some(paper) => {
                    let mut ctx = format!(
                        "Contextual Paper Details:\nTitle: {}\nAuthors: {}\nAbstract: {}",
                        paper.title, paper.authors, paper.abstract_text
                    );
                    if let Some(summary) = self.paper_summary(id) {
                        ctx.push_str("\n\nGenerated summary of this paper:\n");
                        ctx.push_str(summary);
                    }
                    ctx
                }
                None => self.global_context(),
            },
            ChatScope::Global => self.global_context(),
        }
    }

    fn global_context(&self) -> String {
        match &self.corpus_summary {
            Some(summary) => format!(
                "Current research query: {}\n\nExecutive summary of the result set:\n{}",
                self.stats.query, summary
            ),
            None => NO_SUMMARY_CONTEXT.to_string(),
        }
    }

    /// The broader context handed to discovery answers and follow-up
    /// question generation: the query, the numbered paper list (so `[n]`
    /// markers stay meaningful), and the summary when it exists.
    pub fn research_context(&self) -> String {
        let mut ctx = format!("Research query: {}\n", self.stats.query);
        if !self.papers.is_empty() {
            ctx.push_str("Papers, numbered for citation:\n");
            ctx.push_str(&number_papers(&self.papers));
        }
        if let Some(summary) = &self.corpus_summary {
            ctx.push_str("Executive summary:\n");
            ctx.push_str(summary);
        }
        ctx
    }

    /// The chat scope sends currently go to: the focus paper's if one is
    /// set and still part of the current result set, else global.
    pub fn active_scope(&self) -> ChatScope {
        match self.conversations.focus_paper() {
            Some(id) if self.registry.resolve(id).is_some() => ChatScope::Paper(id),
            _ => ChatScope::Global,
        }
    }
}

impl Default for ResearchSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;

    fn paper(id: u32, title: &str) -> Paper {
        Paper {
            id,
            title: title.to_string(),
            authors: "King B, et al.".to_string(),
            journal: "NEJM".to_string(),
            date: "May 2022".to_string(),
            citation_count: 145,
            abstract_text: "Superior to placebo.".to_string(),
            tags: vec![],
            url: None,
        }
    }

    #[test]
    fn apply_search_replaces_result_set_and_clears_summaries() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("jak inhibitors");
        assert!(session.apply_search(epoch, "jak inhibitors", vec![paper(1, "A")]));
        assert!(session.apply_corpus_summary(epoch, "Summary [1].".to_string()));
        assert!(session.apply_paper_summary(epoch, 1, "Paper summary.".to_string()));

        let epoch2 = session.begin_search("crispr");
        assert!(session.apply_search(epoch2, "crispr", vec![paper(1, "B")]));
        assert!(session.corpus_summary().is_none());
        assert!(session.paper_summary(1).is_none());
        assert_eq!(session.paper(1).unwrap().title, "B");
    }

    #[test]
    fn stale_search_result_is_discarded() {
        let mut session = ResearchSession::new();
        let old = session.begin_search("first");
        let new = session.begin_search("second");

        assert!(!session.apply_search(old, "first", vec![paper(1, "Old")]));
        assert!(session.papers.is_empty());
        assert!(session.apply_search(new, "second", vec![paper(1, "New")]));
        assert_eq!(session.paper(1).unwrap().title, "New");
    }

    #[test]
    fn stale_summaries_are_discarded() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(1, "A")]);

        let epoch2 = session.begin_search("other");
        session.apply_search(epoch2, "other", vec![paper(1, "B")]);

        // Late responses from the first search: dropped, not rendered
        assert!(!session.apply_corpus_summary(epoch, "stale".to_string()));
        assert!(!session.apply_paper_summary(epoch, 1, "stale".to_string()));
        assert!(session.corpus_summary().is_none());
        assert!(session.paper_summary(1).is_none());
    }

    #[test]
    fn paper_summary_for_unknown_id_is_dropped() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(1, "A")]);
        assert!(!session.apply_paper_summary(epoch, 9, "orphan".to_string()));
    }

    #[test]
    fn chat_context_prefers_focus_paper_details() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(2, "Ritlecitinib Study")]);
        session.apply_paper_summary(epoch, 2, "Deep dive text.".to_string());

        let ctx = session.chat_context(ChatScope::Paper(2));
        assert!(ctx.contains("Ritlecitinib Study"));
        assert!(ctx.contains("Superior to placebo."));
        assert!(ctx.contains("Deep dive text."));
    }

    #[test]
    fn global_context_falls_back_when_no_summary() {
        let session = ResearchSession::new();
        assert_eq!(session.chat_context(ChatScope::Global), NO_SUMMARY_CONTEXT);

        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(1, "A")]);
        session.apply_corpus_summary(epoch, "The evidence shows...".to_string());
        assert!(session
            .chat_context(ChatScope::Global)
            .contains("The evidence shows..."));
    }

    #[test]
    fn active_scope_ignores_focus_from_a_previous_search() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(3, "A")]);
        session.conversations.enqueue_paper_chat(3);
        session.conversations.consume_paper_chat();
        assert_eq!(session.active_scope(), ChatScope::Paper(3));

        let epoch2 = session.begin_search("other");
        session.apply_search(epoch2, "other", vec![paper(1, "B")]);
        // Paper 3 no longer exists; sends fall back to the global scope
        assert_eq!(session.active_scope(), ChatScope::Global);
    }

    #[test]
    fn stale_suggested_questions_are_discarded() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("q");
        session.apply_search(epoch, "q", vec![paper(1, "A")]);
        let epoch2 = session.begin_search("other");
        session.apply_search(epoch2, "other", vec![]);

        let stale = vec![RelatedQuestion {
            question: "old?".to_string(),
            category: "General".to_string(),
        }];
        assert!(!session.apply_suggested_questions(epoch, stale));
        assert!(session.suggested_questions.is_empty());
    }

    #[test]
    fn recent_queries_dedupe_and_cap() {
        let mut session = ResearchSession::new();
        for q in ["a", "b", "c", "a", "d"] {
            let epoch = session.begin_search(q);
            session.apply_search(epoch, q, vec![]);
        }
        assert_eq!(session.recent_queries[0], "d");
        assert_eq!(session.recent_queries[1], "a");
        assert_eq!(session.recent_queries.len(), MAX_RECENT_QUERIES);
        assert_eq!(
            session.recent_queries.iter().filter(|q| *q == "a").count(),
            1
        );
    }

    #[test]
    fn empty_search_result_is_an_explicit_empty_state() {
        let mut session = ResearchSession::new();
        let epoch = session.begin_search("obscure query");
        assert!(session.apply_search(epoch, "obscure query", vec![]));
        assert!(session.papers.is_empty());
        assert!(!session.search_pending);
        assert_eq!(session.stats.found_articles, 0);
        // No summary was requested for an empty set
        assert!(session.corpus_summary().is_none());
        assert!(!session.corpus_summary_pending());
    }

    #[test]
    fn search_summary_and_citation_activation_flow() {
        use crate::models::InlineSpan;
        use crate::render::render_document;

        let mut session = ResearchSession::new();
        let epoch = session.begin_search("statins");
        assert!(session.apply_search(
            epoch,
            "statins",
            vec![paper(1, "Statin Trial A"), paper(2, "Statin Trial B")],
        ));
        session.mark_corpus_summary_pending();
        assert!(session.apply_corpus_summary(
            epoch,
            "### Key Findings\nBoth trials [1][2] showed a 22% reduction.".to_string(),
        ));

        let doc = render_document(session.corpus_summary().unwrap(), &session.registry);
        let spans = &doc.blocks[0].items[0].spans;
        let resolved: Vec<u32> = spans
            .iter()
            .filter_map(|s| match s {
                InlineSpan::Citation {
                    id,
                    resolved: Some(_),
                } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(resolved, vec![1, 2]);

        // Clicking [2] with the references panel collapsed expands it and
        // switches to the papers tab; the scroll target appears once the
        // card registers.
        let outcome = session.registry.activate(2, true);
        assert!(outcome.known && outcome.expand_references && outcome.switch_to_papers);
        assert!(outcome.target.is_none());
        session.registry.register_target(2, "paper-2");
        let outcome = session.registry.activate(2, false);
        assert_eq!(outcome.target.as_deref(), Some("paper-2"));
        assert!(!outcome.expand_references);
    }
}
