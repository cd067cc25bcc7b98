//! In-memory note store: user- and AI-authored notes with full-text
//! search and tag filtering.
//!
//! Display order is newest-first, so `add` prepends. Edits are modeled as
//! delete + recreate; nothing mutates a note in place.

use crate::models::{Note, SynthesizedNote, AI_GENERATED_TAG};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    next_id: u64,
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            next_id: 1,
        }
    }

    /// Create a note and prepend it. Returns the stored record.
    pub fn add(&mut self, title: &str, content: &str, tags: Vec<String>) -> Note {
        let now = Utc::now();
        let note = Note {
            id: self.next_id,
            title: title.to_string(),
            content: content.to_string(),
            tags,
            created_at: now,
            last_edited: now,
        };
        self.next_id += 1;
        self.notes.insert(0, note.clone());
        note
    }

    /// Bulk-add synthesis output. Each note gets a fresh id, insertion-time
    /// timestamps, and the AI provenance tag (not duplicated if the service
    /// already included it).
    pub fn add_synthesized(&mut self, synthesized: Vec<SynthesizedNote>) -> Vec<Note> {
        let mut added = Vec::new();
        for s in synthesized {
            let mut tags = s.tags;
            if !tags.iter().any(|t| t == AI_GENERATED_TAG) {
                tags.push(AI_GENERATED_TAG.to_string());
            }
            added.push(self.add(&s.title, &s.content, tags));
        }
        added
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    pub fn all(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Case-insensitive substring search against title OR content.
    pub fn search(&self, text: &str) -> Vec<Note> {
        let query = text.to_lowercase();
        if query.is_empty() {
            return self.notes.clone();
        }
        self.notes
            .par_iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&query)
                    || n.content.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    /// AND semantics: a note matches only if it carries every requested tag.
    pub fn filter_by_tags(&self, tags: &[String]) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|n| tags.iter().all(|t| n.tags.contains(t)))
            .cloned()
            .collect()
    }

    /// Composed query: text search and tag filter both applied (AND'd).
    pub fn query(&self, text: &str, tags: &[String]) -> Vec<Note> {
        self.search(text)
            .into_iter()
            .filter(|n| tags.iter().all(|t| n.tags.contains(t)))
            .collect()
    }

    /// Every tag in use, sorted and deduplicated. Derived, never stored.
    pub fn all_tags(&self) -> Vec<String> {
        self.notes
            .iter()
            .flat_map(|n| n.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SynthesizedNote;

    fn store_with_three() -> NoteStore {
        let mut store = NoteStore::new();
        store.add(
            "Efficacy Comparison",
            "Baricitinib has a higher success rate in pediatric cohorts.",
            vec!["A".to_string(), "B".to_string()],
        );
        store.add(
            "Exclusion Criteria",
            "Active tuberculosis history excluded.",
            vec!["A".to_string()],
        );
        store.add(
            "JAK-STAT Mechanism",
            "Side effects appear dose-dependent.",
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        );
        store
    }

    #[test]
    fn add_prepends_newest_first() {
        let store = store_with_three();
        assert_eq!(store.all()[0].title, "JAK-STAT Mechanism");
        assert_eq!(store.all()[2].title, "Efficacy Comparison");
    }

    #[test]
    fn search_matches_title_or_content_case_insensitive() {
        let store = store_with_three();
        assert_eq!(store.search("MECHANISM").len(), 1);
        assert_eq!(store.search("tuberculosis").len(), 1);
        assert_eq!(store.search("zzz").len(), 0);
        assert_eq!(store.search("").len(), 3);
    }

    #[test]
    fn tag_filter_uses_and_semantics() {
        let store = store_with_three();
        let both = store.filter_by_tags(&["A".to_string(), "B".to_string()]);
        assert_eq!(both.len(), 2);
        assert!(both.iter().any(|n| n.title == "Efficacy Comparison"));
        assert!(both.iter().any(|n| n.title == "JAK-STAT Mechanism"));
        assert_eq!(store.filter_by_tags(&["C".to_string()]).len(), 1);
        assert_eq!(store.filter_by_tags(&[]).len(), 3);
    }

    #[test]
    fn search_and_tags_compose() {
        let store = store_with_three();
        let hits = store.query("dose", &["B".to_string()]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "JAK-STAT Mechanism");
        assert!(store.query("dose", &["Z".to_string()]).is_empty());
    }

    #[test]
    fn synthesized_notes_get_fresh_ids_and_provenance_tag() {
        let mut store = store_with_three();
        let added = store.add_synthesized(vec![
            SynthesizedNote {
                title: "From summary".to_string(),
                content: "38.8% regrowth [1].".to_string(),
                tags: vec!["Efficacy".to_string()],
            },
            SynthesizedNote {
                title: "Already tagged".to_string(),
                content: "x".to_string(),
                tags: vec![AI_GENERATED_TAG.to_string()],
            },
        ]);

        assert_eq!(added.len(), 2);
        assert_ne!(added[0].id, added[1].id);
        assert!(added[0].tags.contains(&AI_GENERATED_TAG.to_string()));
        // No double provenance tag
        assert_eq!(
            added[1].tags.iter().filter(|t| *t == AI_GENERATED_TAG).count(),
            1
        );
        // Content (and its citation markers) is kept verbatim
        assert_eq!(added[0].content, "38.8% regrowth [1].");
        // Newest-first: the second synthesized note is at the top
        assert_eq!(store.all()[0].title, "Already tagged");
    }

    #[test]
    fn remove_deletes_by_id() {
        let mut store = NoteStore::new();
        let note = store.add("t", "c", vec![]);
        assert!(store.remove(note.id));
        assert!(!store.remove(note.id));
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut store = NoteStore::new();
        let first = store.add("a", "x", vec![]);
        store.remove(first.id);
        let second = store.add("b", "y", vec![]);
        assert!(second.id > first.id);
    }

    #[test]
    fn all_tags_sorted_and_deduped() {
        let store = store_with_three();
        assert_eq!(store.all_tags(), vec!["A", "B", "C"]);
    }
}
