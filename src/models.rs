//! Data models for the research assistant.
//!
//! This module contains the core data structures used throughout the
//! application: papers, notes, conversation messages, discovery state,
//! the structured document tree produced by the renderer, and the
//! request bodies of the JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Papers
// ============================================================================

/// A paper in the current search result set.
///
/// `id` is assigned by the core in arrival order (1-based) when a search
/// completes, and is the number that citation markers `[n]` in generated
/// text refer to. The whole set is replaced wholesale on a new search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    pub id: u32,
    pub title: String,
    pub authors: String,
    pub journal: String,
    pub date: String,
    pub citation_count: u32,
    pub abstract_text: String,
    pub tags: Vec<String>,
    pub url: Option<String>,
}

/// The short preview shown when hovering a citation marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitationPreview {
    pub title: String,
    pub authors: String,
    pub date: String,
}

impl Paper {
    pub fn preview(&self) -> CitationPreview {
        CitationPreview {
            title: self.title.clone(),
            authors: self.authors.clone(),
            date: self.date.clone(),
        }
    }
}

// ============================================================================
// Notes
// ============================================================================

/// Provenance tag appended to every note created from AI synthesis.
pub const AI_GENERATED_TAG: &str = "AI Generated";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_edited: DateTime<Utc>,
}

/// A note as returned by the generation service, before the store assigns
/// it an id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesizedNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The context partition a conversation history belongs to. Switching the
/// focus paper changes which scope subsequent sends go to, but never clears
/// any scope's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "paper_id", rename_all = "lowercase")]
pub enum ChatScope {
    Global,
    Paper(u32),
}

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedQuestion {
    pub question: String,
    pub category: String,
}

/// The question -> answer -> follow-up exploration state. At most one
/// question is active at a time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryState {
    pub active_question: Option<String>,
    pub answer: Option<String>,
    pub is_saved: bool,
    pub follow_ups: Vec<RelatedQuestion>,
    pub answer_pending: bool,
    pub follow_ups_pending: bool,
}

// ============================================================================
// Structured Document (render output)
// ============================================================================

/// One inline token of rendered prose. Bold spans nest one level, so
/// citations and metrics inside `**...**` still resolve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InlineSpan {
    Text {
        text: String,
    },
    Bold {
        spans: Vec<InlineSpan>,
    },
    Citation {
        id: u32,
        resolved: Option<CitationPreview>,
    },
    Metric {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Line {
    pub is_list_item: bool,
    pub spans: Vec<InlineSpan>,
}

/// A header-delimited section. A leading block with no heading is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub heading: Option<Vec<InlineSpan>>,
    pub items: Vec<Line>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredDocument {
    pub blocks: Vec<Block>,
}

// ============================================================================
// Projects and Library (persisted)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub query: String,
    pub saved_at: DateTime<Utc>,
}

/// A paper bookmarked into the personal library. Keyed by title rather than
/// session-local id, since ids are reassigned on every search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryEntry {
    pub paper: Paper,
    pub bookmarked_at: DateTime<Utc>,
}

// ============================================================================
// Search Header Stats
// ============================================================================

/// The "Found N articles, filtered to M" header line above the tabs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub query: String,
    pub found_articles: usize,
    pub filtered_articles: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// API Request Bodies
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteCreateRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryAskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSaveRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelsRequest {
    pub references_collapsed: Option<bool>,
    pub assistant_collapsed: Option<bool>,
}

// ============================================================================
// Relative Time Display
// ============================================================================

/// Format a timestamp the way the note cards show it ("just now",
/// "2 hours ago", "3 days ago").
pub fn relative_time(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - when).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return if mins == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{} minutes ago", mins)
        };
    }
    let hours = mins / 60;
    if hours < 24 {
        return if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", hours)
        };
    }
    let days = hours / 24;
    if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{} days ago", days)
    }
}
