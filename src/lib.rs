//! MedSearch library - re-exports for testing and external use.
//!
//! The application is organized into the following modules:
//!
//! - `models`: Data structures for papers, notes, conversations, and the
//!   structured-document render output
//! - `registry`: Citation registry mapping `[n]` markers to papers and
//!   scroll targets
//! - `render`: Structured-text rendering pipeline (blocks, lines, spans)
//! - `generation`: Gemini-backed generation client and response parsing
//! - `notes`: In-session note store with search and tag filtering
//! - `conversation`: Per-scope chat histories and the send state machine
//! - `discovery`: Question/answer exploration panel state
//! - `session`: The per-session research state tying it all together
//! - `library`: Persisted projects and bookmarked papers
//! - `templates`: HTML/CSS/JS page shell
//! - `handlers`: HTTP route handlers

use std::sync::{Arc, Mutex};

pub mod conversation;
pub mod discovery;
pub mod generation;
pub mod handlers;
pub mod library;
pub mod models;
pub mod notes;
pub mod registry;
pub mod render;
pub mod session;
pub mod templates;

// ============================================================================
// Configuration
// ============================================================================

pub const DB_PATH: &str = ".medsearch_db";
pub const BIND_ADDR: &str = "127.0.0.1:3000";

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub db: sled::Db,
    pub session: Mutex<session::ResearchSession>,
    pub generation: generation::GenerationClient,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let db = sled::open(DB_PATH).expect("Failed to open database");
        Arc::new(Self {
            db,
            session: Mutex::new(session::ResearchSession::new()),
            generation: generation::GenerationClient::from_env(),
        })
    }
}

// Re-export commonly used types
pub use models::{
    relative_time, Block, ChatScope, CitationPreview, ConversationMessage, DiscoveryState,
    InlineSpan, LibraryEntry, Line, Note, Paper, Project, RelatedQuestion, Role, SearchStats,
    StructuredDocument, SynthesizedNote, AI_GENERATED_TAG,
};

pub use conversation::{ConversationController, OutboundChat, PaperChatCommand, SendRejected};
pub use discovery::{DiscoveryController, DiscoveryRequest, DISCOVERY_TAG};
pub use generation::{fallback_for, GenerationClient, GenerationError};
pub use notes::NoteStore;
pub use registry::{ActivationOutcome, CitationRegistry, HIGHLIGHT_MS};
pub use render::render_document;
pub use session::ResearchSession;
