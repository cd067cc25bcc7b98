//! MedSearch - an evidence-based medical research assistant.
//!
//! Serves a single-page research dashboard: literature search with
//! generated summaries, citation-aware rendering, per-paper chat, a note
//! store, and a discovery question panel. All state lives in one session;
//! projects and bookmarks persist in sled.

use axum::{
    routing::{delete, get, post},
    Router,
};

use medsearch::{handlers, AppState, BIND_ADDR, DB_PATH};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medsearch=info".into()),
        )
        .init();

    let state = AppState::new();

    let app = Router::new()
        // Page shell and state snapshot
        .route("/", get(handlers::index))
        .route("/api/state", get(handlers::get_state))
        // Search and summaries
        .route("/api/search", post(handlers::search))
        .route("/api/papers/{id}/summary", post(handlers::paper_summary))
        // Chat
        .route("/api/chat", post(handlers::chat))
        .route("/api/papers/{id}/chat", post(handlers::paper_chat))
        .route("/api/chat/focus/clear", post(handlers::reset_chat_focus))
        // Notes
        .route("/api/notes", get(handlers::list_notes).post(handlers::create_note))
        .route("/api/notes/{id}", delete(handlers::delete_note))
        .route("/api/notes/synthesize", post(handlers::synthesize_notes))
        // Discovery
        .route("/api/discovery/ask", post(handlers::discovery_ask))
        .route("/api/discovery/save", post(handlers::discovery_save))
        .route("/api/discovery/dismiss", post(handlers::discovery_dismiss))
        // Citations
        .route("/api/citations/{id}/activate", post(handlers::activate_citation))
        .route(
            "/api/citations/{id}/target",
            post(handlers::register_target).delete(handlers::unregister_target),
        )
        // Panels
        .route("/api/panels", post(handlers::set_panels))
        // Projects and library
        .route("/api/projects", get(handlers::list_projects).post(handlers::save_project))
        .route("/api/library", get(handlers::list_library).delete(handlers::remove_library_entry))
        .route("/api/library/{id}", post(handlers::bookmark_paper))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(BIND_ADDR)
        .await
        .expect("Failed to bind to port 3000");

    println!("MedSearch running at http://{}", BIND_ADDR);
    println!("Database: {}", DB_PATH);
    if std::env::var(medsearch::generation::API_KEY_ENV).is_ok() {
        println!("Generation: ENABLED");
    } else {
        println!(
            "Generation: DISABLED (set {} to enable)",
            medsearch::generation::API_KEY_ENV
        );
    }

    axum::serve(listener, app).await.expect("Server error");
}
