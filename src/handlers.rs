//! HTTP route handlers for the research assistant.
//!
//! Handlers are thin orchestration: lock the session, run one synchronous
//! state transition, release the lock, perform any generation call, then
//! lock again to apply the outcome. No generation failure ever becomes a
//! 5xx; content-shaped fallbacks are returned in-band per the error
//! policy, and only malformed client input gets a 4xx.

use crate::conversation::paper_discussion_prompt;
use crate::generation::fallback_for;
use crate::library;
use crate::models::{
    relative_time, ChatRequest, ChatScope, DiscoveryAskRequest, Note, NoteCreateRequest,
    PanelsRequest, ProjectSaveRequest, SearchRequest,
};
use crate::render::render_document;
use crate::session::ResearchSession;
use crate::templates;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Delay before the single retry when a citation's scroll target has not
/// been registered yet (the papers tab may still be rendering).
const ACTIVATION_RETRY: Duration = Duration::from_millis(100);

// ============================================================================
// Page Shell
// ============================================================================

pub async fn index() -> Html<String> {
    Html(templates::page())
}

// ============================================================================
// State Snapshot
// ============================================================================

pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session = state.session.lock().unwrap();
    Json(snapshot(&session))
}

fn snapshot(session: &ResearchSession) -> Value {
    let summary_doc = session
        .corpus_summary()
        .map(|text| render_document(text, &session.registry));
    let scope = session.active_scope();

    json!({
        "stats": session.stats,
        "papers": session.papers,
        "search_pending": session.search_pending,
        "summary": summary_doc,
        "summary_pending": session.corpus_summary_pending(),
        "suggested_questions": session.suggested_questions,
        "notes": notes_json(session.notes.all()),
        "all_tags": session.notes.all_tags(),
        "discovery": discovery_json(session),
        "chat": {
            "scope": scope,
            "focus_paper": session.conversations.focus_paper(),
            "messages": session.conversations.history(scope),
            "in_flight": session.conversations.is_in_flight(scope),
        },
        "panels": {
            "references_collapsed": session.references_collapsed,
            "assistant_collapsed": session.assistant_collapsed,
        },
        "recent_queries": session.recent_queries,
    })
}

fn notes_json(notes: &[Note]) -> Vec<Value> {
    let now = Utc::now();
    notes
        .iter()
        .map(|n| {
            json!({
                "id": n.id,
                "title": n.title,
                "content": n.content,
                "tags": n.tags,
                "created_at": n.created_at,
                "created": n.created_at.format("%b %d, %Y").to_string(),
                "last_edited": relative_time(n.last_edited, now),
            })
        })
        .collect()
}

fn discovery_json(session: &ResearchSession) -> Value {
    let discovery = session.discovery.state();
    let answer_doc = discovery
        .answer
        .as_deref()
        .map(|text| render_document(text, &session.registry));
    json!({
        "active_question": discovery.active_question,
        "answer": answer_doc,
        "is_saved": discovery.is_saved,
        "follow_ups": discovery.follow_ups,
        "answer_pending": discovery.answer_pending,
        "follow_ups_pending": discovery.follow_ups_pending,
    })
}

// ============================================================================
// Search
// ============================================================================

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Response {
    let query = body.query.trim().to_string();
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "query must not be empty");
    }
    info!("search: {}", query);

    let epoch = {
        let mut session = state.session.lock().unwrap();
        session.begin_search(&query)
    };

    let (papers, service_error) = match state.generation.search_papers(&query).await {
        Ok(papers) => (papers, None),
        Err(err) => {
            warn!("paper search failed: {}", err);
            (Vec::new(), Some(fallback_for(&err)))
        }
    };

    let empty = papers.is_empty();
    {
        let mut session = state.session.lock().unwrap();
        if !session.apply_search(epoch, &query, papers) {
            // A newer search superseded this one; report it discarded.
            return Json(json!({ "discarded": true })).into_response();
        }
        if empty {
            // Empty result set: explicit empty state, no summary call.
            return Json(json!({
                "empty": true,
                "service_error": service_error,
                "state": snapshot(&session),
            }))
            .into_response();
        }
        session.mark_corpus_summary_pending();
    }

    summarize_and_seed(&state, epoch).await;

    let session = state.session.lock().unwrap();
    Json(json!({ "empty": false, "state": snapshot(&session) })).into_response()
}

/// Generate the executive summary for the current result set, then seed
/// the discovery panel with questions derived from it. Both results are
/// applied under the epoch they were requested for.
async fn summarize_and_seed(state: &Arc<AppState>, epoch: u64) {
    let (query, papers) = {
        let session = state.session.lock().unwrap();
        (session.stats.query.clone(), session.papers.clone())
    };

    let summary = match state.generation.summarize_corpus(&query, &papers).await {
        Ok(text) => text,
        Err(err) => {
            warn!("corpus summary failed: {}", err);
            fallback_for(&err).to_string()
        }
    };

    let context = {
        let mut session = state.session.lock().unwrap();
        if !session.apply_corpus_summary(epoch, summary.clone()) {
            return;
        }
        session.research_context()
    };

    let questions = match state.generation.related_questions(&summary, &context).await {
        Ok(questions) => questions,
        Err(err) => {
            warn!("suggested questions failed: {}", err);
            Vec::new()
        }
    };

    let mut session = state.session.lock().unwrap();
    session.apply_suggested_questions(epoch, questions);
}

// ============================================================================
// Paper Summary
// ============================================================================

pub async fn paper_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Response {
    let (paper, epoch) = {
        let mut session = state.session.lock().unwrap();
        let Some(paper) = session.paper(id).cloned() else {
            return error_response(StatusCode::NOT_FOUND, "unknown paper id");
        };
        if let Some(existing) = session.paper_summary(id) {
            let doc = render_document(existing, &session.registry);
            return Json(json!({ "paper_id": id, "summary": doc, "cached": true }))
                .into_response();
        }
        if session.paper_summary_pending(id) {
            return Json(json!({ "paper_id": id, "pending": true })).into_response();
        }
        session.mark_paper_summary_pending(id);
        (paper, session.epoch())
    };

    let summary = match state.generation.summarize_paper(&paper).await {
        Ok(text) => text,
        Err(err) => {
            warn!("paper summary failed for [{}]: {}", id, err);
            fallback_for(&err).to_string()
        }
    };

    let mut session = state.session.lock().unwrap();
    if !session.apply_paper_summary(epoch, id, summary.clone()) {
        // Focus moved on: a new search replaced this paper while the call
        // was in flight. Discard rather than render under the wrong card.
        return Json(json!({ "paper_id": id, "discarded": true })).into_response();
    }
    let doc = render_document(&summary, &session.registry);
    Json(json!({ "paper_id": id, "summary": doc, "cached": false })).into_response()
}

// ============================================================================
// Chat
// ============================================================================

pub async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatRequest>) -> Response {
    let (scope, outbound) = {
        let mut session = state.session.lock().unwrap();
        let scope = session.active_scope();
        let context = session.chat_context(scope);
        match session.conversations.begin(scope, &body.text, context) {
            Ok(outbound) => (scope, outbound),
            Err(rejected) => {
                return Json(json!({
                    "rejected": format!("{:?}", rejected).to_lowercase(),
                    "messages": session.conversations.history(scope),
                }))
                .into_response();
            }
        }
    };

    run_chat_turn(&state, scope, outbound).await
}

/// "Chat with Paper": an explicit command event that focuses the paper,
/// expands the assistant panel, and opens with a canned discussion prompt.
pub async fn paper_chat(State(state): State<Arc<AppState>>, Path(id): Path<u32>) -> Response {
    let (scope, outbound) = {
        let mut session = state.session.lock().unwrap();
        let Some(paper) = session.paper(id).cloned() else {
            return error_response(StatusCode::NOT_FOUND, "unknown paper id");
        };
        session.conversations.enqueue_paper_chat(id);
        // Commands are consumed exactly once, immediately here: the
        // controller records the focus switch as part of consumption.
        let Some(command) = session.conversations.consume_paper_chat() else {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "command already consumed");
        };
        session.assistant_collapsed = false;

        let scope = ChatScope::Paper(command.paper_id);
        let prompt = paper_discussion_prompt(&paper.title);
        let context = session.chat_context(scope);
        match session.conversations.begin(scope, &prompt, context) {
            Ok(outbound) => (scope, outbound),
            Err(rejected) => {
                return Json(json!({
                    "rejected": format!("{:?}", rejected).to_lowercase(),
                    "messages": session.conversations.history(scope),
                }))
                .into_response();
            }
        }
    };

    run_chat_turn(&state, scope, outbound).await
}

/// Clear the focus paper; subsequent sends go to the global scope.
pub async fn reset_chat_focus(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    session.conversations.clear_focus();
    Json(json!({ "focus_paper": Value::Null }))
}

async fn run_chat_turn(
    state: &Arc<AppState>,
    scope: ChatScope,
    outbound: crate::conversation::OutboundChat,
) -> Response {
    let outcome = state
        .generation
        .chat(&outbound.history, &outbound.user_text, &outbound.context)
        .await;
    if let Err(err) = &outcome {
        warn!("chat turn failed: {}", err);
    }

    let mut session = state.session.lock().unwrap();
    session.conversations.complete(scope, outcome);
    let rendered: Vec<Value> = session
        .conversations
        .history(scope)
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "role": m.role,
                "content": m.content,
                "document": render_document(&m.content, &session.registry),
                "timestamp": m.timestamp,
            })
        })
        .collect();
    Json(json!({ "scope": scope, "messages": rendered })).into_response()
}

// ============================================================================
// Notes
// ============================================================================

#[derive(Deserialize)]
pub struct NotesQuery {
    pub q: Option<String>,
    pub tags: Option<String>,
}

pub async fn list_notes(
    Query(query): Query<NotesQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    let session = state.session.lock().unwrap();
    let text = query.q.unwrap_or_default();
    let tags: Vec<String> = query
        .tags
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let notes = session.notes.query(&text, &tags);
    Json(json!({
        "notes": notes_json(&notes),
        "all_tags": session.notes.all_tags(),
    }))
}

pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NoteCreateRequest>,
) -> Response {
    if body.title.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "note title must not be empty");
    }
    let mut session = state.session.lock().unwrap();
    let note = session
        .notes
        .add(body.title.trim(), &body.content, body.tags);
    Json(json!({ "note": notes_json(&[note])[0] })).into_response()
}

pub async fn delete_note(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    Json(json!({ "removed": session.notes.remove(id) }))
}

/// Synthesize notes from the current executive summary. Malformed or
/// failed synthesis yields zero notes, never an error page.
pub async fn synthesize_notes(State(state): State<Arc<AppState>>) -> Response {
    let source = {
        let session = state.session.lock().unwrap();
        match session.corpus_summary() {
            Some(text) => text.to_string(),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "no summary to synthesize from")
            }
        }
    };

    let synthesized = match state.generation.synthesize_notes(&source).await {
        Ok(notes) => notes,
        Err(err) => {
            warn!("note synthesis failed: {}", err);
            Vec::new()
        }
    };

    let mut session = state.session.lock().unwrap();
    let added = session.notes.add_synthesized(synthesized);
    Json(json!({
        "added": notes_json(&added),
        "notes": notes_json(session.notes.all()),
        "all_tags": session.notes.all_tags(),
    }))
    .into_response()
}

// ============================================================================
// Discovery
// ============================================================================

pub async fn discovery_ask(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DiscoveryAskRequest>,
) -> Response {
    let (request, context) = {
        let mut session = state.session.lock().unwrap();
        match session.discovery.ask(&body.question) {
            Some(request) => {
                let context = session.research_context();
                (request, context)
            }
            // Already answered (or blank): no duplicate spend, just echo
            // the current state.
            None => return Json(json!({ "discovery": discovery_json(&session) })).into_response(),
        }
    };

    let answer = state
        .generation
        .discovery_answer(&request.question, &context)
        .await;
    if let Err(err) = &answer {
        warn!("discovery answer failed: {}", err);
    }

    let follow_up_seed = {
        let mut session = state.session.lock().unwrap();
        let applied = session.discovery.complete_answer(request.token, answer);
        if !applied {
            return Json(json!({ "discovery": discovery_json(&session) })).into_response();
        }
        session
            .discovery
            .state()
            .answer
            .as_ref()
            .filter(|_| session.discovery.state().follow_ups_pending)
            .map(|answer| format!("Q: {}\nA: {}", request.question, answer))
    };

    if let Some(seed) = follow_up_seed {
        let follow_ups = match state.generation.related_questions(&seed, &context).await {
            Ok(questions) => questions,
            Err(err) => {
                warn!("follow-up questions failed: {}", err);
                Vec::new()
            }
        };
        let mut session = state.session.lock().unwrap();
        session.discovery.complete_follow_ups(request.token, follow_ups);
    }

    let session = state.session.lock().unwrap();
    Json(json!({ "discovery": discovery_json(&session) })).into_response()
}

pub async fn discovery_save(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    match session.discovery.save() {
        Some(material) => {
            let added = session.notes.add_synthesized(vec![material]);
            json_saved(&session, true, Some(&added[0]))
        }
        None => json_saved(&session, false, None),
    }
}

fn json_saved(session: &ResearchSession, saved: bool, note: Option<&Note>) -> Json<Value> {
    Json(json!({
        "saved": saved,
        "note": note.map(|n| notes_json(std::slice::from_ref(n))[0].clone()),
        "discovery": discovery_json(session),
    }))
}

pub async fn discovery_dismiss(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    session.discovery.dismiss();
    Json(json!({ "discovery": discovery_json(&session) }))
}

// ============================================================================
// Citations
// ============================================================================

#[derive(Deserialize)]
pub struct TargetRequest {
    pub anchor: String,
}

/// The view layer registers each paper card's anchor as it mounts.
pub async fn register_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(body): Json<TargetRequest>,
) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    session.registry.register_target(id, &body.anchor);
    Json(json!({ "registered": session.registry.target(id).is_some() }))
}

pub async fn unregister_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    session.registry.unregister_target(id);
    Json(json!({ "registered": false }))
}

/// A `[n]` marker was clicked. Resolves the activation side effects; when
/// the paper is known but its card has not registered a scroll target yet
/// (tab still rendering), retry once after a short delay instead of
/// silently doing nothing.
pub async fn activate_citation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Json<Value> {
    let mut outcome = {
        let session = state.session.lock().unwrap();
        session.registry.activate(id, session.references_collapsed)
    };

    if outcome.known && outcome.target.is_none() {
        tokio::time::sleep(ACTIVATION_RETRY).await;
        let session = state.session.lock().unwrap();
        outcome = session.registry.activate(id, session.references_collapsed);
    }

    if outcome.expand_references {
        let mut session = state.session.lock().unwrap();
        session.references_collapsed = false;
    }
    Json(json!({ "activation": outcome }))
}

// ============================================================================
// Panels
// ============================================================================

pub async fn set_panels(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PanelsRequest>,
) -> Json<Value> {
    let mut session = state.session.lock().unwrap();
    if let Some(collapsed) = body.references_collapsed {
        session.references_collapsed = collapsed;
    }
    if let Some(collapsed) = body.assistant_collapsed {
        session.assistant_collapsed = collapsed;
    }
    Json(json!({
        "references_collapsed": session.references_collapsed,
        "assistant_collapsed": session.assistant_collapsed,
    }))
}

// ============================================================================
// Projects and Library
// ============================================================================

pub async fn save_project(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProjectSaveRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "project name must not be empty");
    }
    let query = {
        let session = state.session.lock().unwrap();
        session.stats.query.clone()
    };
    match library::save_project(&state.db, body.name.trim(), &query) {
        Ok(project) => Json(json!({ "project": project })).into_response(),
        Err(err) => {
            warn!("project save failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
    }
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "projects": library::load_projects(&state.db) }))
}

pub async fn bookmark_paper(State(state): State<Arc<AppState>>, Path(id): Path<u32>) -> Response {
    let paper = {
        let session = state.session.lock().unwrap();
        match session.paper(id) {
            Some(paper) => paper.clone(),
            None => return error_response(StatusCode::NOT_FOUND, "unknown paper id"),
        }
    };
    match library::bookmark(&state.db, &paper) {
        Ok(entry) => Json(json!({ "entry": entry })).into_response(),
        Err(err) => {
            warn!("bookmark failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
    }
}

pub async fn list_library(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "library": library::load_bookmarks(&state.db) }))
}

#[derive(Deserialize)]
pub struct UnbookmarkRequest {
    pub title: String,
}

pub async fn remove_library_entry(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnbookmarkRequest>,
) -> Response {
    match library::remove_bookmark(&state.db, &body.title) {
        Ok(removed) => Json(json!({ "removed": removed })).into_response(),
        Err(err) => {
            warn!("bookmark removal failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
