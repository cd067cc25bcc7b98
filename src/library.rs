//! Local persistence for projects and the paper library.
//!
//! Backed by named sled trees with JSON-encoded values. The core never
//! depends on persistence succeeding: any open/read/decode failure logs a
//! warning and degrades to an empty collection, and write failures are
//! reported as error strings for the handler to surface.

use crate::models::{LibraryEntry, Paper, Project};
use chrono::Utc;
use tracing::warn;

const PROJECTS_TREE: &str = "projects";
const LIBRARY_TREE: &str = "library";

// ============================================================================
// Projects
// ============================================================================

/// Save (or overwrite) a project bookmark for the given query.
pub fn save_project(db: &sled::Db, name: &str, query: &str) -> Result<Project, String> {
    let project = Project {
        name: name.to_string(),
        query: query.to_string(),
        saved_at: Utc::now(),
    };
    let tree = db
        .open_tree(PROJECTS_TREE)
        .map_err(|e| format!("Cannot open projects tree: {}", e))?;
    let json = serde_json::to_vec(&project).map_err(|e| format!("JSON serialize error: {}", e))?;
    tree.insert(name.as_bytes(), json)
        .map_err(|e| format!("Sled insert error: {}", e))?;
    Ok(project)
}

/// All saved projects, newest first. Failures yield an empty list.
pub fn load_projects(db: &sled::Db) -> Vec<Project> {
    let tree = match db.open_tree(PROJECTS_TREE) {
        Ok(t) => t,
        Err(e) => {
            warn!("cannot open projects tree: {}", e);
            return Vec::new();
        }
    };

    let mut projects: Vec<Project> = tree
        .iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|(_, value)| serde_json::from_slice(&value).ok())
        .collect();
    projects.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
    projects
}

// ============================================================================
// Library (bookmarked papers)
// ============================================================================

/// Bookmark a paper into the personal library. Keyed by title: session
/// ids are reassigned every search, so they cannot identify a paper across
/// sessions.
pub fn bookmark(db: &sled::Db, paper: &Paper) -> Result<LibraryEntry, String> {
    let entry = LibraryEntry {
        paper: paper.clone(),
        bookmarked_at: Utc::now(),
    };
    let tree = db
        .open_tree(LIBRARY_TREE)
        .map_err(|e| format!("Cannot open library tree: {}", e))?;
    let json = serde_json::to_vec(&entry).map_err(|e| format!("JSON serialize error: {}", e))?;
    tree.insert(paper.title.as_bytes(), json)
        .map_err(|e| format!("Sled insert error: {}", e))?;
    Ok(entry)
}

pub fn remove_bookmark(db: &sled::Db, title: &str) -> Result<bool, String> {
    let tree = db
        .open_tree(LIBRARY_TREE)
        .map_err(|e| format!("Cannot open library tree: {}", e))?;
    let removed = tree
        .remove(title.as_bytes())
        .map_err(|e| format!("Sled remove error: {}", e))?;
    Ok(removed.is_some())
}

/// All bookmarked papers, newest first. Failures yield an empty list.
pub fn load_bookmarks(db: &sled::Db) -> Vec<LibraryEntry> {
    let tree = match db.open_tree(LIBRARY_TREE) {
        Ok(t) => t,
        Err(e) => {
            warn!("cannot open library tree: {}", e);
            return Vec::new();
        }
    };

    let mut entries: Vec<LibraryEntry> = tree
        .iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|(_, value)| serde_json::from_slice(&value).ok())
        .collect();
    entries.sort_by(|a, b| b.bookmarked_at.cmp(&a.bookmarked_at));
    entries
}
