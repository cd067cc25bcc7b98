//! Generation client: the abstraction boundary to the external
//! text-generation service (Gemini `generateContent` REST API).
//!
//! Every call is a typed request/response contract. Failures never cross
//! this boundary raw: they are converted into `GenerationError` variants so
//! call sites can pick the right fallback (empty list, placeholder text, or
//! the rate-limit message, which is user-visibly distinct from the generic
//! one). JSON responses are schema-checked here; the rest of the program
//! may trust the record shapes.

use crate::models::{ConversationMessage, Paper, RelatedQuestion, Role, SynthesizedNote};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const API_KEY_ENV: &str = "MEDSEARCH_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_INSTRUCTION: &str = "You are a specialized Medical Research Assistant for a platform called MedSearch. \
You help researchers analyze papers, summarize findings, and suggest follow-up questions. \
Keep responses professional, evidence-based, and concise. Use markdown for formatting.";

// ============================================================================
// Errors and Fallback Messages
// ============================================================================

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service rate limited")]
    RateLimited,
    #[error("generation service unavailable: {0}")]
    Unavailable(String),
    #[error("generation request timed out")]
    Timeout,
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("no API key configured (set {API_KEY_ENV})")]
    MissingApiKey,
}

impl GenerationError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GenerationError::RateLimited)
    }
}

/// Shown in place of assistant output when the service reports quota
/// exhaustion. Deliberately distinct from `failure_message`.
pub fn rate_limit_message() -> &'static str {
    "The assistant is at its query limit right now. Please wait a moment and try again."
}

/// Generic in-band failure text, used for every non-rate-limit error.
pub fn failure_message() -> &'static str {
    "I apologize, I encountered an error processing your request. Please try again."
}

pub fn fallback_for(err: &GenerationError) -> &'static str {
    if err.is_rate_limit() {
        rate_limit_message()
    } else {
        failure_message()
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct GenerationClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GenerationClient {
    /// Build a client from the environment. A missing key is not fatal at
    /// startup; each call surfaces `MissingApiKey` instead, which degrades
    /// to the generic failure path.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("{} not set; generation calls will fail gracefully", API_KEY_ENV);
        }
        Self::new(api_key, DEFAULT_MODEL)
    }

    pub fn new(api_key: Option<String>, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: model.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn generate(&self, body: Value) -> Result<String, GenerationError> {
        let key = self.api_key.as_ref().ok_or(GenerationError::MissingApiKey)?;
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, key
        );

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if text.contains("RESOURCE_EXHAUSTED") || text.contains("quota") {
                return Err(GenerationError::RateLimited);
            }
            return Err(GenerationError::Unavailable(format!("{}: {}", status, text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        extract_candidate_text(&json)
            .ok_or_else(|| GenerationError::Malformed("no candidate text in response".to_string()))
    }

    async fn generate_text(&self, prompt: String) -> Result<String, GenerationError> {
        self.generate(json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        }))
        .await
    }

    /// Structured-output variant: asks the model for raw JSON and parses
    /// the candidate text as a `Value`.
    async fn generate_json(&self, prompt: String) -> Result<Value, GenerationError> {
        let text = self
            .generate(json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
                "generationConfig": { "responseMimeType": "application/json" },
            }))
            .await?;

        // Some models wrap the JSON in prose or code fences anyway; take
        // the outermost braces/brackets.
        let trimmed = extract_json_payload(&text);
        serde_json::from_str(trimmed).map_err(|e| {
            warn!("generation returned unparseable JSON: {}", e);
            GenerationError::Malformed(format!("invalid JSON payload: {}", e))
        })
    }

    // ------------------------------------------------------------------
    // Call Contracts
    // ------------------------------------------------------------------

    /// Find candidate papers for a research query. Paper ids are assigned
    /// locally in arrival order; an id from the service is never trusted.
    pub async fn search_papers(&self, query: &str) -> Result<Vec<Paper>, GenerationError> {
        let prompt = format!(
            "Find the most relevant published medical research papers for this query: \"{}\".\n\n\
             Return ONLY a JSON array (no other text). Each element must have these fields:\n\
             {{\"title\": \"...\", \"authors\": \"Lastname A, et al.\", \"journal\": \"...\", \
             \"date\": \"May 2022\", \"citationCount\": 145, \"abstract\": \"...\", \
             \"tags\": [\"RCT\", \"Phase 3\"], \"url\": \"https://...\"}}\n\n\
             Include 5 to 12 real, well-known papers. If nothing relevant exists, return [].",
            query
        );
        let value = self.generate_json(prompt).await?;
        Ok(parse_paper_array(&value))
    }

    /// Summarize the whole result set. Only called with a non-empty paper
    /// list; the prompt numbers each paper so the model can cite `[n]`.
    pub async fn summarize_corpus(
        &self,
        query: &str,
        papers: &[Paper],
    ) -> Result<String, GenerationError> {
        let listing = number_papers(papers);
        let prompt = format!(
            "Write an executive summary of the research evidence answering: \"{}\".\n\n\
             The available papers, numbered for citation:\n{}\n\
             Structure the summary with ### headers (e.g. ### Primary Outcome, ### Safety Profile).\n\
             Cite claims with bracketed numbers like [1] that refer to the numbered papers above.\n\
             Use **bold** for key terms and keep concrete figures (percentages, durations, doses).",
            query, listing
        );
        self.generate_text(prompt).await
    }

    /// Deep-dive summary of a single paper.
    pub async fn summarize_paper(&self, paper: &Paper) -> Result<String, GenerationError> {
        let prompt = format!(
            "Write a technical summary of this paper for a researcher.\n\n\
             Title: {}\nAuthors: {}\nJournal: {}\nDate: {}\nAbstract: {}\n\n\
             Cover methodology, key findings, and limitations. Use ### headers and **bold** \
             for key terms, and keep concrete figures.",
            paper.title, paper.authors, paper.journal, paper.date, paper.abstract_text
        );
        self.generate_text(prompt).await
    }

    /// Convert freeform generated text into structured note records.
    pub async fn synthesize_notes(
        &self,
        source_text: &str,
    ) -> Result<Vec<SynthesizedNote>, GenerationError> {
        let prompt = format!(
            "Extract the key claims from the research summary below as concise notes.\n\n\
             Return ONLY a JSON array. Each element: {{\"title\": \"...\", \"content\": \"...\", \
             \"tags\": [\"Efficacy\"]}}.\n\
             When a note quotes or restates a cited claim, preserve its bracketed citation \
             markers like [2] verbatim in the content.\n\nSummary:\n{}",
            source_text
        );
        let value = self.generate_json(prompt).await?;
        Ok(parse_note_array(&value))
    }

    /// Follow-up questions seeded from a question/answer or summary.
    pub async fn related_questions(
        &self,
        seed_text: &str,
        context: &str,
    ) -> Result<Vec<RelatedQuestion>, GenerationError> {
        let prompt = format!(
            "Suggest follow-up research questions a researcher would explore next.\n\n\
             Return ONLY a JSON array. Each element: {{\"question\": \"...\", \
             \"category\": \"Mechanism\"}}. Suggest 3 to 5 questions.\n\n\
             Current line of inquiry:\n{}\n\nResearch context:\n{}",
            seed_text, context
        );
        let value = self.generate_json(prompt).await?;
        Ok(parse_question_array(&value))
    }

    /// Answer one discovery question against the current research context.
    pub async fn discovery_answer(
        &self,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "Answer this research question concisely and evidence-based, using ### headers \
             where structure helps and citing the numbered papers with [n] markers when the \
             context lists them.\n\nQuestion: {}\n\nResearch context:\n{}",
            question, context
        );
        self.generate_text(prompt).await
    }

    /// One chat turn: full prior history plus the new user message, with
    /// the active context injected into the final turn.
    pub async fn chat(
        &self,
        history: &[ConversationMessage],
        user_text: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role { Role::User => "user", Role::Assistant => "model" },
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": format!("Research context:\n{}\n\nUser question: {}", context, user_text) }],
        }));

        self.generate(json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        }))
        .await
    }
}

/// Numbered paper listing injected into corpus-level prompts, matching the
/// ids citation markers resolve against.
pub fn number_papers(papers: &[Paper]) -> String {
    let mut out = String::new();
    for p in papers {
        out.push_str(&format!(
            "[{}] {} — {} ({}, {})\n",
            p.id, p.title, p.authors, p.journal, p.date
        ));
    }
    out
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Pull the generated text out of a `generateContent` response body.
pub fn extract_candidate_text(json: &Value) -> Option<String> {
    json.get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Strip code fences / surrounding prose from a JSON payload by slicing
/// from the first `[`/`{` to the matching last `]`/`}`.
fn extract_json_payload(text: &str) -> &str {
    let trimmed = text.trim();
    let open = trimmed.find(['[', '{']);
    match open {
        Some(start) => {
            let close = if trimmed.as_bytes()[start] == b'[' {
                trimmed.rfind(']')
            } else {
                trimmed.rfind('}')
            };
            match close {
                Some(end) if end > start => &trimmed[start..=end],
                _ => trimmed,
            }
        }
        None => trimmed,
    }
}

/// Validate and coerce a paper array from the service. Entries without a
/// title are dropped; ids are assigned 1-based in arrival order; URLs that
/// do not parse as http(s) are discarded rather than rendered as links.
pub fn parse_paper_array(value: &Value) -> Vec<Paper> {
    let Some(items) = value.as_array() else {
        warn!("paper search response was not a JSON array");
        return Vec::new();
    };

    let mut papers = Vec::new();
    for item in items {
        let Some(title) = item.get("title").and_then(|t| t.as_str()) else {
            continue;
        };
        if title.trim().is_empty() {
            continue;
        }
        let id = papers.len() as u32 + 1;
        papers.push(Paper {
            id,
            title: title.trim().to_string(),
            authors: str_field(item, "authors").unwrap_or_else(|| "Unknown authors".to_string()),
            journal: str_field(item, "journal").unwrap_or_else(|| "Unknown journal".to_string()),
            date: str_field(item, "date").unwrap_or_default(),
            citation_count: item
                .get("citationCount")
                .and_then(|c| c.as_u64())
                .unwrap_or(0) as u32,
            abstract_text: str_field(item, "abstract").unwrap_or_default(),
            tags: str_list(item, "tags"),
            url: str_field(item, "url").and_then(|u| validate_paper_url(&u)),
        });
    }
    papers
}

pub fn parse_note_array(value: &Value) -> Vec<SynthesizedNote> {
    let Some(items) = value.as_array() else {
        warn!("note synthesis response was not a JSON array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = str_field(item, "title")?;
            let content = str_field(item, "content")?;
            if title.is_empty() || content.is_empty() {
                return None;
            }
            Some(SynthesizedNote {
                title,
                content,
                tags: str_list(item, "tags"),
            })
        })
        .collect()
}

pub fn parse_question_array(value: &Value) -> Vec<RelatedQuestion> {
    let Some(items) = value.as_array() else {
        warn!("related questions response was not a JSON array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let question = str_field(item, "question")?;
            if question.is_empty() {
                return None;
            }
            Some(RelatedQuestion {
                question,
                category: str_field(item, "category").unwrap_or_else(|| "General".to_string()),
            })
        })
        .collect()
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

fn str_list(item: &Value, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Only http(s) URLs that actually parse survive to the UI.
fn validate_paper_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(raw.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
