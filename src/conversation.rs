//! Conversation controller: per-scope chat histories and the send state
//! machine.
//!
//! Each scope (the global assistant, or one focus paper) has an
//! independent, append-only history and an at-most-one-in-flight send
//! invariant. A send is split into `begin` (synchronous: validate, append
//! the user turn, capture the outbound request) and `complete`
//! (apply the service outcome, clearing the in-flight flag no matter
//! what). Failures are appended in-band as assistant turns, never hidden.

use crate::generation::{fallback_for, GenerationError};
use crate::models::{ChatScope, ConversationMessage, Role};
use chrono::Utc;
use std::collections::{HashMap, HashSet};

/// Greeting seeded into the global scope, matching the assistant panel's
/// first message.
const GREETING: &str =
    "Hello! I'm your Medical Research Assistant. How can I help you analyze your findings today?";

/// The canned opener sent on behalf of the user when they pick
/// "Chat with Paper" on a card.
pub fn paper_discussion_prompt(title: &str) -> String {
    format!(
        "I'd like to discuss the paper: \"{}\". Could you summarize its key findings and methodology for me?",
        title
    )
}

/// Why `begin` refused to start a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    Blank,
    InFlight,
}

/// Everything the caller needs to perform the actual generation call:
/// the history *before* the new user turn, the new text, and the context
/// snapshot captured at begin time.
#[derive(Debug, Clone)]
pub struct OutboundChat {
    pub scope: ChatScope,
    pub history: Vec<ConversationMessage>,
    pub user_text: String,
    pub context: String,
}

/// An explicit "chat with this paper" command. Carries a monotonic
/// sequence number so repeated clicks on the same paper are distinct
/// events, and is consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperChatCommand {
    pub seq: u64,
    pub paper_id: u32,
}

#[derive(Debug, Default)]
pub struct ConversationController {
    histories: HashMap<ChatScope, Vec<ConversationMessage>>,
    in_flight: HashSet<ChatScope>,
    next_message_id: u64,
    focus_paper: Option<u32>,
    next_seq: u64,
    pending_command: Option<PaperChatCommand>,
}

impl ConversationController {
    pub fn new() -> Self {
        let mut ctrl = Self {
            next_message_id: 1,
            next_seq: 1,
            ..Default::default()
        };
        ctrl.append(ChatScope::Global, Role::Assistant, GREETING);
        ctrl
    }

    // ------------------------------------------------------------------
    // Send state machine
    // ------------------------------------------------------------------

    /// Start a send: reject blank input and double-sends for the same
    /// scope, otherwise append the user turn optimistically and mark the
    /// scope in-flight.
    pub fn begin(
        &mut self,
        scope: ChatScope,
        text: &str,
        context: String,
    ) -> Result<OutboundChat, SendRejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejected::Blank);
        }
        if self.in_flight.contains(&scope) {
            return Err(SendRejected::InFlight);
        }

        let prior = self.history(scope).to_vec();
        self.append(scope, Role::User, text);
        self.in_flight.insert(scope);

        Ok(OutboundChat {
            scope,
            history: prior,
            user_text: text.to_string(),
            context,
        })
    }

    /// Finish a send: append the assistant turn (service text on success,
    /// the matching fallback message on failure) and clear the in-flight
    /// flag regardless of outcome.
    pub fn complete(&mut self, scope: ChatScope, outcome: Result<String, GenerationError>) {
        let content = match &outcome {
            Ok(text) => text.clone(),
            Err(err) => fallback_for(err).to_string(),
        };
        self.append(scope, Role::Assistant, &content);
        self.in_flight.remove(&scope);
    }

    pub fn is_in_flight(&self, scope: ChatScope) -> bool {
        self.in_flight.contains(&scope)
    }

    pub fn history(&self, scope: ChatScope) -> &[ConversationMessage] {
        self.histories.get(&scope).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn append(&mut self, scope: ChatScope, role: Role, content: &str) {
        let message = ConversationMessage {
            id: self.next_message_id,
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        self.next_message_id += 1;
        self.histories.entry(scope).or_default().push(message);
    }

    // ------------------------------------------------------------------
    // Focus paper and the paper-chat command queue
    // ------------------------------------------------------------------

    pub fn focus_paper(&self) -> Option<u32> {
        self.focus_paper
    }

    /// Clear the focus paper ("Reset" in the context badge). History for
    /// the paper's scope is preserved.
    pub fn clear_focus(&mut self) {
        self.focus_paper = None;
    }

    /// Queue a "chat with paper" command. Replaces any not-yet-consumed
    /// command; the latest click wins.
    pub fn enqueue_paper_chat(&mut self, paper_id: u32) -> PaperChatCommand {
        let command = PaperChatCommand {
            seq: self.next_seq,
            paper_id,
        };
        self.next_seq += 1;
        self.pending_command = Some(command);
        command
    }

    /// Take the pending command, if any, and make its paper the focus.
    /// Consuming twice yields nothing the second time.
    pub fn consume_paper_chat(&mut self) -> Option<PaperChatCommand> {
        let command = self.pending_command.take()?;
        self.focus_paper = Some(command.paper_id);
        Some(command)
    }
}
