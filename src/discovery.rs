//! Discovery-path controller: the question -> answer -> follow-up
//! exploration flow.
//!
//! Exactly one question is active at a time. Asking a new question
//! (including picking a follow-up) resets the answer, saved flag, and
//! follow-up list before a new generation request goes out. Requests carry
//! a generation token; a response whose token no longer matches is
//! discarded, not queued, so an answer never lands under a question that
//! was replaced while it was in flight.

use crate::generation::{fallback_for, GenerationError};
use crate::models::{DiscoveryState, RelatedQuestion, SynthesizedNote};

/// Tag applied (alongside the AI provenance tag) to notes saved from a
/// discovery answer.
pub const DISCOVERY_TAG: &str = "Discovery";

/// A request the caller should now perform against the generation client.
/// `token` must be handed back on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub token: u64,
    pub question: String,
}

#[derive(Debug, Default)]
pub struct DiscoveryController {
    state: DiscoveryState,
    generation: u64,
}

impl DiscoveryController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DiscoveryState {
        &self.state
    }

    /// Activate a question. Returns `None` (no request, no state change)
    /// when the exact question is already active, answered, and nothing is
    /// pending: re-answering it would be duplicate spend.
    pub fn ask(&mut self, question: &str) -> Option<DiscoveryRequest> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        let already_settled = self.state.active_question.as_deref() == Some(question)
            && self.state.answer.is_some()
            && !self.state.answer_pending
            && !self.state.follow_ups_pending;
        if already_settled {
            return None;
        }

        self.generation += 1;
        self.state = DiscoveryState {
            active_question: Some(question.to_string()),
            answer: None,
            is_saved: false,
            follow_ups: Vec::new(),
            answer_pending: true,
            follow_ups_pending: false,
        };
        Some(DiscoveryRequest {
            token: self.generation,
            question: question.to_string(),
        })
    }

    /// Apply an answer outcome. Stale tokens (the question changed while
    /// the call was in flight) are discarded; returns whether the outcome
    /// was applied. A successful answer flips `follow_ups_pending` on, and
    /// the caller should fetch follow-up questions next; a failed one puts
    /// the fallback text in place of the answer and stops there.
    pub fn complete_answer(&mut self, token: u64, outcome: Result<String, GenerationError>) -> bool {
        if token != self.generation {
            return false;
        }
        self.state.answer_pending = false;
        match outcome {
            Ok(text) => {
                self.state.answer = Some(text);
                self.state.follow_ups_pending = true;
            }
            Err(err) => {
                self.state.answer = Some(fallback_for(&err).to_string());
            }
        }
        true
    }

    /// Apply the follow-up list (empty on service failure). Stale tokens
    /// are discarded.
    pub fn complete_follow_ups(&mut self, token: u64, follow_ups: Vec<RelatedQuestion>) -> bool {
        if token != self.generation {
            return false;
        }
        self.state.follow_ups = follow_ups;
        self.state.follow_ups_pending = false;
        true
    }

    /// Convert the active question and answer into note material. No-op
    /// (None) when already saved, unanswered, or still pending; calling
    /// twice has the effect of once.
    pub fn save(&mut self) -> Option<SynthesizedNote> {
        if self.state.is_saved || self.state.answer_pending {
            return None;
        }
        let question = self.state.active_question.clone()?;
        let answer = self.state.answer.clone()?;
        self.state.is_saved = true;
        Some(SynthesizedNote {
            title: question,
            content: answer,
            tags: vec![DISCOVERY_TAG.to_string()],
        })
    }

    /// Return to the "no active discovery" state, invalidating anything
    /// still in flight.
    pub fn dismiss(&mut self) {
        self.generation += 1;
        self.state = DiscoveryState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered(ctrl: &mut DiscoveryController, question: &str, answer: &str) -> u64 {
        let req = ctrl.ask(question).unwrap();
        assert!(ctrl.complete_answer(req.token, Ok(answer.to_string())));
        assert!(ctrl.complete_follow_ups(
            req.token,
            vec![RelatedQuestion {
                question: "Follow up?".to_string(),
                category: "Mechanism".to_string(),
            }]
        ));
        req.token
    }

    #[test]
    fn ask_resets_prior_state() {
        let mut ctrl = DiscoveryController::new();
        answered(&mut ctrl, "Q1", "A1");
        assert!(ctrl.save().is_some());

        let req = ctrl.ask("Q2").unwrap();
        let state = ctrl.state();
        assert_eq!(state.active_question.as_deref(), Some("Q2"));
        assert!(state.answer.is_none());
        assert!(!state.is_saved);
        assert!(state.follow_ups.is_empty());
        assert!(state.answer_pending);
        assert_eq!(req.question, "Q2");
    }

    #[test]
    fn settled_question_is_not_re_asked() {
        let mut ctrl = DiscoveryController::new();
        answered(&mut ctrl, "Q1", "A1");
        assert!(ctrl.ask("Q1").is_none());
        // A different question still goes through
        assert!(ctrl.ask("Q2").is_some());
    }

    #[test]
    fn pending_question_may_be_re_asked() {
        let mut ctrl = DiscoveryController::new();
        let first = ctrl.ask("Q1").unwrap();
        // Same question again while the answer is pending: allowed, and the
        // old request's token goes stale.
        let second = ctrl.ask("Q1").unwrap();
        assert!(second.token > first.token);
        assert!(!ctrl.complete_answer(first.token, Ok("late".to_string())));
        assert!(ctrl.state().answer.is_none());
    }

    #[test]
    fn stale_answer_is_discarded() {
        let mut ctrl = DiscoveryController::new();
        let first = ctrl.ask("Q1").unwrap();
        let second = ctrl.ask("Q2").unwrap();

        assert!(!ctrl.complete_answer(first.token, Ok("answer to Q1".to_string())));
        assert!(ctrl.state().answer.is_none());

        assert!(ctrl.complete_answer(second.token, Ok("answer to Q2".to_string())));
        assert_eq!(ctrl.state().answer.as_deref(), Some("answer to Q2"));
    }

    #[test]
    fn failed_answer_shows_fallback_and_skips_follow_ups() {
        let mut ctrl = DiscoveryController::new();
        let req = ctrl.ask("Q1").unwrap();
        assert!(ctrl.complete_answer(req.token, Err(GenerationError::RateLimited)));

        let state = ctrl.state();
        assert_eq!(
            state.answer.as_deref(),
            Some(crate::generation::rate_limit_message())
        );
        assert!(!state.follow_ups_pending);
    }

    #[test]
    fn save_is_idempotent() {
        let mut ctrl = DiscoveryController::new();
        answered(&mut ctrl, "Q1", "A1");

        let note = ctrl.save().unwrap();
        assert_eq!(note.title, "Q1");
        assert_eq!(note.content, "A1");
        assert_eq!(note.tags, vec![DISCOVERY_TAG.to_string()]);
        // Second save yields nothing
        assert!(ctrl.save().is_none());
    }

    #[test]
    fn save_requires_an_answer() {
        let mut ctrl = DiscoveryController::new();
        assert!(ctrl.save().is_none());
        ctrl.ask("Q1").unwrap();
        assert!(ctrl.save().is_none());
    }

    #[test]
    fn dismiss_clears_and_invalidates_in_flight() {
        let mut ctrl = DiscoveryController::new();
        let req = ctrl.ask("Q1").unwrap();
        ctrl.dismiss();

        assert!(ctrl.state().active_question.is_none());
        assert!(!ctrl.complete_answer(req.token, Ok("late".to_string())));
        assert!(ctrl.state().answer.is_none());

        // The same question can be explored again after dismissal
        assert!(ctrl.ask("Q1").is_some());
    }

    #[test]
    fn follow_up_selection_deepens_the_chain() {
        let mut ctrl = DiscoveryController::new();
        answered(&mut ctrl, "Q1", "A1");
        let follow_up = ctrl.state().follow_ups[0].question.clone();

        let req = ctrl.ask(&follow_up).unwrap();
        assert_eq!(ctrl.state().active_question.as_deref(), Some("Follow up?"));
        assert!(ctrl.complete_answer(req.token, Ok("A2".to_string())));
        assert_eq!(ctrl.state().answer.as_deref(), Some("A2"));
    }
}
