//! The mutable unit of work threaded through every pipeline stage.

use tracing::debug;

use crate::card::{Card, DebugTurn};
use crate::history::CardHistory;

/// Reason recorded when the user declines to answer an agent question.
pub const CANCELLED_REASON: &str = "User cancelled agent question";

/// All state produced while turning one question into a card.
///
/// Created once per run and discarded at process end. Stages write to it in
/// order; the agent loop owns it exclusively while running.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub question: String,
    pub search_terms: Vec<String>,
    /// Merged raw retrieval text.
    pub research: String,
    /// Summary handed to the agent, grown by auxiliary searches.
    pub summary: String,
    pub card: Option<Card>,
    pub history: CardHistory,

    /// Auxiliary searches accepted so far. Spans regenerations.
    pub search_count: u32,
    /// Total agent turns taken. Never decreases.
    pub turn: u32,
    /// Value of `turn` when the current generation attempt began.
    pub attempt_start_turn: u32,

    pub refused: bool,
    pub refusal_reason: String,
    pub awaiting_input: bool,
    pub pending_question: String,
    pub user_responses: Vec<String>,

    /// One entry per agent turn, in order.
    pub audit_log: Vec<DebugTurn>,
    /// Notes on turns that did not produce a decision, e.g. `"Turn 2: invalid card"`.
    pub failed_attempts: Vec<String>,
}

impl PipelineContext {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// Turns charged against the current attempt's cap.
    pub fn turns_in_attempt(&self) -> u32 {
        self.turn - self.attempt_start_turn
    }

    /// Reset per-attempt state before entering the agent loop.
    ///
    /// The turn counter, search count, audit log, history and user
    /// responses survive.
    pub fn begin_attempt(&mut self) {
        self.attempt_start_turn = self.turn;
        self.failed_attempts.clear();
        self.refused = false;
        self.refusal_reason.clear();
        self.awaiting_input = false;
        self.pending_question.clear();
    }

    /// Advance to the next turn and return its number.
    pub fn next_turn(&mut self) -> u32 {
        self.turn += 1;
        self.turn
    }

    /// Make `card` current and append it to the history.
    pub fn install_card(&mut self, card: Card) {
        let index = self.history.push(card.clone());
        debug!(index, front = %card.front, "Card installed");
        self.card = Some(card);
    }

    pub fn refuse(&mut self, reason: impl Into<String>) {
        self.awaiting_input = false;
        self.pending_question.clear();
        self.refused = true;
        self.refusal_reason = reason.into();
    }

    pub fn await_input(&mut self, question: impl Into<String>) {
        self.awaiting_input = true;
        self.pending_question = question.into();
    }

    /// Record the user's answer and clear the pending question.
    pub fn accept_response(&mut self, response: impl Into<String>) {
        self.user_responses.push(response.into());
        self.awaiting_input = false;
        self.pending_question.clear();
    }

    pub fn note_failure(&mut self, note: impl Into<String>) {
        self.failed_attempts.push(note.into());
    }

    /// Step the history cursor back and make that entry current.
    pub fn history_back(&mut self) -> Option<&Card> {
        let card = self.history.back()?.clone();
        self.card = Some(card);
        self.card.as_ref()
    }

    /// Step the history cursor forward and make that entry current.
    pub fn history_forward(&mut self) -> Option<&Card> {
        let card = self.history.forward()?.clone();
        self.card = Some(card);
        self.card.as_ref()
    }
}
