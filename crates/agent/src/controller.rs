//! The agent turn loop.
//!
//! Each turn sends the accumulated context to the primary model and acts on
//! the single JSON action it returns. The loop ends on a generated card, a
//! refusal, a question for the user, or when the attempt runs out of turns.
//! Malformed replies, invalid cards, rejected searches and unknown actions
//! are noted and cost a turn; they never end the loop on their own.

use ankigen_core::card::{AgentResponse, Card, DebugTurn};
use ankigen_core::json::decode_object;
use ankigen_core::{AgentState, PipelineContext, SearchLimit};
use ankigen_retrieval::RetrievalAggregator;
use tracing::{info, warn};

use crate::llm::{ModelCaller, ModelTier};
use crate::prompts;

/// Knobs the loop needs from the pipeline configuration.
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    pub max_turns: u32,
    pub search_limit: SearchLimit,
    /// Hits fetched for each agent-requested search.
    pub aux_num_results: usize,
    /// Character cap on an agent-requested search's formatted text.
    pub aux_result_chars: usize,
    pub guidelines: String,
}

pub struct AgentController<'a> {
    llm: &'a ModelCaller,
    retrieval: &'a RetrievalAggregator,
    policy: &'a TurnPolicy,
}

impl<'a> AgentController<'a> {
    pub fn new(llm: &'a ModelCaller, retrieval: &'a RetrievalAggregator, policy: &'a TurnPolicy) -> Self {
        Self {
            llm,
            retrieval,
            policy,
        }
    }

    /// Run turns until one of them settles the attempt.
    pub async fn run(&self, ctx: &mut PipelineContext) -> AgentState {
        loop {
            if let Some(state) = self.turn(ctx).await {
                info!(state = ?state, turns = ctx.turns_in_attempt(), "Agent loop finished");
                return state;
            }
        }
    }

    async fn turn(&self, ctx: &mut PipelineContext) -> Option<AgentState> {
        let turn = ctx.next_turn();
        let max_turns = self.policy.max_turns;

        if ctx.turns_in_attempt() > max_turns {
            warn!(turn, max_turns, "Agent turn limit reached");
            let mut record = DebugTurn::new(turn, "");
            record.error = Some(format!("turn limit reached ({max_turns} max)"));
            ctx.audit_log.push(record);
            return Some(AgentState::TurnLimitExceeded);
        }

        info!(
            turn,
            max_turns,
            searches = ctx.search_count,
            "Agent turn"
        );

        let system = prompts::agent_system_prompt(
            &self.policy.guidelines,
            &self.policy.search_limit.describe_remaining(ctx.search_count),
        );
        let user = prompts::agent_user_prompt(ctx);
        let mut record = DebugTurn::new(turn, user.as_str());

        let decided = match self.llm.call(Some(&system), &user, ModelTier::Primary).await {
            Ok(raw) => {
                record.raw_response = raw.clone();
                decode_object::<AgentResponse>(&raw)
                    .map_err(|e| format!("failed to parse agent response: {e}"))
            }
            Err(e) => Err(e.to_string()),
        };

        let response = match decided {
            Ok(response) => {
                record.parsed = Some(response.clone());
                ctx.audit_log.push(record);
                response
            }
            Err(message) => {
                warn!(turn, error = %message, "Agent turn failed");
                record.error = Some(message.clone());
                ctx.audit_log.push(record);
                ctx.note_failure(format!("Turn {turn} error: {message}"));
                return None;
            }
        };

        info!(turn, decision = %response.describe(), "Agent decided");
        let raw = ctx
            .audit_log
            .last()
            .map(|r| r.raw_response.clone())
            .unwrap_or_default();

        match response {
            AgentResponse::Generate(card) => self.accept_card(ctx, turn, card, raw),
            AgentResponse::Refuse { reason } => {
                ctx.refuse(reason);
                Some(AgentState::Refused)
            }
            AgentResponse::Search { term } => {
                self.search(ctx, turn, &term).await;
                None
            }
            AgentResponse::Ask { question } => {
                ctx.await_input(question);
                Some(AgentState::AwaitingInput)
            }
            AgentResponse::Unknown(action) => {
                ctx.note_failure(format!("Turn {turn}: unknown action '{action}'"));
                None
            }
        }
    }

    fn accept_card(
        &self,
        ctx: &mut PipelineContext,
        turn: u32,
        mut card: Card,
        raw: String,
    ) -> Option<AgentState> {
        if !card.is_valid() {
            warn!(turn, "Agent produced an invalid card");
            ctx.note_failure(format!("Turn {turn}: invalid card"));
            return None;
        }
        card.raw_response = raw;
        ctx.install_card(card);
        Some(AgentState::Generated)
    }

    async fn search(&self, ctx: &mut PipelineContext, turn: u32, term: &str) {
        if self.policy.search_limit.is_exhausted(ctx.search_count) {
            warn!(turn, term, "Search rejected, limit reached");
            ctx.note_failure(format!("Turn {turn}: search rejected (limit reached)"));
            return;
        }

        ctx.search_count += 1;
        let outcome = self
            .retrieval
            .search_one(term, self.policy.aux_num_results, self.policy.aux_result_chars)
            .await;

        match outcome {
            Ok(text) => {
                info!(term, chars = text.len(), "Additional search merged");
                ctx.summary
                    .push_str(&format!("\n\n[Additional search: {term}]\n{text}"));
            }
            Err(e) => {
                warn!(term, error = %e, "Additional search failed");
                ctx.summary
                    .push_str(&format!("\n\n[Search for '{term}' failed: {e}]"));
            }
        }
    }
}
