//! The stage sequencer and the public entry points of a run.

use ankigen_config::{AppConfig, RetrievalStrategy};
use ankigen_core::card::Card;
use ankigen_core::json::decode_object;
use ankigen_core::{
    AgentState, CANCELLED_REASON, Collaborators, InputChannel, PipelineContext, SearchLimit,
    UserReply,
};
use ankigen_retrieval::{RetrievalAggregator, RetrievalOptions, Strategy};
use tracing::{debug, info, warn};

use crate::controller::{AgentController, TurnPolicy};
use crate::error::PipelineError;
use crate::llm::{ModelCaller, ModelTier};
use crate::prompts;
use crate::research::{self, CreativeTerms};
use crate::stage::StageKind;

const REVISION_FAILED: &str = "Failed to parse iterated card";

/// Immutable settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: TurnPolicy,
    pub retrieval: RetrievalOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            policy: TurnPolicy {
                max_turns: agent.max_turns,
                search_limit: SearchLimit::from_config(agent.max_searches),
                aux_num_results: agent.aux_num_results,
                aux_result_chars: agent.aux_result_chars,
                guidelines: agent
                    .system_prompt
                    .clone()
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| prompts::DEFAULT_GUIDELINES.to_string()),
            },
            retrieval: RetrievalOptions {
                strategy: match agent.strategy {
                    RetrievalStrategy::Direct => Strategy::Direct,
                    RetrievalStrategy::Semantic => Strategy::Semantic,
                },
                num_results: config.search.num_results,
                max_concurrency: config.search.max_concurrency,
                focus_threshold: agent.focus_threshold,
            },
        }
    }
}

/// Drives one question through search terms, retrieval, summary and the
/// agent loop, then keeps the context around for follow-up operations.
pub struct Pipeline {
    config: PipelineConfig,
    llm: ModelCaller,
    retrieval: RetrievalAggregator,
    context: Option<PipelineContext>,
    state: AgentState,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, llm: ModelCaller, collaborators: &Collaborators) -> Self {
        let retrieval = RetrievalAggregator::new(
            collaborators.search.clone(),
            collaborators.embedder.clone(),
            config.retrieval.clone(),
        );
        Self {
            config,
            llm,
            retrieval,
            context: None,
            state: AgentState::Thinking,
        }
    }

    pub fn context(&self) -> Option<&PipelineContext> {
        self.context.as_ref()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Current card, if any.
    pub fn card(&self) -> Option<&Card> {
        self.context.as_ref()?.card.as_ref()
    }

    /// Run every stage for `question`.
    pub async fn run(&mut self, question: &str) -> Result<AgentState, PipelineError> {
        self.start(question);
        self.drive(StageKind::SearchTerms).await
    }

    /// Skip research and go straight to the agent loop.
    pub async fn run_without_research(&mut self, question: &str) -> Result<AgentState, PipelineError> {
        self.start(question);
        self.drive(StageKind::Generate).await
    }

    /// [`run`](Self::run), answering any `ask` actions through `channel`.
    pub async fn run_interactive(
        &mut self,
        question: &str,
        channel: &dyn InputChannel,
    ) -> Result<AgentState, PipelineError> {
        self.run(question).await?;
        self.answer_pending(channel).await
    }

    /// Relay pending agent questions to `channel` until the loop settles.
    /// A blank reply counts as a cancellation.
    pub async fn answer_pending(&mut self, channel: &dyn InputChannel) -> Result<AgentState, PipelineError> {
        while self.state == AgentState::AwaitingInput {
            let question = self
                .context
                .as_ref()
                .map(|ctx| ctx.pending_question.clone())
                .unwrap_or_default();

            match channel.ask(&question).await {
                UserReply::Response(text) if !text.trim().is_empty() => {
                    self.resume_with_user_response(&text).await?;
                }
                _ => {
                    self.cancel_pending_question()?;
                }
            }
        }
        Ok(self.state)
    }

    pub async fn resume_with_user_response(&mut self, text: &str) -> Result<AgentState, PipelineError> {
        let ctx = self.context.as_mut().ok_or(PipelineError::NotStarted)?;
        if !ctx.awaiting_input {
            return Err(PipelineError::NotAwaitingInput);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        info!(turn = ctx.turn + 1, "Resuming agent with user response");
        ctx.accept_response(text);
        self.state = AgentController::new(&self.llm, &self.retrieval, &self.config.policy)
            .run(ctx)
            .await;
        self.validate(StageKind::Generate)?;
        self.settle()
    }

    pub fn cancel_pending_question(&mut self) -> Result<AgentState, PipelineError> {
        let ctx = self.context.as_mut().ok_or(PipelineError::NotStarted)?;
        if !ctx.awaiting_input {
            return Err(PipelineError::NotAwaitingInput);
        }
        info!("User cancelled agent question");
        ctx.refuse(CANCELLED_REASON);
        self.state = AgentState::Refused;
        Ok(self.state)
    }

    /// Re-run the agent loop on the research already gathered, with a fresh
    /// turn budget.
    pub async fn regenerate(&mut self) -> Result<AgentState, PipelineError> {
        if self.context.is_none() {
            return Err(PipelineError::NotStarted);
        }
        info!("Regenerating card");
        self.drive(StageKind::Generate).await
    }

    /// Ask the model to edit the current card. The edited card is appended
    /// to the history and becomes current.
    pub async fn revise(&mut self, instructions: &str) -> Result<Card, PipelineError> {
        let ctx = self.context.as_mut().ok_or(PipelineError::NotStarted)?;
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        let current = ctx.card.as_ref().ok_or(PipelineError::NoCard)?;

        let system = prompts::card_system_prompt(&self.config.policy.guidelines);
        let user = prompts::revise_prompt(&ctx.question, &ctx.summary, current, instructions);
        let raw = self.llm.call(Some(&system), &user, ModelTier::Primary).await?;

        let mut card = match decode_object::<Card>(&raw) {
            Ok(card) if card.is_valid() => card,
            Ok(_) => {
                warn!("Revised card is missing a side");
                return Err(PipelineError::Revision(REVISION_FAILED.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "Revised card did not decode");
                return Err(PipelineError::Revision(REVISION_FAILED.to_string()));
            }
        };
        card.raw_response = raw;
        ctx.install_card(card.clone());
        info!(position = %ctx.history.position(), "Card revised");
        Ok(card)
    }

    pub fn history_back(&mut self) -> Option<&Card> {
        self.context.as_mut()?.history_back()
    }

    pub fn history_forward(&mut self) -> Option<&Card> {
        self.context.as_mut()?.history_forward()
    }

    fn start(&mut self, question: &str) {
        info!(question, "Pipeline started");
        self.context = Some(PipelineContext::new(question));
        self.state = AgentState::Thinking;
    }

    async fn drive(&mut self, mut stage: StageKind) -> Result<AgentState, PipelineError> {
        loop {
            info!(stage = %stage, "Stage started");
            self.execute(stage).await?;
            self.validate(stage)?;
            debug!(stage = %stage, "Stage validated");
            match stage.next() {
                Some(next) => stage = next,
                None => break,
            }
        }
        self.settle()
    }

    async fn execute(&mut self, stage: StageKind) -> Result<(), PipelineError> {
        let Pipeline {
            config,
            llm,
            retrieval,
            context,
            state,
        } = self;
        let ctx = context.as_mut().ok_or(PipelineError::NotStarted)?;

        match stage {
            StageKind::SearchTerms => {
                ctx.search_terms = research::generate_search_terms(llm, &ctx.question).await;
                info!(terms = ?ctx.search_terms, "Search terms ready");
            }
            StageKind::Retrieval => {
                let expander = CreativeTerms::new(llm);
                let found = retrieval
                    .retrieve(&ctx.question, &ctx.search_terms, &expander)
                    .await?;
                info!(
                    terms = found.terms.len(),
                    filtered = found.filtered,
                    chars = found.text.len(),
                    "Research gathered"
                );
                ctx.research = found.text;
            }
            StageKind::Summarize => {
                ctx.summary = research::summarize(llm, &ctx.question, &ctx.research).await?;
                info!(chars = ctx.summary.len(), "Research summarised");
            }
            StageKind::Generate => {
                ctx.begin_attempt();
                *state = AgentController::new(llm, retrieval, &config.policy).run(ctx).await;
            }
        }
        Ok(())
    }

    fn validate(&self, stage: StageKind) -> Result<(), PipelineError> {
        let ctx = self.context.as_ref().ok_or(PipelineError::NotStarted)?;
        let reason = match stage {
            StageKind::SearchTerms if ctx.search_terms.is_empty() => Some("no search terms"),
            StageKind::Retrieval if ctx.research.trim().is_empty() => Some("research text is empty"),
            StageKind::Summarize if ctx.summary.trim().is_empty() => Some("summary is empty"),
            StageKind::Generate
                if self.state == AgentState::Generated
                    && !ctx.card.as_ref().is_some_and(Card::is_valid) =>
            {
                Some("generated card is incomplete")
            }
            _ => None,
        };

        match reason {
            Some(reason) => Err(PipelineError::Validation {
                stage,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn settle(&self) -> Result<AgentState, PipelineError> {
        match self.state {
            AgentState::TurnLimitExceeded => Err(PipelineError::TurnLimitExceeded {
                max_turns: self.config.policy.max_turns,
            }),
            state => Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{DeadEmbedder, DownSearch, ScriptedProvider, StaticSearch, hit};
    use ankigen_core::{Embedder, SearchProvider, SearchResult};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    const TERMS: &str = r#"["docker overview", "docker containers"]"#;
    const SUMMARY: &str = "Docker packages applications into containers.";
    const CARD: &str =
        r#"{"action": "generate", "card": {"front": "What is Docker?", "back": "A container platform."}}"#;

    fn pipeline(
        provider: Arc<ScriptedProvider>,
        search: Arc<dyn SearchProvider>,
        config: PipelineConfig,
    ) -> Pipeline {
        let collaborators = Collaborators {
            provider: provider.clone(),
            search,
            embedder: None,
        };
        Pipeline::new(config, ModelCaller::new(provider, "m"), &collaborators)
    }

    fn docs() -> Arc<StaticSearch> {
        Arc::new(StaticSearch::new(vec![hit("Docker", "Docker is a container platform.")]))
    }

    fn config(max_turns: u32, max_searches: i64) -> PipelineConfig {
        let mut app = AppConfig::default();
        app.agent.max_turns = max_turns;
        app.agent.max_searches = max_searches;
        PipelineConfig::from(&app)
    }

    struct Replies(Mutex<Vec<UserReply>>);

    #[async_trait]
    impl InputChannel for Replies {
        async fn ask(&self, _question: &str) -> UserReply {
            self.0.lock().unwrap().remove(0)
        }
    }

    #[test]
    fn config_maps_app_settings() {
        let mut app = AppConfig::default();
        app.agent.max_searches = -1;
        app.agent.strategy = RetrievalStrategy::Direct;
        app.agent.system_prompt = Some("  ".into());
        let config = PipelineConfig::from(&app);
        assert_eq!(config.policy.search_limit, SearchLimit::Unlimited);
        assert_eq!(config.retrieval.strategy, Strategy::Direct);
        assert_eq!(config.policy.guidelines, prompts::DEFAULT_GUIDELINES);
        assert_eq!(config.policy.max_turns, 3);
    }

    #[tokio::test]
    async fn docker_question_generates_on_first_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS, SUMMARY, CARD]));
        let mut pipeline = pipeline(provider.clone(), docs(), config(3, 3));

        let state = pipeline.run("What is Docker?").await.unwrap();

        assert_eq!(state, AgentState::Generated);
        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.search_terms, vec!["docker overview", "docker containers"]);
        assert_eq!(ctx.summary, SUMMARY);
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.audit_log.len(), 1);
        assert_eq!(ctx.turn, 1);
        assert_eq!(pipeline.card().unwrap().front, "What is Docker?");
        // terms, summary, one agent turn
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn search_cap_rejects_second_search() {
        let search = docs();
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "search", "search_term": "docker volumes"}"#,
            r#"{"action": "search", "search_term": "docker networks"}"#,
            CARD,
        ]));
        let mut pipeline = pipeline(provider, search.clone(), config(3, 1));

        let state = pipeline.run("What is Docker?").await.unwrap();

        assert_eq!(state, AgentState::Generated);
        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.turn, 3);
        assert_eq!(ctx.search_count, 1);
        assert_eq!(ctx.failed_attempts.len(), 1);
        // two stage-2 terms plus one accepted auxiliary search
        assert_eq!(search.calls(), 3);
        assert!(!search.terms().contains(&"docker networks".to_string()));
    }

    #[tokio::test]
    async fn turn_cap_fails_after_exactly_cap_calls() {
        let bogus = r#"{"action": "bogus"}"#;
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS, SUMMARY, bogus, bogus, bogus]));
        let mut pipeline = pipeline(provider.clone(), docs(), config(3, 3));

        let err = pipeline.run("What is Docker?").await.unwrap_err();

        assert!(matches!(err, PipelineError::TurnLimitExceeded { max_turns: 3 }));
        assert!(err.to_string().contains('3'));
        assert_eq!(provider.call_count(), 5);
        assert_eq!(provider.remaining(), 0);
        assert_eq!(pipeline.state(), AgentState::TurnLimitExceeded);
    }

    #[tokio::test]
    async fn dead_embedder_skips_augmentation_and_filtering() {
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS, SUMMARY, CARD]));
        let embedder = Arc::new(DeadEmbedder::new());
        let collaborators = Collaborators {
            provider: provider.clone(),
            search: docs(),
            embedder: Some(embedder.clone() as Arc<dyn Embedder>),
        };
        let mut pipeline = Pipeline::new(
            config(3, 3),
            ModelCaller::new(provider.clone(), "m"),
            &collaborators,
        );

        pipeline.run("What is Docker?").await.unwrap();

        let ctx = pipeline.context().unwrap();
        assert_eq!(embedder.embed_calls.load(Ordering::SeqCst), 0);
        let requests = provider.requests();
        // no creative-term call between terms and summary
        assert_eq!(requests.len(), 3);
        assert!(!requests.iter().any(|r| r.user_prompt.starts_with("/no_think")));
        assert!(requests[1].user_prompt.contains(&ctx.research));
        assert_eq!(ctx.research.matches("Text: Docker is a container platform.").count(), 2);
    }

    #[tokio::test]
    async fn ask_then_resume_continues_at_next_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "ask", "question": "Which variant?"}"#,
            CARD,
        ]));
        let mut pipeline = pipeline(provider.clone(), docs(), config(3, 3));

        let state = pipeline.run("What is Docker?").await.unwrap();
        assert_eq!(state, AgentState::AwaitingInput);
        assert!(pipeline.context().unwrap().awaiting_input);
        assert_eq!(pipeline.context().unwrap().pending_question, "Which variant?");

        assert!(matches!(
            pipeline.resume_with_user_response("   ").await,
            Err(PipelineError::EmptyResponse)
        ));

        let state = pipeline.resume_with_user_response("the x86 one").await.unwrap();
        assert_eq!(state, AgentState::Generated);
        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.turn, 2);
        assert_eq!(ctx.user_responses, vec!["the x86 one"]);
        assert!(!ctx.awaiting_input);
        assert!(provider.requests()[3].user_prompt.contains("- the x86 one\n"));
    }

    #[tokio::test]
    async fn ask_then_cancel_refuses() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "ask", "question": "Which variant?"}"#,
        ]));
        let mut pipeline = pipeline(provider, docs(), config(3, 3));
        pipeline.run("What is Docker?").await.unwrap();

        let state = pipeline.cancel_pending_question().unwrap();

        assert_eq!(state, AgentState::Refused);
        let ctx = pipeline.context().unwrap();
        assert!(ctx.refused);
        assert!(!ctx.awaiting_input);
        assert_eq!(ctx.refusal_reason, CANCELLED_REASON);
        assert!(matches!(
            pipeline.cancel_pending_question(),
            Err(PipelineError::NotAwaitingInput)
        ));
    }

    #[tokio::test]
    async fn interactive_run_relays_questions() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "ask", "question": "Which variant?"}"#,
            r#"{"action": "ask", "question": "Anything else?"}"#,
        ]));
        let mut pipeline = pipeline(provider, docs(), config(3, 3));
        let channel = Replies(Mutex::new(vec![
            UserReply::Response("the x86 one".into()),
            UserReply::Response("".into()),
        ]));

        let state = pipeline.run_interactive("What is Docker?", &channel).await.unwrap();

        assert_eq!(state, AgentState::Refused);
        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.user_responses, vec!["the x86 one"]);
        assert_eq!(ctx.refusal_reason, CANCELLED_REASON);
    }

    #[tokio::test]
    async fn all_searches_failing_aborts_retrieval() {
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS]));
        let mut pipeline = pipeline(provider, Arc::new(DownSearch), config(3, 3));

        let err = pipeline.run("What is Docker?").await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }

    #[tokio::test]
    async fn blank_summary_fails_validation() {
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS, "<think>hmm</think>"]));
        let mut pipeline = pipeline(provider, docs(), config(3, 3));

        let err = pipeline.run("What is Docker?").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation {
                stage: StageKind::Summarize,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn no_web_starts_at_generate() {
        let search = docs();
        let provider = Arc::new(ScriptedProvider::new(vec![CARD]));
        let mut pipeline = pipeline(provider.clone(), search.clone(), config(3, 3));

        let state = pipeline.run_without_research("What is Docker?").await.unwrap();

        assert_eq!(state, AgentState::Generated);
        assert_eq!(search.calls(), 0);
        assert!(!provider.requests()[0].user_prompt.contains("Research context"));
    }

    #[tokio::test]
    async fn regenerate_gets_a_fresh_turn_budget() {
        let bogus = r#"{"action": "bogus"}"#;
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "search", "search_term": "docker volumes"}"#,
            r#"{"action": "refuse", "reason": "too vague"}"#,
            bogus,
            CARD,
        ]));
        let mut pipeline = pipeline(provider, docs(), config(2, 1));

        assert_eq!(pipeline.run("What is Docker?").await.unwrap(), AgentState::Refused);
        assert_eq!(pipeline.regenerate().await.unwrap(), AgentState::Generated);

        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.turn, 4);
        assert_eq!(ctx.attempt_start_turn, 2);
        assert_eq!(ctx.audit_log.len(), 4);
        assert_eq!(ctx.search_count, 1);
        assert!(!ctx.refused);
        assert!(ctx.refusal_reason.is_empty());
    }

    #[tokio::test]
    async fn revise_appends_and_navigation_moves_current_card() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            CARD,
            r#"<drafts>shorter</drafts>{"front": "Docker?", "back": "Containers."}"#,
            "no card here",
        ]));
        let mut pipeline = pipeline(provider.clone(), docs(), config(3, 3));
        assert!(matches!(pipeline.revise("x").await, Err(PipelineError::NotStarted)));

        pipeline.run_without_research("What is Docker?").await.unwrap();
        let revised = pipeline.revise("make it shorter").await.unwrap();
        assert_eq!(revised.front, "Docker?");
        assert!(
            provider.requests()[1]
                .user_prompt
                .ends_with("according to these instructions: make it shorter")
        );

        let err = pipeline.revise("again").await.unwrap_err();
        assert_eq!(err.to_string(), REVISION_FAILED);
        assert_eq!(pipeline.context().unwrap().history.len(), 2);

        assert_eq!(pipeline.history_back().unwrap().front, "What is Docker?");
        assert!(pipeline.history_back().is_none());
        assert_eq!(pipeline.card().unwrap().front, "What is Docker?");
        assert_eq!(pipeline.history_forward().unwrap().front, "Docker?");
        assert!(pipeline.history_forward().is_none());
    }

    #[tokio::test]
    async fn blank_hits_fail_retrieval_validation() {
        let search = Arc::new(StaticSearch::new(vec![SearchResult::new("", "https://x", "")]));
        let provider = Arc::new(ScriptedProvider::new(vec![TERMS]));
        let mut pipeline = pipeline(provider.clone(), search, config(3, 3));

        let err = pipeline.run("What is Docker?").await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Validation {
                stage: StageKind::Retrieval,
                ..
            }
        ));
        assert!(pipeline.context().unwrap().research.trim().is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn resume_validates_the_generated_card() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            TERMS,
            SUMMARY,
            r#"{"action": "ask", "question": "Which variant?"}"#,
            r#"{"action": "generate", "card": {"front": "What is Docker?", "back": ""}}"#,
            CARD,
        ]));
        let mut pipeline = pipeline(provider, docs(), config(3, 3));
        pipeline.run("What is Docker?").await.unwrap();

        let state = pipeline.resume_with_user_response("the x86 one").await.unwrap();

        assert_eq!(state, AgentState::Generated);
        let ctx = pipeline.context().unwrap();
        assert_eq!(ctx.turn, 3);
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.failed_attempts.len(), 1);
        assert!(pipeline.card().unwrap().is_valid());

        pipeline.context.as_mut().unwrap().card.as_mut().unwrap().back.clear();
        assert!(matches!(
            pipeline.validate(StageKind::Generate),
            Err(PipelineError::Validation {
                stage: StageKind::Generate,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn resume_without_question_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new(vec![CARD]));
        let mut pipeline = pipeline(provider, docs(), config(3, 3));
        assert!(matches!(
            pipeline.resume_with_user_response("hi").await,
            Err(PipelineError::NotStarted)
        ));
        pipeline.run_without_research("q").await.unwrap();
        assert!(matches!(
            pipeline.resume_with_user_response("hi").await,
            Err(PipelineError::NotAwaitingInput)
        ));
    }
}
