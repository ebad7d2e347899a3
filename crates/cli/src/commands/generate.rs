//! `ankigen generate`: research a question and print the card.

use std::io::Read;

use ankigen_agent::{ModelCaller, Pipeline, PipelineConfig, PipelineError};
use ankigen_config::{AppConfig, RetrievalStrategy};
use ankigen_core::card::{Card, DebugTurn};
use ankigen_core::{AgentState, Collaborators};
use clap::Args;
use tracing::{info, warn};

use crate::stdin_channel::StdinChannel;

#[derive(Debug, Default, Args)]
pub struct GenerateArgs {
    /// The question to turn into a card (read from stdin when omitted)
    pub question: Vec<String>,

    /// Use the fast model for every call
    #[arg(short, long)]
    pub fast: bool,

    /// Skip web research and go straight to the agent
    #[arg(long)]
    pub no_web: bool,

    /// Plain per-term retrieval without creative terms or filtering
    #[arg(long)]
    pub direct: bool,

    /// Print the card as JSON
    #[arg(short, long)]
    pub raw: bool,

    /// Maximum tokens per model reply
    #[arg(short, long)]
    pub tokens: Option<u32>,

    /// Agent turns per attempt
    #[arg(short = 'm', long)]
    pub max_turns: Option<u32>,

    /// Auxiliary searches the agent may run (-1 for unlimited)
    #[arg(long, allow_negative_numbers = true)]
    pub max_searches: Option<i64>,

    /// Similarity a paragraph needs to survive the semantic filter
    #[arg(long)]
    pub focus_threshold: Option<f32>,

    /// Edit the generated card with these instructions
    #[arg(long)]
    pub revise: Option<String>,
}

impl GenerateArgs {
    /// Fold command-line overrides into the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(tokens) = self.tokens {
            config.provider.max_tokens = tokens;
        }
        if let Some(turns) = self.max_turns {
            config.agent.max_turns = turns;
        }
        if let Some(searches) = self.max_searches {
            config.agent.max_searches = searches;
        }
        if let Some(threshold) = self.focus_threshold {
            config.agent.focus_threshold = threshold;
        }
        if self.direct {
            config.agent.strategy = RetrievalStrategy::Direct;
        }
    }
}

pub async fn run(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    args.apply(&mut config);
    config.validate()?;

    let question = read_question(&args.question)?;

    if config.provider.api_key.is_none() {
        warn!("No API key set; requests go out unauthenticated");
    }

    let collaborators = ankigen_providers::build_from_config(&config);
    let llm = model_caller(&config, &collaborators, args.fast).await?;
    let mut pipeline = Pipeline::new(PipelineConfig::from(&config), llm, &collaborators);

    let outcome = if args.no_web {
        match pipeline.run_without_research(&question).await {
            Ok(_) => pipeline.answer_pending(&StdinChannel).await,
            Err(e) => Err(e),
        }
    } else {
        pipeline.run_interactive(&question, &StdinChannel).await
    };

    let state = match outcome {
        Ok(state) => state,
        Err(e @ PipelineError::TurnLimitExceeded { .. }) => {
            if let Some(ctx) = pipeline.context() {
                eprintln!("{}", format_audit_log(&ctx.audit_log));
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    match state {
        AgentState::Generated => {}
        AgentState::Refused => {
            let reason = pipeline
                .context()
                .map(|ctx| ctx.refusal_reason.clone())
                .unwrap_or_default();
            return Err(format!("Card refused: {reason}").into());
        }
        other => return Err(format!("Agent stopped in state {other:?}").into()),
    }

    if let Some(instructions) = &args.revise {
        pipeline.revise(instructions).await?;
    }

    let card = pipeline.card().ok_or("No card was produced")?;
    println!("{}", render_card(card, args.raw)?);
    Ok(())
}

/// Resolve the primary model (auto-detected when unset) and build the caller.
async fn model_caller(
    config: &AppConfig,
    collaborators: &Collaborators,
    fast: bool,
) -> Result<ModelCaller, Box<dyn std::error::Error>> {
    let model =
        ankigen_providers::resolve_model(collaborators.provider.as_ref(), &config.provider.model)
            .await?;
    let fast_model = match config.fast_model() {
        m if m.trim().is_empty() => model.clone(),
        m => m.to_string(),
    };
    info!(model = %model, fast_model = %fast_model, "Models selected");

    Ok(ModelCaller::new(collaborators.provider.clone(), model)
        .with_fast_model(fast_model)
        .with_temperature(config.provider.temperature)
        .with_max_tokens(config.provider.max_tokens)
        .with_fast_mode(fast))
}

fn read_question(words: &[String]) -> Result<String, Box<dyn std::error::Error>> {
    let question = if words.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
    } else {
        words.join(" ")
    };

    let question = question.trim().to_string();
    if question.is_empty() {
        return Err("No question given (pass it as arguments or on stdin)".into());
    }
    Ok(question)
}

pub fn render_card(card: &Card, raw: bool) -> Result<String, serde_json::Error> {
    if raw {
        serde_json::to_string_pretty(card)
    } else {
        Ok(format!("Front: {}\n\nBack: {}", card.front, card.back))
    }
}

/// Human-readable dump of every agent turn, for diagnosing a failed run.
pub fn format_audit_log(turns: &[DebugTurn]) -> String {
    if turns.is_empty() {
        return "(no agent turns recorded)".to_string();
    }

    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!("=== Turn {} ===\n", turn.turn));
        if !turn.prompt.is_empty() {
            out.push_str(&format!("PROMPT:\n{}\n\n", turn.prompt));
        }
        if !turn.raw_response.is_empty() {
            out.push_str(&format!("RAW RESPONSE:\n{}\n\n", turn.raw_response));
        }
        if let Some(parsed) = &turn.parsed {
            out.push_str(&format!("PARSED: {}\n", parsed.describe()));
        }
        if let Some(error) = &turn.error {
            out.push_str(&format!("ERROR: {error}\n"));
        }
        out.push('\n');
    }
    out
}
