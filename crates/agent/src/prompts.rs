//! Prompt templates for every model call the pipeline makes.

use ankigen_core::PipelineContext;
use ankigen_core::card::Card;

/// Card-writing guidance used when no custom system prompt is configured.
pub const DEFAULT_GUIDELINES: &str = "You write spaced-repetition flashcards.

A good card:
- tests exactly one idea, phrased as a clear question on the front
- has a short, precise answer on the back, usually one to three sentences
- is understandable without the surrounding conversation
- avoids yes/no questions and lists longer than three items
- states facts that are correct and, where it matters, current";

const CARD_FORMAT: &str = "\n\nIMPORTANT:
1. Place all drafts and working inside <drafts></drafts> tags.
2. Return your final response as valid JSON with this exact format:
{\"front\": \"question text here\", \"back\": \"answer text here\"}

Do not include any other text outside the drafts tags and JSON object.";

const AGENT_ACTIONS: &str = "\n\nYou are an agentic card generator. You must respond with ONE of these JSON actions:

1. Generate a card (when you have enough information):
{\"action\": \"generate\", \"card\": {\"front\": \"question text\", \"back\": \"answer text\"}}

2. Refuse (when the request is impossible, nonsensical, or wrong):
{\"action\": \"refuse\", \"reason\": \"explanation of why you cannot create a card\"}

3. Search for more information ({remaining} searches remaining):
{\"action\": \"search\", \"search_term\": \"your search query\"}

4. Ask the user for clarification:
{\"action\": \"ask\", \"question\": \"your question to the user\"}

IMPORTANT:
- You MUST respond with exactly one JSON object, no other text
- If you have enough context to make a good card, use \"generate\"
- If the question is unclear or ambiguous, use \"ask\"
- If you need more specific information, use \"search\"
- Only use \"refuse\" if the request fundamentally cannot be answered";

/// Guidelines plus the strict card output format.
pub fn card_system_prompt(guidelines: &str) -> String {
    format!("{guidelines}{CARD_FORMAT}")
}

/// Card system prompt extended with the four agent actions.
pub fn agent_system_prompt(guidelines: &str, searches_remaining: &str) -> String {
    format!(
        "{}{}",
        card_system_prompt(guidelines),
        AGENT_ACTIONS.replace("{remaining}", searches_remaining)
    )
}

pub fn search_terms_prompt(question: &str) -> String {
    format!(
        "Generate 1-5 web search queries to find accurate information for answering this question. \
         Return ONLY a JSON array of strings, nothing else.\n\n\
         Question: {question}\n\n\
         Example output: [\"query 1\", \"query 2\", \"query 3\"]"
    )
}

/// Lateral-thinking queries; sent with reasoning disabled.
pub fn creative_terms_prompt(question: &str) -> String {
    format!(
        "/no_think Generate 2-3 creative, lateral-thinking web search queries to find unexpected \
         but relevant information for this question. Think of related concepts, analogies, or \
         alternative framings. Return ONLY a JSON array of strings.\n\n\
         Question: {question}\n\n\
         Example: For \"Why is the sky blue?\" you might generate:\n\
         [\"Rayleigh scattering atmosphere\", \"wavelength light dispersion physics\", \"why sunset orange red\"]"
    )
}

pub fn summary_prompt(question: &str, research: &str) -> String {
    format!(
        "Summarise these search results to help answer the following question. \
         Keep only the most relevant information.\n\n\
         Question: {question}\n\n\
         Search Results:\n{research}\n\n\
         Provide a concise summary (300-500 words) of the key information relevant to answering the question."
    )
}

/// The per-turn agent prompt: question, research so far, and the user's
/// answers to earlier `ask` actions.
pub fn agent_user_prompt(ctx: &PipelineContext) -> String {
    let mut prompt = format!("Question: {}\n\n", ctx.question);

    if !ctx.summary.is_empty() {
        prompt.push_str(&format!("Research context:\n{}\n\n", ctx.summary));
    }

    if !ctx.user_responses.is_empty() {
        prompt.push_str("User responses to your questions:\n");
        for response in &ctx.user_responses {
            prompt.push_str(&format!("- {response}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str("Decide your next action.");
    prompt
}

pub fn revise_prompt(question: &str, summary: &str, card: &Card, instructions: &str) -> String {
    let mut prompt = format!("Original question: {question}\n\n");
    if !summary.is_empty() {
        prompt.push_str(&format!("Research context:\n{summary}\n\n"));
    }
    prompt.push_str(&format!(
        "Current card:\nFront: {}\nBack: {}\n\n",
        card.front, card.back
    ));
    prompt.push_str(&format!(
        "Please modify this card according to these instructions: {instructions}"
    ));
    prompt
}
