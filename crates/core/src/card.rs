//! Card, agent decision and audit record types.
//!
//! These are the value objects the agent loop produces and records:
//! the model answers with an [`AgentResponse`], a successful `generate`
//! carries a [`Card`], and every turn leaves a [`DebugTurn`] behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A question/answer flashcard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub front: String,

    #[serde(default)]
    pub back: String,

    /// Why the card could not be produced, if it could not.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// The model output this card was decoded from. Audit only.
    #[serde(skip)]
    pub raw_response: String,
}

impl Card {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            ..Self::default()
        }
    }

    /// Both sides present and no error.
    pub fn is_valid(&self) -> bool {
        self.has_content() && self.error.is_empty()
    }

    /// Both sides non-blank, ignoring `error`.
    pub fn has_content(&self) -> bool {
        !self.front.trim().is_empty() && !self.back.trim().is_empty()
    }
}

/// The decoded decision of one agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireResponse", into = "WireResponse")]
pub enum AgentResponse {
    Generate(Card),
    Refuse { reason: String },
    Search { term: String },
    Ask { question: String },
    /// Any action tag outside the four known ones.
    Unknown(String),
}

impl AgentResponse {
    /// The action tag as the model wrote it.
    pub fn action(&self) -> &str {
        match self {
            Self::Generate(_) => "generate",
            Self::Refuse { .. } => "refuse",
            Self::Search { .. } => "search",
            Self::Ask { .. } => "ask",
            Self::Unknown(action) => action,
        }
    }

    /// One-line description for audit output, e.g. `action=search, term="rust"`.
    pub fn describe(&self) -> String {
        match self {
            Self::Search { term } => format!("action=search, term={term:?}"),
            Self::Ask { question } => format!("action=ask, question={question:?}"),
            Self::Refuse { reason } => format!("action=refuse, reason={reason:?}"),
            other => format!("action={}", other.action()),
        }
    }
}

/// JSON shape the model is instructed to emit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireResponse {
    action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    question: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    search_term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    card: Option<Card>,
}

impl From<WireResponse> for AgentResponse {
    fn from(wire: WireResponse) -> Self {
        match wire.action.as_str() {
            "generate" => Self::Generate(wire.card.unwrap_or_default()),
            "refuse" => Self::Refuse {
                reason: wire.reason,
            },
            "search" => Self::Search {
                term: wire.search_term,
            },
            "ask" => Self::Ask {
                question: wire.question,
            },
            _ => Self::Unknown(wire.action),
        }
    }
}

impl From<AgentResponse> for WireResponse {
    fn from(response: AgentResponse) -> Self {
        let action = response.action().to_string();
        match response {
            AgentResponse::Generate(card) => Self {
                action,
                card: Some(card),
                ..Self::default()
            },
            AgentResponse::Refuse { reason } => Self {
                action,
                reason,
                ..Self::default()
            },
            AgentResponse::Search { term } => Self {
                action,
                search_term: term,
                ..Self::default()
            },
            AgentResponse::Ask { question } => Self {
                action,
                question,
                ..Self::default()
            },
            AgentResponse::Unknown(_) => Self {
                action,
                ..Self::default()
            },
        }
    }
}

/// Audit record of one agent turn. Appended once, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugTurn {
    pub turn: u32,
    pub prompt: String,
    pub raw_response: String,
    pub parsed: Option<AgentResponse>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DebugTurn {
    pub fn new(turn: u32, prompt: impl Into<String>) -> Self {
        Self {
            turn,
            prompt: prompt.into(),
            raw_response: String::new(),
            parsed: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_validity_trims_whitespace() {
        assert!(Card::new("What is Docker?", "A container runtime").is_valid());
        assert!(!Card::new("   ", "A container runtime").is_valid());
        assert!(!Card::new("Q", "\n\t").is_valid());
    }

    #[test]
    fn card_with_error_is_invalid() {
        let mut card = Card::new("Q", "A");
        card.error = "Failed to parse response".into();
        assert!(card.has_content());
        assert!(!card.is_valid());
    }

    #[test]
    fn raw_response_is_never_serialized() {
        let mut card = Card::new("Q", "A");
        card.raw_response = "{\"front\": \"Q\"}".into();
        let json = serde_json::to_string(&card).unwrap();
        assert!(!json.contains("raw_response"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn decodes_each_action() {
        let generate: AgentResponse = serde_json::from_str(
            r#"{"action": "generate", "card": {"front": "Q", "back": "A"}}"#,
        )
        .unwrap();
        assert_eq!(generate, AgentResponse::Generate(Card::new("Q", "A")));

        let search: AgentResponse =
            serde_json::from_str(r#"{"action": "search", "search_term": "docker layers"}"#)
                .unwrap();
        assert_eq!(
            search,
            AgentResponse::Search {
                term: "docker layers".into()
            }
        );

        let ask: AgentResponse =
            serde_json::from_str(r#"{"action": "ask", "question": "Which variant?"}"#).unwrap();
        assert_eq!(ask.action(), "ask");

        let refuse: AgentResponse =
            serde_json::from_str(r#"{"action": "refuse", "reason": "nonsense"}"#).unwrap();
        assert_eq!(
            refuse,
            AgentResponse::Refuse {
                reason: "nonsense".into()
            }
        );
    }

    #[test]
    fn unrecognized_action_is_kept_verbatim() {
        let bogus: AgentResponse = serde_json::from_str(r#"{"action": "bogus"}"#).unwrap();
        assert_eq!(bogus, AgentResponse::Unknown("bogus".into()));
        assert_eq!(bogus.describe(), "action=bogus");
    }

    #[test]
    fn generate_without_card_decodes_as_blank_card() {
        let response: AgentResponse = serde_json::from_str(r#"{"action": "generate"}"#).unwrap();
        match response {
            AgentResponse::Generate(card) => assert!(!card.has_content()),
            other => panic!("expected generate, got {other:?}"),
        }
    }

    #[test]
    fn missing_action_field_fails_to_decode() {
        assert!(serde_json::from_str::<AgentResponse>(r#"{"front": "Q"}"#).is_err());
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let json = serde_json::to_value(AgentResponse::Search {
            term: "x86 docker".into(),
        })
        .unwrap();
        assert_eq!(json["action"], "search");
        assert_eq!(json["search_term"], "x86 docker");
        assert!(json.get("card").is_none());
    }
}
