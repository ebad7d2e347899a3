//! Agent loop outcome and budget types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the agent loop stopped.
///
/// `Thinking` is the in-loop state; every call into the loop returns one of
/// the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Thinking,
    /// A valid card was installed.
    Generated,
    /// The model refused, or the user cancelled a question.
    Refused,
    /// Suspended on an `ask`; resume or cancel to continue.
    AwaitingInput,
    TurnLimitExceeded,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Generated | Self::Refused | Self::TurnLimitExceeded
        )
    }
}

/// Cap on auxiliary searches during one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Limited(u32),
    Unlimited,
}

impl SearchLimit {
    /// Map the config convention: any negative value means unlimited.
    pub fn from_config(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Whether `used` searches already exhaust the budget.
    pub fn is_exhausted(self, used: u32) -> bool {
        match self {
            Self::Limited(max) => used >= max,
            Self::Unlimited => false,
        }
    }

    pub fn remaining(self, used: u32) -> Option<u32> {
        match self {
            Self::Limited(max) => Some(max.saturating_sub(used)),
            Self::Unlimited => None,
        }
    }

    /// Human-readable remaining budget, e.g. `"2"` or `"unlimited"`.
    pub fn describe_remaining(self, used: u32) -> String {
        match self.remaining(used) {
            Some(left) => left.to_string(),
            None => "unlimited".to_string(),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        Self::Limited(3)
    }
}

impl fmt::Display for SearchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{max}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}
