//! Conversation turns and chat history

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::input(format!("Unknown conversation role: '{}'", other))),
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Build a turn from an untyped role string
    pub fn parse(role: &str, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            role: role.parse()?,
            content: content.into(),
        })
    }
}

/// Chronologically ordered conversation turns
pub type ChatHistory = Vec<ConversationTurn>;

/// Reject histories that cannot be rendered into a prompt
pub fn validate_history(history: &[ConversationTurn]) -> Result<()> {
    for (i, turn) in history.iter().enumerate() {
        if turn.content.trim().is_empty() {
            return Err(Error::input(format!(
                "History turn {} ({}) has empty content",
                i, turn.role
            )));
        }
    }
    Ok(())
}

/// History entry as accepted on the wire
///
/// Accepts plain `{"role", "content"}` turns and the prompt-flow shape
/// `{"inputs": {"chat_input"}, "outputs": {"reply"}}`, which expands to a user turn
/// followed by an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    Turn(ConversationTurn),
    Exchange {
        inputs: ExchangeInputs,
        outputs: ExchangeOutputs,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeInputs {
    pub chat_input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOutputs {
    pub reply: String,
}

/// Flatten wire entries into ordered turns
pub fn flatten_history(entries: Vec<HistoryEntry>) -> ChatHistory {
    let mut turns = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        match entry {
            HistoryEntry::Turn(turn) => turns.push(turn),
            HistoryEntry::Exchange { inputs, outputs } => {
                turns.push(ConversationTurn::user(inputs.chat_input));
                turns.push(ConversationTurn::assistant(outputs.reply));
            }
        }
    }
    turns
}
