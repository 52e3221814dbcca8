//! Chat responses and scoring wire types

use serde::{Deserialize, Serialize};

use super::conversation::HistoryEntry;

/// Result of one chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated reply, unmodified
    pub reply: String,
    /// Context the reply was grounded on
    pub context: String,
}

/// Body accepted by the scoring route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Current user turn
    pub chat_input: String,
    /// Prior turns, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<HistoryEntry>,
    /// Send the answer as server-sent events
    #[serde(default)]
    pub stream: bool,
}

impl ScoreRequest {
    pub fn new(chat_input: impl Into<String>) -> Self {
        Self {
            chat_input: chat_input.into(),
            chat_history: Vec::new(),
            stream: false,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}
