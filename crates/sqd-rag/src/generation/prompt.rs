//! Prompt templates for intent extraction, grounded replies and evaluation judges

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::ConversationTurn;

/// A chat message in the shape completion APIs expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Prompt templates known to the completion capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    /// Rewrite the latest turn plus history into a standalone search query
    QueryIntent,
    /// Grounded reply over retrieved documents
    Chat,
    /// Judge: logical flow of an answer
    Coherence,
    /// Judge: language quality of an answer
    Fluency,
    /// Judge: answer supported by context
    Groundedness,
    /// Judge: answer addresses the question using the context
    Relevance,
    /// Judge: answer equivalent to the ground truth
    Similarity,
}

const QUERY_INTENT_SYSTEM: &str = r#"You are an AI assistant that turns a conversation into a search query.
Read the chat history and the latest user message, then write ONE concise search query that captures what the user is asking for right now.
Resolve pronouns and references using the history. Do not answer the question.
Return only the search query text, with no quotes and no explanation."#;

const CHAT_SYSTEM: &str = r#"You are an AI assistant that helps people find information about SQD.
Answer ONLY with facts found in the documents below. Be brief and to the point.
If the documents do not contain the answer, say you don't know.
Each document starts with a line ">>> From: <id>"; mention the id when you use a document.

# Documents
{{documents}}"#;

const JUDGE_SCALE: &str = r#"Respond with a single integer from 1 to 5 and nothing else."#;

const COHERENCE_USER: &str = r#"Rate the COHERENCE of the answer: how well its sentences fit together and read naturally as a whole.
1 = incoherent, 5 = perfectly coherent.

question: {{question}}
answer: {{answer}}"#;

const FLUENCY_USER: &str = r#"Rate the FLUENCY of the answer: grammar, vocabulary and sentence structure.
1 = not fluent at all, 5 = perfectly fluent.

question: {{question}}
answer: {{answer}}"#;

const GROUNDEDNESS_USER: &str = r#"Rate how well the answer is GROUNDED in the context: every claim must be supported by the context.
1 = not supported at all, 5 = fully supported.

context: {{context}}
answer: {{answer}}"#;

const RELEVANCE_USER: &str = r#"Rate the RELEVANCE of the answer: does it address the main aspects of the question using the context?
1 = not relevant, 5 = completely relevant.

context: {{context}}
question: {{question}}
answer: {{answer}}"#;

const SIMILARITY_USER: &str = r#"Rate the SIMILARITY between the answer and the ground truth for the given question.
1 = not at all similar, 5 = completely equivalent.

question: {{question}}
ground truth: {{ground_truth}}
answer: {{answer}}"#;

impl PromptTemplate {
    /// Template identifier
    pub fn id(&self) -> &'static str {
        match self {
            PromptTemplate::QueryIntent => "queryIntent",
            PromptTemplate::Chat => "chat",
            PromptTemplate::Coherence => "coherence",
            PromptTemplate::Fluency => "fluency",
            PromptTemplate::Groundedness => "groundedness",
            PromptTemplate::Relevance => "relevance",
            PromptTemplate::Similarity => "similarity",
        }
    }

    /// Variables that must be supplied to render this template
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self {
            PromptTemplate::QueryIntent => &["query"],
            PromptTemplate::Chat => &["chat_input", "documents"],
            PromptTemplate::Coherence | PromptTemplate::Fluency => &["question", "answer"],
            PromptTemplate::Groundedness => &["answer", "context"],
            PromptTemplate::Relevance => &["question", "answer", "context"],
            PromptTemplate::Similarity => &["question", "answer", "ground_truth"],
        }
    }

    /// Whether the conversation history is rendered between system and user messages
    pub fn uses_history(&self) -> bool {
        matches!(self, PromptTemplate::QueryIntent | PromptTemplate::Chat)
    }

    fn system_text(&self) -> &'static str {
        match self {
            PromptTemplate::QueryIntent => QUERY_INTENT_SYSTEM,
            PromptTemplate::Chat => CHAT_SYSTEM,
            _ => JUDGE_SCALE,
        }
    }

    fn user_text(&self) -> &'static str {
        match self {
            PromptTemplate::QueryIntent => "{{query}}",
            PromptTemplate::Chat => "{{chat_input}}",
            PromptTemplate::Coherence => COHERENCE_USER,
            PromptTemplate::Fluency => FLUENCY_USER,
            PromptTemplate::Groundedness => GROUNDEDNESS_USER,
            PromptTemplate::Relevance => RELEVANCE_USER,
            PromptTemplate::Similarity => SIMILARITY_USER,
        }
    }

    /// Render into chat messages: system, history (when used), user
    ///
    /// Fails with an input error when a required variable is missing.
    pub fn render(
        &self,
        variables: &BTreeMap<String, String>,
        history: &[ConversationTurn],
    ) -> Result<Vec<ChatMessage>> {
        for name in self.required_variables() {
            if !variables.contains_key(*name) {
                return Err(Error::input(format!(
                    "Template '{}' is missing variable '{}'",
                    self.id(),
                    name
                )));
            }
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(substitute(self.system_text(), variables)));
        if self.uses_history() {
            messages.extend(history.iter().map(ChatMessage::from));
        }
        messages.push(ChatMessage::user(substitute(self.user_text(), variables)));
        Ok(messages)
    }
}

/// Replace `{{name}}` placeholders in a single pass
///
/// Values are inserted verbatim; placeholders appearing inside inserted values are not expanded.
fn substitute(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_chat_render_places_history_between_system_and_user() {
        let history = vec![
            ConversationTurn::user("who is the CEO?"),
            ConversationTurn::assistant("Jane Doe."),
        ];
        let messages = PromptTemplate::Chat
            .render(
                &vars(&[("chat_input", "since when?"), ("documents", ">>> From: doc1\nx")]),
                &history,
            )
            .unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains(">>> From: doc1\nx"));
        assert_eq!(messages[1], ChatMessage { role: "user".into(), content: "who is the CEO?".into() });
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3], ChatMessage::user("since when?"));
    }

    #[test]
    fn test_empty_documents_still_renders() {
        let messages = PromptTemplate::Chat
            .render(&vars(&[("chat_input", "hi"), ("documents", "")]), &[])
            .unwrap();
        assert!(messages[0].content.ends_with("# Documents\n"));
    }

    #[test]
    fn test_missing_variable_is_input_error() {
        let err = PromptTemplate::Relevance
            .render(&vars(&[("question", "q"), ("answer", "a")]), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Input(ref m) if m.contains("context")));
    }

    #[test]
    fn test_judges_ignore_history() {
        let history = vec![ConversationTurn::user("earlier")];
        let messages = PromptTemplate::Coherence
            .render(&vars(&[("question", "q"), ("answer", "a")]), &history)
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_substitute_is_single_pass() {
        let out = substitute("a {{x}} b {{y}} {{unknown}}", &vars(&[("x", "{{y}}"), ("y", "2")]));
        assert_eq!(out, "a {{y}} b 2 {{unknown}}");
    }
}
