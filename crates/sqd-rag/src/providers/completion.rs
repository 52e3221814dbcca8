//! Completion provider trait for templated chat completions

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::generation::PromptTemplate;
use crate::types::ConversationTurn;

/// A templated completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Template to render
    pub template: PromptTemplate,
    /// Template variables
    pub variables: BTreeMap<String, String>,
    /// Conversation turns rendered by templates that use history
    pub history: Vec<ConversationTurn>,
    /// Output length cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(template: PromptTemplate, max_tokens: u32, temperature: f32) -> Self {
        Self {
            template,
            variables: BTreeMap::new(),
            history: Vec::new(),
            max_tokens,
            temperature,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_history(mut self, history: &[ConversationTurn]) -> Self {
        self.history = history.to_vec();
        self
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

/// Trait for language-model completions
///
/// Implementations:
/// - `AzureOpenAiClient`: Azure OpenAI chat deployment
/// - `MockCompletion`: scripted replies for tests
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Render the request's template and return the generated text, unmodified
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model or deployment in use
    fn model(&self) -> &str;
}
