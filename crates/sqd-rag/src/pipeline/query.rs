//! Query formation

use tokio_util::sync::CancellationToken;

use super::ChatPipeline;
use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::generation::PromptTemplate;
use crate::providers::CompletionRequest;
use crate::types::ConversationTurn;

impl ChatPipeline {
    /// Derive the search query for a turn
    ///
    /// Without history the user input is the query and no model is called. With history the
    /// intent template rewrites the turn and its output is used as-is; its failures propagate
    /// unchanged.
    pub async fn form_search_query(
        &self,
        user_input: &str,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<String> {
        if history.is_empty() {
            return Ok(user_input.to_string());
        }

        let request = CompletionRequest::new(
            PromptTemplate::QueryIntent,
            self.generation.intent_max_tokens,
            self.generation.intent_temperature,
        )
        .with_variable("query", user_input)
        .with_history(history);

        let intent = self
            .call(
                Stage::Completion,
                self.completion.name(),
                cancel,
                self.completion.complete(&request),
            )
            .await?;

        if intent.trim().is_empty() {
            return Err(Error::upstream(
                Stage::Completion,
                UpstreamKind::MalformedResponse,
                "Intent extraction returned no query",
            ));
        }

        tracing::debug!("Search query: {:?}", intent);
        Ok(intent)
    }
}
