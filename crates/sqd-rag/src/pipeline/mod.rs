//! Chat pipeline: query formation, retrieval, context assembly and reply generation
//!
//! Every turn runs the four stages strictly in order. The pipeline holds no per-request
//! state, so one instance can serve concurrent turns.

mod query;
mod retrieval;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{AppConfig, GenerationConfig};
use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::generation::{assemble_context, PromptTemplate};
use crate::providers::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, VectorSearchProvider,
};
use crate::types::conversation::validate_history;
use crate::types::{ChatResponse, ConversationTurn};

/// Orchestrates the external capabilities for one conversational turn at a time
#[derive(Clone)]
pub struct ChatPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn VectorSearchProvider>,
    completion: Arc<dyn CompletionProvider>,
    generation: GenerationConfig,
    top_k: usize,
    vector_field: String,
    select: Vec<String>,
    call_timeout: Duration,
}

impl ChatPipeline {
    /// Create a pipeline over the given providers
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn VectorSearchProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            embedder,
            search,
            completion,
            generation: config.generation.clone(),
            top_k: config.retrieval.top_k,
            vector_field: config.search.vector_field.clone(),
            select: vec![
                config.search.id_field.clone(),
                config.search.content_field.clone(),
            ],
            call_timeout: config.network.request_timeout(),
        }
    }

    /// Number of documents retrieved per turn
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run one turn to completion
    pub async fn handle_turn(
        &self,
        user_input: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatResponse> {
        self.handle_turn_with_cancel(user_input, history, &CancellationToken::new())
            .await
    }

    /// Run one turn, aborting the in-flight call as soon as `cancel` fires
    ///
    /// A cancelled turn returns `Error::Cancelled` for the stage that was running and never
    /// a partial response.
    pub async fn handle_turn_with_cancel(
        &self,
        user_input: &str,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        if user_input.trim().is_empty() {
            return Err(Error::input("chat_input must not be empty"));
        }
        validate_history(history)?;

        let start = Instant::now();

        let search_query = self.form_search_query(user_input, history, cancel).await?;
        let documents = self.retrieve(&search_query, self.top_k, cancel).await?;
        let context = assemble_context(&documents);
        let reply = self
            .generate_reply(user_input, history, &context, cancel)
            .await?;

        tracing::info!(
            "Turn completed in {}ms ({} history turns, {} documents)",
            start.elapsed().as_millis(),
            history.len(),
            documents.len()
        );

        Ok(ChatResponse { reply, context })
    }

    /// Produce the grounded reply for a turn
    pub async fn generate_reply(
        &self,
        user_input: &str,
        history: &[ConversationTurn],
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = CompletionRequest::new(
            PromptTemplate::Chat,
            self.generation.reply_max_tokens,
            self.generation.temperature,
        )
        .with_variable("chat_input", user_input)
        .with_variable("documents", context)
        .with_history(history);

        self.call(
            Stage::Completion,
            self.completion.name(),
            cancel,
            self.completion.complete(&request),
        )
        .await
    }

    /// Run one external call inside its own span, bounded by the call timeout and `cancel`
    async fn call<T, F>(
        &self,
        stage: Stage,
        provider: &str,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!("upstream_call", stage = %stage, provider = %provider);
        let deadline = self.call_timeout;

        async move {
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled { stage }),
                outcome = tokio::time::timeout(deadline, fut) => match outcome {
                    Ok(result) => result.map_err(|e| e.at_stage(stage)),
                    Err(_) => Err(Error::upstream(
                        stage,
                        UpstreamKind::Timeout,
                        format!("No response within {}ms", deadline.as_millis()),
                    )),
                },
            };

            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::debug!(elapsed_ms, "{} call completed", stage),
                Err(e) => tracing::warn!(elapsed_ms, "{} call failed: {}", stage, e),
            }
            result
        }
        .instrument(span)
        .await
    }
}
