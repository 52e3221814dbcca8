//! Azure OpenAI client for embeddings and chat completions
//!
//! One client serves both capabilities; the judge used by evaluation is the same client
//! pointed at a different chat deployment.

use async_trait::async_trait;
use std::fmt;

use crate::config::{NetworkConfig, OpenAiConfig};
use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::generation::ChatMessage;
use crate::providers::completion::{CompletionProvider, CompletionRequest};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::http::{build_client, join_url, parse_json, send_with_retry};

/// Azure OpenAI REST client
#[derive(Clone)]
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    chat_deployment: String,
    embedding_deployment: String,
    dimensions: usize,
    max_retries: u32,
}

impl fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("embedding_deployment", &self.embedding_deployment)
            .finish()
    }
}

impl AzureOpenAiClient {
    /// Create a client from configuration
    pub fn new(config: &OpenAiConfig, network: &NetworkConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::config("Azure OpenAI endpoint is not configured"));
        }
        Ok(Self {
            client: build_client(network.request_timeout())?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            chat_deployment: config.chat_deployment.clone(),
            embedding_deployment: config.embedding_deployment.clone(),
            dimensions: config.embedding_dimensions,
            max_retries: network.max_retries,
        })
    }

    /// Same connection, different chat deployment
    pub fn with_chat_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.chat_deployment = deployment.into();
        self
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}?api-version={}",
            join_url(
                &self.endpoint,
                &format!("openai/deployments/{}/{}", deployment, operation)
            ),
            self.api_version
        )
    }

    async fn request_embeddings(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let url = self.deployment_url(&self.embedding_deployment, "embeddings");
        let body = serde_json::json!({ "input": input });

        let response = send_with_retry(Stage::Embedding, "azure-openai", self.max_retries, || {
            self.client
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let mut parsed: EmbeddingResponse =
            parse_json(Stage::Embedding, "azure-openai", response).await?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(serde::Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(serde::Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::input("Cannot embed empty text"));
        }

        self.request_embeddings(serde_json::json!(text))
            .await?
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::upstream(
                    Stage::Embedding,
                    UpstreamKind::MalformedResponse,
                    "No embedding in Azure OpenAI response",
                )
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::input("Cannot embed empty text"));
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        // Azure OpenAI accepts up to 16 inputs per embeddings request
        for chunk in texts.chunks(16) {
            let embeddings = self.request_embeddings(serde_json::json!(chunk)).await?;
            if embeddings.len() != chunk.len() {
                return Err(Error::upstream(
                    Stage::Embedding,
                    UpstreamKind::MalformedResponse,
                    format!(
                        "Expected {} embeddings, received {}",
                        chunk.len(),
                        embeddings.len()
                    ),
                ));
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}

#[async_trait]
impl CompletionProvider for AzureOpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let messages = request.template.render(&request.variables, &request.history)?;
        let url = self.deployment_url(&self.chat_deployment, "chat/completions");
        let body = ChatCompletionRequest {
            messages: &messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            "Completion '{}' on {} ({} messages)",
            request.template.id(),
            self.chat_deployment,
            messages.len()
        );

        let response = send_with_retry(Stage::Completion, "azure-openai", self.max_retries, || {
            self.client
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: ChatCompletionResponse =
            parse_json(Stage::Completion, "azure-openai", response).await?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            Error::upstream(
                Stage::Completion,
                UpstreamKind::MalformedResponse,
                "No choices in Azure OpenAI response",
            )
        })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(Error::upstream(
                Stage::Completion,
                UpstreamKind::Rejected,
                "Completion withheld by content filter",
            ));
        }

        choice.message.content.ok_or_else(|| {
            Error::upstream(
                Stage::Completion,
                UpstreamKind::MalformedResponse,
                "No text in Azure OpenAI response",
            )
        })
    }

    fn name(&self) -> &str {
        "azure-openai"
    }

    fn model(&self) -> &str {
        &self.chat_deployment
    }
}
