//! Shared state for the scoring server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::pipeline::ChatPipeline;
use crate::providers::azure::{AzureOpenAiClient, AzureSearchClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pipeline: ChatPipeline,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build the Azure-backed pipeline from configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate_connections()?;

        let openai = Arc::new(AzureOpenAiClient::new(&config.openai, &config.network)?);
        let search = Arc::new(AzureSearchClient::new(&config.search, &config.network)?);
        tracing::info!(
            "Pipeline providers: chat={}, embeddings={}, index={}",
            config.openai.chat_deployment,
            config.openai.embedding_deployment,
            config.search.index_name
        );

        let pipeline = ChatPipeline::new(&config, openai.clone(), search, openai);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Wrap an existing pipeline; not ready until the server is listening
    pub fn with_pipeline(config: AppConfig, pipeline: ChatPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                ready: RwLock::new(false),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &ChatPipeline {
        &self.inner.pipeline
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
