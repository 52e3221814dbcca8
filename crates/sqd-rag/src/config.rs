//! Configuration for the chat pipeline, its clients and tooling
//!
//! The whole configuration is built once at process start by [`AppConfig::load`] and then
//! passed by reference into client constructors and the pipeline. Environment variables are
//! only consulted here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Scoring server configuration
    pub server: ServerConfig,
    /// Azure OpenAI connection (embeddings, chat, evaluation judge)
    pub openai: OpenAiConfig,
    /// Azure AI Search connection
    pub search: SearchConfig,
    /// Generation parameters
    pub generation: GenerationConfig,
    /// Retrieval parameters
    pub retrieval: RetrievalConfig,
    /// Timeouts and retries for outbound calls
    pub network: NetworkConfig,
    /// Index upload configuration
    pub indexing: IndexingConfig,
    /// Evaluation configuration
    pub evaluation: EvaluationConfig,
    /// Deployed endpoint used by the invoker
    pub deployment: DeploymentConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number (liveness, readiness and scoring share it)
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Azure OpenAI configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Resource endpoint, e.g. "https://my-resource.openai.azure.com"
    pub endpoint: String,
    /// API key sent in the `api-key` header
    pub api_key: String,
    /// REST API version
    pub api_version: String,
    /// Chat completion deployment (intent extraction and replies)
    pub chat_deployment: String,
    /// Embedding deployment
    pub embedding_deployment: String,
    /// Deployment used to judge evaluation metrics (falls back to chat deployment)
    pub evaluation_deployment: Option<String>,
    /// Embedding dimensions reported by the embedder
    pub embedding_dimensions: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2024-02-01".to_string(),
            chat_deployment: String::new(),
            embedding_deployment: String::new(),
            evaluation_deployment: None,
            embedding_dimensions: 1536, // text-embedding-ada-002
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("embedding_deployment", &self.embedding_deployment)
            .field("evaluation_deployment", &self.evaluation_deployment)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .finish()
    }
}

impl OpenAiConfig {
    /// Deployment used for evaluation judges
    pub fn judge_deployment(&self) -> &str {
        self.evaluation_deployment
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.chat_deployment)
    }
}

/// Azure AI Search configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Service endpoint, e.g. "https://my-search.search.windows.net"
    pub endpoint: String,
    /// Admin or query key
    pub api_key: String,
    /// Index holding the document chunks
    pub index_name: String,
    /// REST API version
    pub api_version: String,
    /// Vector field searched by nearest-neighbour queries
    pub vector_field: String,
    /// Identifier field returned with each hit
    pub id_field: String,
    /// Content field returned with each hit
    pub content_field: String,
    /// Title field written during indexing
    pub title_field: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            index_name: String::new(),
            api_version: "2023-11-01".to_string(),
            vector_field: "contentVector".to_string(),
            id_field: "id".to_string(),
            content_field: "content".to_string(),
            title_field: "title".to_string(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("api_version", &self.api_version)
            .field("vector_field", &self.vector_field)
            .field("id_field", &self.id_field)
            .field("content_field", &self.content_field)
            .field("title_field", &self.title_field)
            .finish()
    }
}

/// Generation parameters for the completion capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Output cap for the intent-extraction call
    pub intent_max_tokens: u32,
    /// Sampling temperature for intent extraction
    pub intent_temperature: f32,
    /// Output cap for the reply
    pub reply_max_tokens: u32,
    /// Sampling temperature for the reply (low favours groundedness)
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            intent_max_tokens: 256,
            intent_temperature: 0.0,
            reply_max_tokens: 256,
            temperature: 0.2,
        }
    }
}

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest neighbours requested
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Outbound call limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Deadline for a single external call in seconds
    pub request_timeout_secs: u64,
    /// Retries for rate-limited or unavailable responses
    pub max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Index upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Directory of source documents
    pub data_dir: PathBuf,
    /// Maximum tokens per chunk
    pub tokens_per_chunk: usize,
    /// Tokens shared between consecutive chunks
    pub token_overlap: usize,
    /// Chunks embedded and uploaded per request
    pub upload_batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tokens_per_chunk: 800,
            token_overlap: 0,
            upload_batch_size: 100,
        }
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Every metric must reach this percentage for the run to pass
    pub pass_threshold_percent: f64,
    /// Dataset rows evaluated concurrently
    pub concurrency: usize,
    /// Output cap for judge calls
    pub judge_max_tokens: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            pass_threshold_percent: 90.0,
            concurrency: num_cpus::get().clamp(1, 4),
            judge_max_tokens: 16,
        }
    }
}

/// Deployed online endpoint
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Endpoint name (informational)
    pub endpoint_name: String,
    /// Scoring URI of the deployed endpoint
    pub scoring_uri: String,
    /// Bearer token for the endpoint
    pub access_token: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            endpoint_name: "sqd-endpoint".to_string(),
            scoring_uri: String::new(),
            access_token: String::new(),
        }
    }
}

impl std::fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentConfig")
            .field("endpoint_name", &self.endpoint_name)
            .field("scoring_uri", &self.scoring_uri)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: optional TOML file, then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Default config location: `<config dir>/sqd-rag/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sqd-rag").join("config.toml"))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };

        set(&mut self.openai.endpoint, "AZURE_OPENAI_ENDPOINT");
        set(&mut self.openai.api_key, "AZURE_OPENAI_API_KEY");
        set(&mut self.openai.api_version, "AZURE_OPENAI_API_VERSION");
        set(&mut self.openai.chat_deployment, "AZURE_OPENAI_CHAT_DEPLOYMENT");
        set(&mut self.openai.embedding_deployment, "AZURE_OPENAI_EMBEDDING_DEPLOYMENT");
        set(&mut self.search.endpoint, "AZURE_SEARCH_ENDPOINT");
        set(&mut self.search.api_key, "AZURE_SEARCH_API_KEY");
        set(&mut self.search.index_name, "AZUREAI_SEARCH_INDEX_NAME");
        set(&mut self.deployment.scoring_uri, "SQD_SCORING_URI");
        set(&mut self.deployment.access_token, "SQD_ACCESS_TOKEN");

        if let Some(v) = lookup("AZURE_OPENAI_EVALUATION_DEPLOYMENT").filter(|v| !v.is_empty()) {
            self.openai.evaluation_deployment = Some(v);
        }
        if let Some(port) = lookup("SQD_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check the values every command relies on
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        for (name, t) in [
            ("generation.temperature", self.generation.temperature),
            ("generation.intent_temperature", self.generation.intent_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::config(format!("{} must be within [0, 2], got {}", name, t)));
            }
        }
        if self.generation.intent_max_tokens == 0 || self.generation.reply_max_tokens == 0 {
            return Err(Error::config("generation max tokens must be greater than 0"));
        }
        if self.indexing.tokens_per_chunk == 0 {
            return Err(Error::config("indexing.tokens_per_chunk must be greater than 0"));
        }
        if self.indexing.token_overlap >= self.indexing.tokens_per_chunk {
            return Err(Error::config(
                "indexing.token_overlap must be smaller than indexing.tokens_per_chunk",
            ));
        }
        if self.indexing.upload_batch_size == 0 {
            return Err(Error::config("indexing.upload_batch_size must be greater than 0"));
        }
        if self.evaluation.concurrency == 0 {
            return Err(Error::config("evaluation.concurrency must be greater than 0"));
        }
        Ok(())
    }

    /// Check the connection settings the chat path needs
    pub fn validate_connections(&self) -> Result<()> {
        let required = [
            ("openai.endpoint (AZURE_OPENAI_ENDPOINT)", &self.openai.endpoint),
            ("openai.api_key (AZURE_OPENAI_API_KEY)", &self.openai.api_key),
            ("openai.chat_deployment (AZURE_OPENAI_CHAT_DEPLOYMENT)", &self.openai.chat_deployment),
            (
                "openai.embedding_deployment (AZURE_OPENAI_EMBEDDING_DEPLOYMENT)",
                &self.openai.embedding_deployment,
            ),
            ("search.endpoint (AZURE_SEARCH_ENDPOINT)", &self.search.endpoint),
            ("search.api_key (AZURE_SEARCH_API_KEY)", &self.search.api_key),
            ("search.index_name (AZUREAI_SEARCH_INDEX_NAME)", &self.search.index_name),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!("Missing settings: {}", missing.join(", "))))
        }
    }
}
