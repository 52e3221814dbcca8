//! In-memory providers for tests and offline runs
//!
//! Each mock records the calls it receives so tests can assert on call counts and payloads.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result, Stage, UpstreamKind};
use crate::generation::PromptTemplate;
use crate::providers::completion::{CompletionProvider, CompletionRequest};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_search::{SearchHit, VectorQuery, VectorSearchProvider};
use crate::types::{Document, IndexDocument};

async fn pause(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn failure(stage: Stage, kind: UpstreamKind) -> Error {
    Error::upstream(stage, kind, format!("mock {} failure", stage))
}

/// Returns the same vector for every text
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub vector: Vec<f32>,
    pub fail: Option<UpstreamKind>,
    pub delay_ms: u64,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            vector: vec![0.1, 0.2, 0.3, 0.4],
            fail: None,
            delay_ms: 0,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn failing(kind: UpstreamKind) -> Self {
        Self {
            fail: Some(kind),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Texts embedded so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().push(text.to_string());
        pause(self.delay_ms).await;
        if let Some(kind) = self.fail {
            return Err(failure(Stage::Embedding, kind));
        }
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Returns a fixed, ordered list of hits and keeps uploaded documents in memory
#[derive(Debug, Clone, Default)]
pub struct MockSearch {
    pub hits: Vec<SearchHit>,
    pub fail: Option<UpstreamKind>,
    pub delay_ms: u64,
    queries: Arc<Mutex<Vec<VectorQuery>>>,
    uploaded: Arc<Mutex<Vec<IndexDocument>>>,
}

impl MockSearch {
    #[must_use]
    pub fn with_documents(documents: &[Document]) -> Self {
        Self {
            hits: documents
                .iter()
                .map(|d| SearchHit {
                    id: d.id.clone(),
                    content: d.content.clone(),
                    score: None,
                })
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(kind: UpstreamKind) -> Self {
        Self {
            fail: Some(kind),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn queries(&self) -> Vec<VectorQuery> {
        self.queries.lock().clone()
    }

    pub fn uploaded(&self) -> Vec<IndexDocument> {
        self.uploaded.lock().clone()
    }
}

#[async_trait]
impl VectorSearchProvider for MockSearch {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>> {
        self.queries.lock().push(query.clone());
        pause(self.delay_ms).await;
        if let Some(kind) = self.fail {
            return Err(failure(Stage::Search, kind));
        }
        Ok(self.hits.iter().take(query.k).cloned().collect())
    }

    async fn upload(&self, documents: &[IndexDocument]) -> Result<usize> {
        if let Some(kind) = self.fail {
            return Err(failure(Stage::Search, kind));
        }
        self.uploaded.lock().extend(documents.iter().cloned());
        Ok(documents.len())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Replies from per-template queues, falling back to a default response
#[derive(Debug, Clone)]
pub struct MockCompletion {
    pub default_response: String,
    pub delay_ms: u64,
    responses: Arc<Mutex<HashMap<PromptTemplate, VecDeque<String>>>>,
    failures: Arc<Mutex<HashMap<PromptTemplate, UpstreamKind>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self {
            default_response: "mock response".to_string(),
            delay_ms: 0,
            responses: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockCompletion {
    /// Queue a response for the given template
    #[must_use]
    pub fn respond(self, template: PromptTemplate, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .entry(template)
            .or_default()
            .push_back(response.into());
        self
    }

    /// Fail every call for the given template
    #[must_use]
    pub fn fail_on(self, template: PromptTemplate, kind: UpstreamKind) -> Self {
        self.failures.lock().insert(template, kind);
        self
    }

    #[must_use]
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests for one template
    pub fn count(&self, template: PromptTemplate) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.template == template)
            .count()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        // Missing variables fail the same way a real client would
        request.template.render(&request.variables, &request.history)?;
        self.requests.lock().push(request.clone());
        pause(self.delay_ms).await;

        if let Some(kind) = self.failures.lock().get(&request.template).copied() {
            return Err(failure(Stage::Completion, kind));
        }

        let queued = self
            .responses
            .lock()
            .get_mut(&request.template)
            .and_then(VecDeque::pop_front);
        Ok(queued.unwrap_or_else(|| self.default_response.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
