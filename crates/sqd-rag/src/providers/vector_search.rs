//! Vector search provider trait for nearest-neighbour retrieval and index upload

use async_trait::async_trait;

use crate::error::Result;
use crate::types::IndexDocument;

/// Nearest-neighbour query against the index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// Query embedding
    pub vector: Vec<f32>,
    /// Maximum number of neighbours
    pub k: usize,
    /// Vector field to search
    pub vector_field: String,
    /// Fields returned with each hit
    pub select: Vec<String>,
}

/// A single search result, in service relevance order
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    /// Relevance score reported by the service, if any
    pub score: Option<f64>,
}

/// Trait for vector search over an external index
///
/// Implementations:
/// - `AzureSearchClient`: Azure AI Search
/// - `MockSearch`: fixed hits for tests
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    /// Return up to `query.k` hits, most relevant first
    async fn search(&self, query: &VectorQuery) -> Result<Vec<SearchHit>>;

    /// Upload (merge or insert) documents, returning how many were accepted
    async fn upload(&self, documents: &[IndexDocument]) -> Result<usize>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
