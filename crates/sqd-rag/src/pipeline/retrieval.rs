//! Embedding plus vector search

use tokio_util::sync::CancellationToken;

use super::ChatPipeline;
use crate::error::{Error, Result, Stage};
use crate::providers::VectorQuery;
use crate::types::{Document, RetrievedSet};

impl ChatPipeline {
    /// Fetch up to `k` documents for a query, in the order the search service ranked them
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievedSet> {
        if query.trim().is_empty() {
            return Err(Error::input("Search query must not be empty"));
        }
        if k == 0 {
            return Err(Error::input("k must be at least 1"));
        }

        let vector = self
            .call(
                Stage::Embedding,
                self.embedder.name(),
                cancel,
                self.embedder.embed(query),
            )
            .await?;

        let search_query = VectorQuery {
            vector,
            k,
            vector_field: self.vector_field.clone(),
            select: self.select.clone(),
        };

        let hits = self
            .call(
                Stage::Search,
                self.search.name(),
                cancel,
                self.search.search(&search_query),
            )
            .await?;

        Ok(hits
            .into_iter()
            .take(k)
            .map(|hit| Document::new(hit.id, hit.content))
            .collect())
    }
}
