//! Provider abstractions for the three external capabilities
//!
//! The pipeline only sees the traits; Azure clients implement them for production and the
//! mock module implements them for tests.

pub mod azure;
pub mod completion;
pub mod embedding;
pub(crate) mod http;
pub mod vector_search;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use completion::{CompletionProvider, CompletionRequest};
pub use embedding::EmbeddingProvider;
pub use vector_search::{SearchHit, VectorQuery, VectorSearchProvider};
