//! sqd-rag: retrieval-augmented chat over Azure OpenAI and Azure AI Search
//!
//! This crate turns a conversational turn plus history into a search query, retrieves
//! supporting documents from a vector index, and produces a grounded reply together with
//! the context it was built from. It also carries the operational tooling around that
//! pipeline: index upload, batch evaluation, a scoring server and a deployment invoker.

pub mod config;
pub mod deployment;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result, Stage, UpstreamKind};
pub use pipeline::ChatPipeline;
pub use types::{
    conversation::{ChatHistory, ConversationTurn, Role},
    document::{Document, RetrievedSet},
    response::ChatResponse,
};
