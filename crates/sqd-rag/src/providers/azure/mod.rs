//! Azure-hosted providers: OpenAI (embeddings, chat) and AI Search

mod openai;
mod search;

pub use openai::AzureOpenAiClient;
pub use search::AzureSearchClient;
