//! Prompt templating and context assembly

pub mod context;
pub mod prompt;

pub use context::{assemble_context, SOURCE_MARKER};
pub use prompt::{ChatMessage, PromptTemplate};
