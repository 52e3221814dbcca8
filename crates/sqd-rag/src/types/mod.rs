//! Core types for the chat pipeline

pub mod conversation;
pub mod document;
pub mod response;

pub use conversation::{ChatHistory, ConversationTurn, HistoryEntry, Role};
pub use document::{Document, FileType, IndexDocument, RetrievedSet};
pub use response::{ChatResponse, ScoreRequest};
