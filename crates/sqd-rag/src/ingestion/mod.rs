//! Index upload: turn a directory of text files into search documents

mod chunker;
mod indexer;

pub use chunker::{TextChunk, TextChunker};
pub use indexer::{IndexReport, Indexer, PendingChunk};
