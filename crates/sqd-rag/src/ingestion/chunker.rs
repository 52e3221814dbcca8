//! Token-window chunking with sentence-boundary preference

use unicode_segmentation::UnicodeSegmentation;

/// A slice of a source text, ready to embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position within the source document
    pub index: usize,
    /// Original text of the chunk, whitespace preserved
    pub content: String,
    /// Number of whitespace-separated tokens
    pub token_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
    ends_sentence: bool,
}

/// Text chunker with configurable size and overlap, both counted in tokens
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum tokens per chunk
    tokens_per_chunk: usize,
    /// Tokens repeated at the start of the next chunk
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    ///
    /// `overlap` is clamped below `tokens_per_chunk` so every window makes progress.
    pub fn new(tokens_per_chunk: usize, overlap: usize) -> Self {
        let tokens_per_chunk = tokens_per_chunk.max(1);
        Self {
            tokens_per_chunk,
            overlap: overlap.min(tokens_per_chunk - 1),
        }
    }

    /// Split text into chunks of at most `tokens_per_chunk` tokens
    ///
    /// A chunk ends at the last sentence boundary inside its window when that boundary is
    /// past the window's midpoint; otherwise the window is cut at the token limit.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let tokens = tokenize(text);
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < tokens.len() {
            let limit = (start + self.tokens_per_chunk).min(tokens.len());
            let end = if limit == tokens.len() {
                limit
            } else {
                let midpoint = start + self.tokens_per_chunk / 2;
                (midpoint..limit)
                    .rev()
                    .find(|&i| tokens[i].ends_sentence)
                    .map(|i| i + 1)
                    .unwrap_or(limit)
            };

            chunks.push(TextChunk {
                index: chunks.len(),
                content: text[tokens[start].start..tokens[end - 1].end].to_string(),
                token_count: end - start,
            });

            if end == tokens.len() {
                break;
            }
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// Whitespace tokens with byte spans, flagged at sentence ends
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (offset, sentence) in text.split_sentence_bound_indices() {
        let before = tokens.len();
        for word in sentence.split_whitespace() {
            let start = offset + (word.as_ptr() as usize - sentence.as_ptr() as usize);
            tokens.push(Token {
                start,
                end: start + word.len(),
                ends_sentence: false,
            });
        }
        if tokens.len() > before {
            if let Some(last) = tokens.last_mut() {
                last.ends_sentence = true;
            }
        }
    }

    tokens
}
