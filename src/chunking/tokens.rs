// Token-window chunking over whole lines
//
// Windows are built from per-line token estimates, so every chunk maps back
// to an exact line range. A single line larger than the window becomes its
// own chunk.

use super::lines::chunks_from_windows;
use super::ChunkingStrategy;
use crate::config::Config;
use crate::models::CodeBlock;
use crate::utils::token_estimation::TokenEstimator;

#[derive(Debug, Clone)]
pub struct TokenChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    estimator: TokenEstimator,
}

impl TokenChunker {
    pub fn new(config: &Config) -> Self {
        Self::with_window(config.token_chunk_size, config.token_chunk_overlap)
    }

    pub fn with_window(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            estimator: TokenEstimator::new(),
        }
    }

    /// Inclusive 0-based line windows.
    fn windows(&self, line_tokens: &[usize]) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        let mut start = 0usize;

        while start < line_tokens.len() {
            let mut end = start;
            let mut total = line_tokens[start];
            while end + 1 < line_tokens.len() && total + line_tokens[end + 1] <= self.chunk_size {
                end += 1;
                total += line_tokens[end];
            }
            windows.push((start, end));
            if end + 1 == line_tokens.len() {
                break;
            }

            // Step back over trailing lines worth up to `chunk_overlap` tokens
            let mut next = end + 1;
            let mut overlap = 0usize;
            while next > start + 1 && overlap + line_tokens[next - 1] <= self.chunk_overlap {
                next -= 1;
                overlap += line_tokens[next];
            }
            start = next;
        }
        windows
    }
}

impl ChunkingStrategy for TokenChunker {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn chunk(&self, text: &str, file_path: &str, file_hash: &str) -> Vec<CodeBlock> {
        let lines: Vec<&str> = text.lines().collect();
        let line_tokens = self.estimator.estimate_lines(&lines);
        let windows = self.windows(&line_tokens);
        chunks_from_windows(&lines, &windows, "tokens", file_path, file_hash)
    }
}
