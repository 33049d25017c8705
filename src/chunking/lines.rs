// Line-window chunking, the degraded path for anything the structural engine skips

use super::ChunkingStrategy;
use crate::config::Config;
use crate::models::CodeBlock;

/// Windows may run this far past `line_chunk_max_chars` before closing.
const MAX_CHARS_TOLERANCE: f64 = 1.15;

/// Windows with less trimmed content are dropped unless they are the only one.
pub(crate) const MIN_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct LineChunker {
    max_chars: usize,
}

impl LineChunker {
    pub fn new(config: &Config) -> Self {
        Self::with_max_chars(config.line_chunk_max_chars)
    }

    pub fn with_max_chars(max_chars: usize) -> Self {
        Self { max_chars }
    }

    fn window_limit(&self) -> usize {
        (self.max_chars as f64 * MAX_CHARS_TOLERANCE).ceil() as usize
    }
}

impl ChunkingStrategy for LineChunker {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn chunk(&self, text: &str, file_path: &str, file_hash: &str) -> Vec<CodeBlock> {
        let lines: Vec<&str> = text.lines().collect();
        let limit = self.window_limit();

        let mut windows: Vec<(usize, usize)> = Vec::new();
        let mut start = 0usize;
        let mut length = 0usize;
        for (i, line) in lines.iter().enumerate() {
            // +1 for the newline
            length += line.chars().count() + 1;
            if length >= limit || i + 1 == lines.len() {
                windows.push((start, i));
                start = i + 1;
                length = 0;
            }
        }

        chunks_from_windows(&lines, &windows, "lines", file_path, file_hash)
    }
}

/// Blocks for inclusive 0-based line windows, applying the minimum-size rule.
pub(crate) fn chunks_from_windows(
    lines: &[&str],
    windows: &[(usize, usize)],
    label: &str,
    file_path: &str,
    file_hash: &str,
) -> Vec<CodeBlock> {
    let only_window = windows.len() == 1;
    windows
        .iter()
        .filter_map(|&(first, last)| {
            let content = lines[first..=last].join("\n");
            let trimmed = content.trim().chars().count();
            if trimmed == 0 || (trimmed < MIN_CHUNK_CHARS && !only_window) {
                return None;
            }
            let (start_line, end_line) = (first + 1, last + 1);
            Some(CodeBlock {
                block_type: "chunk".to_string(),
                identifier: format!("{}:{}-{}", label, start_line, end_line),
                file_path: file_path.to_string(),
                file_hash: file_hash.to_string(),
                start_line,
                end_line,
                content,
            })
        })
        .collect()
}
