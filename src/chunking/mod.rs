//! Chunking strategies
//!
//! - `lines.rs` - fixed-size line windows
//! - `tokens.rs` - token windows with overlap, mapped to line ranges
//! - `StructuralChunker` - the structural engine, with a per-file line fallback
//!
//! `select_strategy` picks one from configuration. `use_structural_chunking`
//! is checked first: when it is off, `treesitter` resolves to line chunking
//! and the per-file fallback never comes into play.

pub mod lines;
pub mod tokens;

pub use lines::LineChunker;
pub use tokens::TokenChunker;

use crate::config::{ChunkingStrategyKind, Config};
use crate::engine::ChunkingEngine;
use crate::models::CodeBlock;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait ChunkingStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn chunk(&self, text: &str, file_path: &str, file_hash: &str) -> Vec<CodeBlock>;
}

pub struct StructuralChunker {
    engine: Arc<ChunkingEngine>,
    line_fallback: Option<LineChunker>,
}

impl StructuralChunker {
    pub fn new(engine: Arc<ChunkingEngine>) -> Self {
        let line_fallback = engine
            .config()
            .fallback_to_lines
            .then(|| LineChunker::new(engine.config()));
        Self {
            engine,
            line_fallback,
        }
    }
}

impl ChunkingStrategy for StructuralChunker {
    fn name(&self) -> &'static str {
        "treesitter"
    }

    fn chunk(&self, text: &str, file_path: &str, file_hash: &str) -> Vec<CodeBlock> {
        let result = self.engine.chunk_text(text, file_path, file_hash);
        if result.success && !result.blocks.is_empty() {
            return result.blocks;
        }

        match &self.line_fallback {
            Some(lines) => {
                debug!(
                    "No structural blocks for {} ({}), using line chunks",
                    file_path,
                    result
                        .error_message
                        .as_deref()
                        .or_else(|| result.metadata.get("skipped").map(String::as_str))
                        .unwrap_or("empty")
                );
                lines.chunk(text, file_path, file_hash)
            }
            None => result.blocks,
        }
    }
}

/// Strategy for `config`. Structural chunking needs an engine; without one it
/// degrades to line chunking.
pub fn select_strategy(
    config: &Config,
    engine: Option<Arc<ChunkingEngine>>,
) -> Box<dyn ChunkingStrategy> {
    match config.chunking_strategy {
        ChunkingStrategyKind::Lines => Box::new(LineChunker::new(config)),
        ChunkingStrategyKind::Tokens => Box::new(TokenChunker::new(config)),
        ChunkingStrategyKind::Treesitter if !config.use_structural_chunking => {
            debug!("Structural chunking disabled, using line chunks");
            Box::new(LineChunker::new(config))
        }
        ChunkingStrategyKind::Treesitter => match engine {
            Some(engine) => Box::new(StructuralChunker::new(engine)),
            None => {
                warn!("⚠️ Structural chunking requested without an engine, using line chunks");
                Box::new(LineChunker::new(config))
            }
        },
    }
}
