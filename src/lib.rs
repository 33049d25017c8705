// Code Chunker - tree-sitter structural chunking for semantic code search
//
// Turns source files into content-addressed blocks (functions, classes and
// similar units) ready for embedding. Languages without structural support
// degrade to line or token chunks.
//
// Architecture: `ChunkingEngine` owns one detector, query cache, parser pool,
// file validator, extractor and batch processor, shared through `Arc`.

pub mod batch;
pub mod chunking;
pub mod config;
pub mod detector;
pub mod engine;
pub mod errors;
pub mod extractors;
pub mod file_processor;
pub mod language;
pub mod models;
pub mod queries;
pub mod query_manager;
pub mod resource_manager;
pub mod utils;

pub use batch::{BatchConfig, BatchProcessor};
pub use chunking::{select_strategy, ChunkingStrategy, LineChunker, StructuralChunker, TokenChunker};
pub use config::{ChunkingStrategyKind, Config, LanguageConfig};
pub use detector::LanguageDetector;
pub use engine::{ChunkingEngine, EngineDiagnostics};
pub use errors::{ChunkError, ErrorHandler, Result};
pub use extractors::{BlockExtractor, ExtractionStrategy};
pub use file_processor::FileProcessor;
pub use models::{hash_content, BatchProcessingResult, CodeBlock, ExtractionResult, FileInput};
pub use query_manager::QueryManager;
pub use resource_manager::{ParserLease, ResourceManager};
