//! ChunkingEngine - one shared set of components behind a small API
//!
//! Construction is the only place a fatal error can surface: an invalid
//! configuration or a grammar built for an incompatible tree-sitter ABI.
//! After that, every per-file problem comes back as an `ExtractionResult`.

use crate::batch::{BatchProcessor, UNKNOWN_LANGUAGE};
use crate::config::Config;
use crate::detector::{DetectorCacheInfo, LanguageDetector};
use crate::errors::{ErrorHandler, FailureStats, Result};
use crate::extractors::BlockExtractor;
use crate::file_processor::FileProcessor;
use crate::models::{BatchProcessingResult, ExtractionResult, FileInput};
use crate::query_manager::{QueryCacheInfo, QueryManager};
use crate::resource_manager::{CleanupStats, ResourceManager, ResourceUsage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Point-in-time view of every cache and counter in the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineDiagnostics {
    pub query_cache: QueryCacheInfo,
    pub resources: ResourceUsage,
    pub failures: FailureStats,
    pub detector: DetectorCacheInfo,
}

pub struct ChunkingEngine {
    config: Arc<Config>,
    error_handler: Arc<ErrorHandler>,
    detector: Arc<LanguageDetector>,
    query_manager: Arc<QueryManager>,
    resource_manager: Arc<ResourceManager>,
    file_processor: FileProcessor,
    extractor: Arc<BlockExtractor>,
    batch_processor: BatchProcessor,
}

impl ChunkingEngine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        let config = Arc::new(config);
        let error_handler = Arc::new(ErrorHandler::new());

        let resource_manager = Arc::new(ResourceManager::new(config.clone(), error_handler.clone()));
        resource_manager.ensure_version_compatible()?;

        let query_manager = Arc::new(QueryManager::new(&config, error_handler.clone()));
        let preloaded = query_manager.preload_common_queries(&config.preload_languages);

        let detector = Arc::new(LanguageDetector::new());
        let file_processor =
            FileProcessor::new(config.clone(), detector.clone(), error_handler.clone());
        let extractor = Arc::new(BlockExtractor::new(
            config.clone(),
            query_manager.clone(),
            resource_manager.clone(),
            error_handler.clone(),
        ));
        let batch_processor = BatchProcessor::new(
            config.clone(),
            detector.clone(),
            extractor.clone(),
            error_handler.clone(),
        );

        info!(
            "🚀 Chunking engine ready in {:.1}ms ({} queries preloaded)",
            started.elapsed().as_secs_f64() * 1000.0,
            preloaded
        );

        Ok(Self {
            config,
            error_handler,
            detector,
            query_manager,
            resource_manager,
            file_processor,
            extractor,
            batch_processor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detector(&self) -> &Arc<LanguageDetector> {
        &self.detector
    }

    pub fn query_manager(&self) -> &Arc<QueryManager> {
        &self.query_manager
    }

    pub fn resource_manager(&self) -> &Arc<ResourceManager> {
        &self.resource_manager
    }

    pub fn extractor(&self) -> &Arc<BlockExtractor> {
        &self.extractor
    }

    pub fn file_processor(&self) -> &FileProcessor {
        &self.file_processor
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.error_handler
    }

    /// Extract blocks from in-memory text; the language comes from `file_path`.
    pub fn chunk_text(&self, text: &str, file_path: &str, file_hash: &str) -> ExtractionResult {
        if !self
            .file_processor
            .filter_by_criteria(Path::new(file_path), text.len() as u64)
        {
            return ExtractionResult::succeeded(
                Vec::new(),
                BTreeMap::from([("skipped".to_string(), "file_too_large".to_string())]),
            );
        }

        let language = self.detector.detect(file_path).unwrap_or(UNKNOWN_LANGUAGE);
        self.extractor.extract(text, file_path, file_hash, language)
    }

    /// Validate, read and extract one file from disk.
    ///
    /// Files rejected by validation come back as `ChunkError::FileFiltered`.
    pub fn chunk_file(&self, path: &Path) -> Result<ExtractionResult> {
        self.file_processor.check_file(path)?;
        let input = FileInput::from_path(path)?;
        debug!("Chunking {} ({} bytes)", input.file_path, input.text.len());
        Ok(self.chunk_text(&input.text, &input.file_path, &input.file_hash))
    }

    pub fn process_batch(&self, files: &[FileInput]) -> BatchProcessingResult {
        self.batch_processor.process_batch(files)
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            query_cache: self.query_manager.get_cache_info(),
            resources: self.resource_manager.get_resource_usage(),
            failures: self.error_handler.failure_stats(),
            detector: self.detector.get_cache_info(),
        }
    }

    /// Drop pooled parsers and expired queries. The engine stays usable;
    /// parsers are recreated on demand.
    pub fn shutdown(&self) -> CleanupStats {
        let expired = self.query_manager.cleanup_expired_queries();
        let stats = self.resource_manager.cleanup_all();
        info!(
            "🧹 Engine cleanup: {} parsers released, {} expired queries dropped",
            stats.parsers_cleaned, expired
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ChunkError;
    use crate::models::hash_content;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> ChunkingEngine {
        ChunkingEngine::new(Config::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            token_chunk_overlap: 2000,
            ..Config::default()
        };
        assert!(matches!(ChunkingEngine::new(config), Err(ChunkError::Config(_))));
    }

    #[test]
    fn test_chunk_text_detects_language() {
        let engine = engine();
        let result = engine.chunk_text("def f():\n    return 1", "pkg/mod.py", "h");

        assert!(result.success);
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.blocks[0].identifier, "f");
        assert_eq!((result.blocks[0].start_line, result.blocks[0].end_line), (1, 2));
        assert_eq!(result.metadata.get("language_key").map(String::as_str), Some("python"));
    }

    #[test]
    fn test_chunk_text_skips_oversized_text() {
        let engine = ChunkingEngine::new(Config {
            max_file_size_bytes: 10,
            ..Config::default()
        })
        .unwrap();
        let result = engine.chunk_text("def f():\n    return 1", "a.py", "h");
        assert!(result.success);
        assert!(result.blocks.is_empty());
        assert_eq!(result.metadata.get("skipped").map(String::as_str), Some("file_too_large"));
    }

    #[test]
    fn test_chunk_file_reads_and_hashes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lib.rs");
        let source = "pub struct Point { x: i32 }\n\nfn origin() -> Point { Point { x: 0 } }\n";
        fs::write(&path, source).unwrap();

        let result = engine().chunk_file(&path).unwrap();
        assert!(result.success);
        let identifiers: Vec<&str> = result.blocks.iter().map(|b| b.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["Point", "origin"]);
        assert!(result.blocks.iter().all(|b| b.file_hash == hash_content(source)));
    }

    #[test]
    fn test_chunk_file_reports_filtered_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.py");
        fs::write(&path, "").unwrap();

        let err = engine().chunk_file(&path).unwrap_err();
        assert!(matches!(err, ChunkError::FileFiltered { .. }));
    }

    #[test]
    fn test_batch_and_diagnostics() {
        let engine = engine();
        let files = vec![
            FileInput::new("def a():\n    pass\n", "a.py", "h1"),
            FileInput::new("func B() {}\n", "b.go", "h2"),
            FileInput::new("just text", "c.unknown", "h3"),
        ];
        let result = engine.process_batch(&files);
        assert_eq!(result.results.len(), 3);
        assert_eq!(result.processed_files + result.failed_files, 3);

        let diagnostics = engine.diagnostics();
        assert!(diagnostics.query_cache.valid_queries >= 1);
        assert!(diagnostics.resources.parsers >= 1);
        assert!(diagnostics.detector.cache_size >= 3);
    }

    #[test]
    fn test_shutdown_releases_parsers_and_engine_recovers() {
        let engine = engine();
        assert!(engine.chunk_text("fn a() {}", "a.rs", "h").success);

        let stats = engine.shutdown();
        assert_eq!(stats.parsers_cleaned, 1);
        assert_eq!(engine.diagnostics().resources.parsers, 0);

        let again = engine.chunk_text("fn a() {}", "a.rs", "h");
        assert_eq!(again.blocks[0].identifier, "a");
    }
}
