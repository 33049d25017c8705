//! Batch processing: group by language, one parser checkout per group.
//!
//! Every input file gets exactly one entry in the result, and
//! `processed_files + failed_files` always equals the number of inputs.

use crate::config::Config;
use crate::detector::LanguageDetector;
use crate::errors::{ChunkError, ErrorContext, ErrorHandler};
use crate::extractors::BlockExtractor;
use crate::models::{BatchProcessingResult, CodeBlock, FileInput};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Group key for files whose language could not be detected.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Groups above this size are tuned for throughput.
const LARGE_BATCH_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchConfig {
    pub max_blocks_per_file: usize,
    pub timeout_multiplier: f64,
    /// Check out one parser for the whole group instead of one per file.
    pub resource_sharing: bool,
    /// Group is large enough to run on the rayon pool.
    pub parallel_processing: bool,
}

#[derive(Debug, Default)]
struct GroupOutcome {
    results: Vec<(String, Vec<CodeBlock>)>,
    processed: usize,
    failed: usize,
}

pub struct BatchProcessor {
    config: Arc<Config>,
    detector: Arc<LanguageDetector>,
    extractor: Arc<BlockExtractor>,
    error_handler: Arc<ErrorHandler>,
}

impl BatchProcessor {
    pub fn new(
        config: Arc<Config>,
        detector: Arc<LanguageDetector>,
        extractor: Arc<BlockExtractor>,
        error_handler: Arc<ErrorHandler>,
    ) -> Self {
        Self {
            config,
            detector,
            extractor,
            error_handler,
        }
    }

    /// Files by detected language; input order is kept inside each group.
    pub fn group_by_language<'a>(&self, files: &'a [FileInput]) -> BTreeMap<String, Vec<&'a FileInput>> {
        let mut groups: BTreeMap<String, Vec<&FileInput>> = BTreeMap::new();
        for file in files {
            let language = self
                .detector
                .detect(&file.file_path)
                .unwrap_or(UNKNOWN_LANGUAGE);
            groups.entry(language.to_string()).or_default().push(file);
        }
        groups
    }

    pub fn optimize_batch_config(&self, language: &str, file_count: usize) -> BatchConfig {
        let language_config = self.config.language_config(language);
        let mut batch_config = BatchConfig {
            max_blocks_per_file: language_config.max_blocks_per_file,
            timeout_multiplier: language_config.timeout_multiplier,
            resource_sharing: true,
            parallel_processing: false,
        };

        if file_count > LARGE_BATCH_THRESHOLD {
            batch_config.parallel_processing = true;
            // Large batches hold the parser longer
            batch_config.timeout_multiplier = 1.2;
        }
        batch_config
    }

    pub fn process_batch(&self, files: &[FileInput]) -> BatchProcessingResult {
        if files.is_empty() {
            return BatchProcessingResult {
                success: true,
                ..Default::default()
            };
        }

        let started = Instant::now();
        let groups = self.group_by_language(files);
        let planned: Vec<(String, Vec<&FileInput>, BatchConfig)> = groups
            .into_iter()
            .map(|(language, group)| {
                let batch_config = self.optimize_batch_config(&language, group.len());
                (language, group, batch_config)
            })
            .collect();

        let (parallel, inline): (Vec<_>, Vec<_>) = planned
            .into_iter()
            .partition(|(_, _, batch_config)| {
                self.config.parallel_languages && batch_config.parallel_processing
            });

        let mut outcomes: Vec<GroupOutcome> = parallel
            .par_iter()
            .map(|(language, group, batch_config)| self.process_language_group(language, group, batch_config))
            .collect();
        outcomes.extend(
            inline
                .iter()
                .map(|(language, group, batch_config)| self.process_language_group(language, group, batch_config)),
        );

        let mut result = BatchProcessingResult {
            results: HashMap::with_capacity(files.len()),
            processed_files: 0,
            failed_files: 0,
            success: true,
        };
        for outcome in outcomes {
            result.processed_files += outcome.processed;
            result.failed_files += outcome.failed;
            result.results.extend(outcome.results);
        }

        info!(
            "📦 Batch of {} files: {} processed, {} failed in {:.1}ms",
            files.len(),
            result.processed_files,
            result.failed_files,
            started.elapsed().as_secs_f64() * 1000.0
        );
        result
    }

    fn process_language_group(
        &self,
        language: &str,
        files: &[&FileInput],
        batch_config: &BatchConfig,
    ) -> GroupOutcome {
        debug!(
            "Processing {} {} files (sharing={}, parallel={})",
            files.len(),
            language,
            batch_config.resource_sharing,
            batch_config.parallel_processing
        );

        // Unsupported languages never need a parser; extraction skips them cheaply
        let shares_parser = batch_config.resource_sharing
            && self.config.language_config(language).has_structural_support;
        let mut lease = if shares_parser {
            self.extractor
                .resource_manager()
                .acquire_with_multiplier(language, batch_config.timeout_multiplier)
        } else {
            None
        };
        if shares_parser && lease.is_none() {
            // The checkout already waited out the timeout once; do not wait again per file
            warn!(
                "⏱️ No parser for {} within the timeout, failing {} files",
                language,
                files.len()
            );
            return GroupOutcome {
                results: files
                    .iter()
                    .map(|file| (file.file_path.clone(), Vec::new()))
                    .collect(),
                processed: 0,
                failed: files.len(),
            };
        }

        let mut outcome = GroupOutcome::default();
        for file in files {
            let extracted = catch_unwind(AssertUnwindSafe(|| match lease.as_mut() {
                Some(lease) => self.extractor.extract_with_lease(
                    lease,
                    &file.text,
                    &file.file_path,
                    &file.file_hash,
                    language,
                ),
                None => self
                    .extractor
                    .extract(&file.text, &file.file_path, &file.file_hash, language),
            }));

            match extracted {
                Ok(result) if result.success => {
                    let mut blocks = result.blocks;
                    blocks.truncate(batch_config.max_blocks_per_file);
                    outcome.processed += 1;
                    outcome.results.push((file.file_path.clone(), blocks));
                }
                Ok(_) => {
                    outcome.failed += 1;
                    outcome.results.push((file.file_path.clone(), Vec::new()));
                }
                Err(_) => {
                    self.error_handler.handle_error(
                        &ChunkError::MalformedSource {
                            file_path: file.file_path.clone(),
                            reason: "extraction panicked".to_string(),
                        },
                        ErrorContext::new("batch_processor", "process_language_group")
                            .with_language(language)
                            .with_file(file.file_path.as_str()),
                    );
                    outcome.failed += 1;
                    outcome.results.push((file.file_path.clone(), Vec::new()));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_manager::QueryManager;
    use crate::resource_manager::ResourceManager;

    fn processor_with(config: Config) -> BatchProcessor {
        let config = Arc::new(config);
        let handler = Arc::new(ErrorHandler::new());
        let extractor = Arc::new(BlockExtractor::new(
            config.clone(),
            Arc::new(QueryManager::new(&config, handler.clone())),
            Arc::new(ResourceManager::new(config.clone(), handler.clone())),
            handler.clone(),
        ));
        BatchProcessor::new(config, Arc::new(LanguageDetector::new()), extractor, handler)
    }

    fn processor() -> BatchProcessor {
        processor_with(Config::default())
    }

    fn file(path: &str, text: &str) -> FileInput {
        FileInput::new(text, path, crate::models::hash_content(text))
    }

    #[test]
    fn test_empty_batch() {
        let result = processor().process_batch(&[]);
        assert!(result.success);
        assert!(result.results.is_empty());
        assert_eq!((result.processed_files, result.failed_files), (0, 0));
    }

    #[test]
    fn test_every_file_gets_an_entry() {
        let files = vec![
            file("a.py", "def f():\n    return 1"),
            file("b.py", "def (((:\n  \u{0}\u{0} ]]]"),
            file("c.xyz", "garbage"),
        ];
        let result = processor().process_batch(&files);

        assert!(result.success);
        assert_eq!(result.results.len(), 3);
        assert_eq!(result.processed_files + result.failed_files, 3);
        assert_eq!(result.results["a.py"][0].identifier, "f");
        assert!(result.results["c.xyz"].is_empty());
    }

    #[test]
    fn test_group_by_language_keeps_order() {
        let files = vec![
            file("z.py", "x = 1"),
            file("m.rs", "fn m() {}"),
            file("a.py", "y = 2"),
            file("README", "hello"),
        ];
        let processor = processor();
        let groups = processor.group_by_language(&files);

        let python: Vec<&str> = groups["python"].iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(python, vec!["z.py", "a.py"]);
        assert_eq!(groups["rust"].len(), 1);
        assert_eq!(groups[UNKNOWN_LANGUAGE].len(), 1);
    }

    #[test]
    fn test_optimize_batch_config() {
        let processor = processor();

        let rust = processor.optimize_batch_config("rust", 3);
        assert_eq!(rust.max_blocks_per_file, 30);
        assert_eq!(rust.timeout_multiplier, 0.8);
        assert!(rust.resource_sharing);
        assert!(!rust.parallel_processing);

        let big = processor.optimize_batch_config("python", 11);
        assert!(big.parallel_processing);
        assert_eq!(big.timeout_multiplier, 1.2);
        assert_eq!(big.max_blocks_per_file, 100);
    }

    #[test]
    fn test_large_multi_language_batch_runs_in_parallel() {
        let mut files = Vec::new();
        for i in 0..12 {
            files.push(file(&format!("p{}.py", i), &format!("def f{}():\n    pass\n", i)));
            files.push(file(&format!("r{}.rs", i), &format!("fn r{}() {{}}\n", i)));
        }
        let result = processor().process_batch(&files);

        assert_eq!(result.results.len(), 24);
        assert_eq!(result.processed_files, 24);
        assert_eq!(result.failed_files, 0);
        assert_eq!(result.results["r7.rs"][0].identifier, "r7");
    }

    #[test]
    fn test_sequential_mode_matches_parallel() {
        let files: Vec<FileInput> = (0..12)
            .map(|i| file(&format!("s{}.go", i), &format!("package m\nfunc F{}() {{}}\n", i)))
            .collect();

        let parallel = processor().process_batch(&files);
        let sequential = processor_with(Config {
            parallel_languages: false,
            ..Config::default()
        })
        .process_batch(&files);

        assert_eq!(parallel.results, sequential.results);
        assert_eq!(sequential.processed_files, 12);
    }

    #[test]
    fn test_group_fails_fast_when_parser_is_held() {
        let processor = processor_with(Config {
            timeout_seconds: 0.05,
            ..Config::default()
        });
        let resources = processor.extractor.resource_manager().clone();
        let held = resources.acquire_resources("python").unwrap();

        let files: Vec<FileInput> = (0..5)
            .map(|i| file(&format!("w{}.py", i), "def f():\n    pass\n"))
            .collect();
        let result = processor.process_batch(&files);

        assert_eq!(result.results.len(), 5);
        assert_eq!(result.failed_files, 5);
        assert_eq!(result.processed_files, 0);
        // One wait for the whole group, not one per file
        assert_eq!(resources.get_resource_usage().timeouts, 1);

        drop(held);
        assert_eq!(processor.process_batch(&files).processed_files, 5);
    }
}
