//! BlockExtractor - structural blocks from a parsed tree
//!
//! Strategies are tried in order and the first one that yields blocks wins:
//! primary query, fallback query, structural node enumeration, whole file.
//! Every outcome is an [`ExtractionResult`]; nothing escapes as a panic.

use super::adapter::{CanonicalCapture, NormalizedCaptures, QueryResultAdapter};
use super::structural::{resolve_name_node, structural_captures};
use crate::config::Config;
use crate::errors::{ChunkError, ErrorContext, ErrorHandler, ErrorSeverity};
use crate::language::has_grammar;
use crate::models::{CodeBlock, ExtractionResult};
use crate::query_manager::QueryManager;
use crate::queries::get_query_for_language;
use crate::resource_manager::{ParserLease, ResourceManager};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use tree_sitter::{Node, Query};

/// Longest identifier kept; longer names are cut at a char boundary.
const MAX_IDENTIFIER_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    PrimaryQuery,
    FallbackQuery,
    Structural,
    WholeFile,
}

impl ExtractionStrategy {
    pub const ORDER: [ExtractionStrategy; 4] = [
        ExtractionStrategy::PrimaryQuery,
        ExtractionStrategy::FallbackQuery,
        ExtractionStrategy::Structural,
        ExtractionStrategy::WholeFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::PrimaryQuery => "primary_query",
            ExtractionStrategy::FallbackQuery => "fallback_query",
            ExtractionStrategy::Structural => "structural",
            ExtractionStrategy::WholeFile => "whole_file",
        }
    }
}

/// Identity of the file being extracted.
#[derive(Debug, Clone, Copy)]
struct FileRef<'a> {
    text: &'a str,
    file_path: &'a str,
    file_hash: &'a str,
    language: &'a str,
}

pub struct BlockExtractor {
    config: Arc<Config>,
    query_manager: Arc<QueryManager>,
    resource_manager: Arc<ResourceManager>,
    error_handler: Arc<ErrorHandler>,
}

impl BlockExtractor {
    pub fn new(
        config: Arc<Config>,
        query_manager: Arc<QueryManager>,
        resource_manager: Arc<ResourceManager>,
        error_handler: Arc<ErrorHandler>,
    ) -> Self {
        Self {
            config,
            query_manager,
            resource_manager,
            error_handler,
        }
    }

    pub fn resource_manager(&self) -> &Arc<ResourceManager> {
        &self.resource_manager
    }

    /// Convenience form: just the blocks.
    pub fn extract_blocks(
        &self,
        text: &str,
        file_path: &str,
        file_hash: &str,
        language: &str,
    ) -> Vec<CodeBlock> {
        self.extract(text, file_path, file_hash, language).blocks
    }

    /// Full extraction, checking out a parser for this one file.
    pub fn extract(
        &self,
        text: &str,
        file_path: &str,
        file_hash: &str,
        language: &str,
    ) -> ExtractionResult {
        let started = Instant::now();
        if let Some(skipped) = self.precheck(text, file_path, language) {
            return skipped.with_elapsed(started);
        }

        let Some(mut lease) = self.resource_manager.acquire_resources(language) else {
            return ExtractionResult::failed(format!("no parser available for {}", language))
                .with_elapsed(started);
        };
        self.extract_with_lease(&mut lease, text, file_path, file_hash, language)
    }

    /// Extraction with a parser the caller already holds (batch path).
    pub fn extract_with_lease(
        &self,
        lease: &mut ParserLease,
        text: &str,
        file_path: &str,
        file_hash: &str,
        language: &str,
    ) -> ExtractionResult {
        let started = Instant::now();
        if let Some(skipped) = self.precheck(text, file_path, language) {
            return skipped.with_elapsed(started);
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let Some(tree) = lease.parse(text) else {
                return Err(ChunkError::MalformedSource {
                    file_path: file_path.to_string(),
                    reason: "parser returned no tree".to_string(),
                });
            };
            Ok(self.extract_blocks_from_root_node(
                tree.root_node(),
                text,
                file_path,
                file_hash,
                language,
            ))
        }));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => self.fail(err, file_path, language, "parse"),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                self.fail(
                    ChunkError::MalformedSource {
                        file_path: file_path.to_string(),
                        reason: format!("extraction panicked: {}", reason),
                    },
                    file_path,
                    language,
                    "extract_blocks",
                )
            }
        };
        result.with_elapsed(started)
    }

    /// Empty text and unsupported languages produce an empty, successful result.
    fn precheck(&self, text: &str, file_path: &str, language: &str) -> Option<ExtractionResult> {
        if text.trim().is_empty() {
            return Some(ExtractionResult::succeeded(
                Vec::new(),
                BTreeMap::from([("skipped".to_string(), "empty_text".to_string())]),
            ));
        }
        if !has_grammar(language) || get_query_for_language(language).is_none() {
            self.error_handler.handle_error(
                &ChunkError::UnsupportedLanguage(language.to_string()),
                ErrorContext::new("block_extractor", "extract_blocks")
                    .with_language(language)
                    .with_file(file_path),
            );
            return Some(ExtractionResult::succeeded(
                Vec::new(),
                BTreeMap::from([("skipped".to_string(), "unsupported_language".to_string())]),
            ));
        }
        None
    }

    fn fail(
        &self,
        err: ChunkError,
        file_path: &str,
        language: &str,
        operation: &'static str,
    ) -> ExtractionResult {
        let response = self.error_handler.handle_error(
            &err,
            ErrorContext::new("block_extractor", operation)
                .with_language(language)
                .with_file(file_path),
        );
        ExtractionResult::failed(response.message)
    }

    /// Steps after parsing: query, normalize, fall back, build, bound.
    pub fn extract_blocks_from_root_node(
        &self,
        root: Node<'_>,
        text: &str,
        file_path: &str,
        file_hash: &str,
        language: &str,
    ) -> ExtractionResult {
        let started = Instant::now();
        if let Some(skipped) = self.precheck(text, file_path, language) {
            return skipped.with_elapsed(started);
        }
        let file = FileRef {
            text,
            file_path,
            file_hash,
            language,
        };

        let mut total_captures = 0usize;
        let mut skipped_captures = 0usize;
        let mut chosen: Option<(ExtractionStrategy, Vec<CodeBlock>)> = None;

        for strategy in ExtractionStrategy::ORDER {
            let blocks = match strategy {
                ExtractionStrategy::PrimaryQuery => self
                    .query_manager
                    .get_compiled_query(language)
                    .map(|query| self.run_query(&query, root, file, &mut total_captures, &mut skipped_captures))
                    .unwrap_or_default(),
                ExtractionStrategy::FallbackQuery => self
                    .query_manager
                    .get_compiled_fallback_query(language)
                    .map(|query| self.run_query(&query, root, file, &mut total_captures, &mut skipped_captures))
                    .unwrap_or_default(),
                ExtractionStrategy::Structural => {
                    let captures = structural_captures(root, language);
                    total_captures += captures.len();
                    self.build_blocks(&captures, file)
                }
                ExtractionStrategy::WholeFile => {
                    if self.config.whole_file_fallback {
                        self.whole_file_block(file).into_iter().collect()
                    } else {
                        Vec::new()
                    }
                }
            };

            if self.config.debug_logging {
                debug!(
                    "{} [{}]: {} produced {} blocks",
                    file_path,
                    language,
                    strategy.as_str(),
                    blocks.len()
                );
            }
            if !blocks.is_empty() {
                chosen = Some((strategy, blocks));
                break;
            }
        }

        let (strategy, blocks) = match chosen {
            Some((strategy, blocks)) => (Some(strategy), self.bound_blocks(blocks, language)),
            None => (None, Vec::new()),
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("language_key".to_string(), language.to_string());
        metadata.insert(
            "strategy".to_string(),
            strategy.map(|s| s.as_str()).unwrap_or("none").to_string(),
        );
        metadata.insert("blocks_found".to_string(), blocks.len().to_string());
        metadata.insert("total_captures".to_string(), total_captures.to_string());
        metadata.insert("skipped_captures".to_string(), skipped_captures.to_string());

        ExtractionResult::succeeded(blocks, metadata).with_elapsed(started)
    }

    fn run_query(
        &self,
        query: &Query,
        root: Node<'_>,
        file: FileRef<'_>,
        total_captures: &mut usize,
        skipped_captures: &mut usize,
    ) -> Vec<CodeBlock> {
        let normalized = QueryResultAdapter::from_matches(query, root, file.text).normalize();
        self.note_normalization(&normalized, file);
        *total_captures += normalized.total_records;
        *skipped_captures += normalized.skipped_records;
        self.build_blocks(&normalized.captures, file)
    }

    fn note_normalization(&self, normalized: &NormalizedCaptures<'_>, file: FileRef<'_>) {
        if normalized.skipped_records == 0 {
            return;
        }
        self.error_handler.handle_error_with_severity(
            &ChunkError::InternalNormalization(format!(
                "{} of {} capture records had no block capture",
                normalized.skipped_records, normalized.total_records
            )),
            ErrorContext::new("block_extractor", "normalize_captures")
                .with_language(file.language)
                .with_file(file.file_path),
            ErrorSeverity::Low,
        );
    }

    /// Canonicalize an externally produced capture set and bound it.
    pub fn blocks_from_adapter(
        &self,
        adapter: QueryResultAdapter<'_>,
        text: &str,
        file_path: &str,
        file_hash: &str,
        language: &str,
    ) -> Vec<CodeBlock> {
        let file = FileRef {
            text,
            file_path,
            file_hash,
            language,
        };
        let normalized = adapter.normalize();
        self.note_normalization(&normalized, file);
        let blocks = self.build_blocks(&normalized.captures, file);
        self.bound_blocks(blocks, language)
    }

    fn build_blocks(&self, captures: &[CanonicalCapture<'_>], file: FileRef<'_>) -> Vec<CodeBlock> {
        captures
            .iter()
            .filter_map(|capture| self.build_block(capture, file))
            .collect()
    }

    fn build_block(&self, capture: &CanonicalCapture<'_>, file: FileRef<'_>) -> Option<CodeBlock> {
        let body = capture.body_node;
        let start_row = body.start_position().row;
        let end = body.end_position();
        // A node that ends at column 0 stops at the previous line's newline
        let end_row = if end.column == 0 && end.row > start_row {
            end.row - 1
        } else {
            end.row
        };

        let (content, start_line, end_line) = match file.text.get(body.byte_range()) {
            Some(slice) if end_row >= start_row => (slice, start_row + 1, end_row + 1),
            _ => {
                // Positions do not fit this text; keep the block as the whole file
                debug!(
                    "Invalid node range {:?} in {}, using whole text",
                    body.byte_range(),
                    file.file_path
                );
                (file.text, 1, line_count(file.text))
            }
        };

        let trimmed_chars = content.trim().chars().count();
        if trimmed_chars == 0 || trimmed_chars < self.config.min_block_chars {
            return None;
        }

        let identifier = capture
            .name_node
            .or_else(|| resolve_name_node(body, file.language))
            .and_then(|node| file.text.get(node.byte_range()))
            .and_then(clean_identifier)
            .unwrap_or_else(|| format!("{}:{}", capture.kind, start_line));

        Some(CodeBlock {
            block_type: capture.kind.to_string(),
            identifier,
            file_path: file.file_path.to_string(),
            file_hash: file.file_hash.to_string(),
            start_line,
            end_line,
            content: content.to_string(),
        })
    }

    fn whole_file_block(&self, file: FileRef<'_>) -> Option<CodeBlock> {
        if file.text.trim().chars().count() < self.config.min_block_chars.max(1) {
            return None;
        }
        let identifier = Path::new(file.file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.file_path.to_string());
        Some(CodeBlock {
            block_type: "file".to_string(),
            identifier,
            file_path: file.file_path.to_string(),
            file_hash: file.file_hash.to_string(),
            start_line: 1,
            end_line: line_count(file.text),
            content: file.text.to_string(),
        })
    }

    /// Deduplicate, then apply per-type limits and the per-file cap.
    fn bound_blocks(&self, blocks: Vec<CodeBlock>, language: &str) -> Vec<CodeBlock> {
        let max_blocks = self.config.language_config(language).max_blocks_per_file;
        let mut seen = HashSet::new();
        let mut per_type: HashMap<String, usize> = HashMap::new();
        let mut bounded = Vec::new();

        for block in blocks {
            if !seen.insert(block.dedup_key()) {
                continue;
            }
            let count = per_type.entry(block.block_type.clone()).or_insert(0);
            if *count >= self.type_limit(&block.block_type) {
                continue;
            }
            *count += 1;
            bounded.push(block);
            if bounded.len() >= max_blocks {
                break;
            }
        }
        bounded
    }

    fn type_limit(&self, block_type: &str) -> usize {
        match block_type {
            "function" | "method" | "constructor" => self.config.max_functions_per_file,
            "impl" => self.config.max_impl_blocks_per_file,
            _ => self.config.max_classes_per_file,
        }
    }
}

fn line_count(text: &str) -> usize {
    text.lines().count().max(1)
}

fn clean_identifier(raw: &str) -> Option<String> {
    let first_line = raw.lines().next().unwrap_or("").trim();
    let unquoted = first_line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    if unquoted.is_empty() {
        return None;
    }
    Some(unquoted.chars().take(MAX_IDENTIFIER_CHARS).collect())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
