//! Error taxonomy and the shared error handler.
//!
//! Every per-file failure in the engine is converted into a [`ChunkError`] and
//! reported through one [`ErrorHandler`], which logs a structured event and
//! keeps failure counters for diagnostics. Only [`ChunkError::VersionIncompatible`]
//! is fatal; everything else degrades to an empty result.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

/// Errors produced by the chunking engine.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// No grammar or query is available for the language. A routed skip, not a fault.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Query text could not be compiled against the grammar.
    #[error("query compilation failed for {language}: {message}")]
    QueryCompilation { language: String, message: String },

    /// Parser pool could not hand out a parser (unknown grammar, timeout).
    #[error("resources unavailable for {language}: {reason}")]
    ResourceUnavailable { language: String, reason: String },

    /// Parsing or query execution produced nothing usable.
    #[error("malformed source in {file_path}: {reason}")]
    MalformedSource { file_path: String, reason: String },

    /// Pre-flight rejection of a file.
    #[error("file filtered: {file_path} ({reason})")]
    FileFiltered { file_path: String, reason: String },

    /// The capture adapter met a record it could not normalize.
    #[error("capture normalization failed: {0}")]
    InternalNormalization(String),

    /// The linked tree-sitter runtime cannot load the bundled grammars.
    #[error("tree-sitter version incompatible: {0}")]
    VersionIncompatible(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias using `ChunkError`.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Coarse error grouping used in logs and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Parsing,
    ResourceManagement,
    FileSystem,
    Configuration,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ChunkError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChunkError::UnsupportedLanguage(_)
            | ChunkError::QueryCompilation { .. }
            | ChunkError::MalformedSource { .. }
            | ChunkError::InternalNormalization(_) => ErrorCategory::Parsing,
            ChunkError::ResourceUnavailable { .. } | ChunkError::VersionIncompatible(_) => {
                ErrorCategory::ResourceManagement
            }
            ChunkError::FileFiltered { .. } | ChunkError::Io(_) => ErrorCategory::FileSystem,
            ChunkError::Json(_) | ChunkError::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn default_severity(&self) -> ErrorSeverity {
        match self {
            ChunkError::UnsupportedLanguage(_) | ChunkError::FileFiltered { .. } => {
                ErrorSeverity::Low
            }
            ChunkError::VersionIncompatible(_) => ErrorSeverity::Critical,
            ChunkError::Config(_) | ChunkError::Json(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }
}

/// Where an error happened.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorContext {
    pub component: &'static str,
    pub operation: &'static str,
    pub language: Option<String>,
    pub file_path: Option<String>,
}

impl ErrorContext {
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            language: None,
            file_path: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// What the handler decided about a reported error.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub context: ErrorContext,
}

/// Snapshot of failure counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureStats {
    pub total_failures: u64,
    pub failures_by_language: BTreeMap<String, u64>,
    pub failures_by_operation: BTreeMap<String, u64>,
}

/// Shared sink for every recoverable error in the engine.
///
/// Constructed once and handed to each component behind an `Arc`.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    total: AtomicU64,
    by_language: DashMap<String, u64>,
    by_operation: DashMap<String, u64>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the error with its context and bump the failure counters.
    pub fn handle_error(&self, err: &ChunkError, context: ErrorContext) -> ErrorResponse {
        self.handle_error_with_severity(err, context, err.default_severity())
    }

    pub fn handle_error_with_severity(
        &self,
        err: &ChunkError,
        context: ErrorContext,
        severity: ErrorSeverity,
    ) -> ErrorResponse {
        let category = err.category();
        let message = err.to_string();

        self.total.fetch_add(1, Ordering::Relaxed);
        let language = context.language.as_deref().unwrap_or("unknown");
        *self.by_language.entry(language.to_string()).or_insert(0) += 1;
        let operation = format!("{}.{}", context.component, context.operation);
        *self.by_operation.entry(operation).or_insert(0) += 1;

        let file_path = context.file_path.as_deref().unwrap_or("");
        match severity {
            ErrorSeverity::Low => debug!(
                component = context.component,
                operation = context.operation,
                language,
                file_path,
                ?category,
                ?severity,
                "{}",
                message
            ),
            ErrorSeverity::Medium => warn!(
                component = context.component,
                operation = context.operation,
                language,
                file_path,
                ?category,
                ?severity,
                "{}",
                message
            ),
            ErrorSeverity::High | ErrorSeverity::Critical => error!(
                component = context.component,
                operation = context.operation,
                language,
                file_path,
                ?category,
                ?severity,
                "{}",
                message
            ),
        }

        ErrorResponse {
            message,
            category,
            severity,
            context,
        }
    }

    pub fn failure_stats(&self) -> FailureStats {
        FailureStats {
            total_failures: self.total.load(Ordering::Relaxed),
            failures_by_language: self
                .by_language
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            failures_by_operation: self
                .by_operation
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.by_language.clear();
        self.by_operation.clear();
    }
}
