//! Data records shared across the engine.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A structural unit of code ready for embedding.
///
/// Lines are 1-indexed and inclusive; `content` is the literal source slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub identifier: String,
    pub file_path: String,
    pub file_hash: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

impl CodeBlock {
    /// Key used to drop duplicate blocks.
    pub fn dedup_key(&self) -> (String, String, usize, usize) {
        (
            self.block_type.clone(),
            self.identifier.clone(),
            self.start_line,
            self.end_line,
        )
    }
}

/// Outcome of one extraction call. Always produced, even on failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    pub blocks: Vec<CodeBlock>,
    pub success: bool,
    pub error_message: Option<String>,
    pub processing_time_ms: f64,
    pub metadata: BTreeMap<String, String>,
}

impl ExtractionResult {
    pub fn succeeded(blocks: Vec<CodeBlock>, metadata: BTreeMap<String, String>) -> Self {
        Self {
            blocks,
            success: true,
            error_message: None,
            processing_time_ms: 0.0,
            metadata,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            blocks: Vec::new(),
            success: false,
            error_message: Some(message.into()),
            processing_time_ms: 0.0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_elapsed(mut self, started: std::time::Instant) -> Self {
        self.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self
    }
}

/// Fan-in of a batch: exactly one entry per input file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchProcessingResult {
    pub results: HashMap<String, Vec<CodeBlock>>,
    pub processed_files: usize,
    pub failed_files: usize,
    pub success: bool,
}

/// One file handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub text: String,
    pub file_path: String,
    pub file_hash: String,
}

impl FileInput {
    pub fn new(
        text: impl Into<String>,
        file_path: impl Into<String>,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            file_path: file_path.into(),
            file_hash: file_hash.into(),
        }
    }

    /// Read a file as UTF-8 (lossy) and hash its content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let file_hash = hash_content(&text);
        Ok(Self {
            text,
            file_path: path.to_string_lossy().into_owned(),
            file_hash,
        })
    }
}

/// Hash content using blake3 (hex digest).
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}
