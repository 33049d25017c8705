//! Engine configuration.
//!
//! Loaded from JSON (file or string) with environment overrides on top. The
//! per-language [`LanguageConfig`] is resolved from built-in defaults plus
//! `language_overrides`.

use crate::errors::{ChunkError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Which chunker the outer selector should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategyKind {
    #[default]
    Lines,
    Tokens,
    Treesitter,
}

impl std::str::FromStr for ChunkingStrategyKind {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lines" => Ok(Self::Lines),
            "tokens" => Ok(Self::Tokens),
            "treesitter" | "tree-sitter" | "tree_sitter" => Ok(Self::Treesitter),
            other => Err(ChunkError::Config(format!(
                "unknown chunking strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking_strategy: ChunkingStrategyKind,
    pub use_structural_chunking: bool,

    // Pre-flight filtering
    pub skip_test_files: bool,
    pub skip_examples: bool,
    pub skip_patterns: Vec<String>,
    pub max_file_size_bytes: u64,

    // Extraction limits
    pub max_blocks_per_file: usize,
    pub max_functions_per_file: usize,
    pub max_classes_per_file: usize,
    pub max_impl_blocks_per_file: usize,
    pub min_block_chars: usize,

    /// Budget for parser checkout, scaled by the language's timeout multiplier.
    pub timeout_seconds: f64,
    pub debug_logging: bool,

    // Query cache
    pub query_cache_size: usize,
    pub query_cache_ttl_seconds: u64,
    pub preload_languages: Vec<String>,

    // Fallbacks
    pub fallback_to_lines: bool,
    pub whole_file_fallback: bool,

    pub parallel_languages: bool,

    // Line / token chunkers
    pub line_chunk_max_chars: usize,
    pub token_chunk_size: usize,
    pub token_chunk_overlap: usize,

    pub language_overrides: HashMap<String, LanguageOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking_strategy: ChunkingStrategyKind::Treesitter,
            use_structural_chunking: true,
            skip_test_files: true,
            skip_examples: true,
            skip_patterns: default_skip_patterns(),
            max_file_size_bytes: 512 * 1024,
            max_blocks_per_file: 100,
            max_functions_per_file: 50,
            max_classes_per_file: 20,
            max_impl_blocks_per_file: 30,
            min_block_chars: 1,
            timeout_seconds: 60.0,
            debug_logging: false,
            query_cache_size: 100,
            query_cache_ttl_seconds: 300,
            preload_languages: ["python", "javascript", "typescript", "rust", "go"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_to_lines: true,
            whole_file_fallback: true,
            parallel_languages: true,
            line_chunk_max_chars: 1000,
            token_chunk_size: 1000,
            token_chunk_overlap: 200,
            language_overrides: HashMap::new(),
        }
    }
}

fn default_skip_patterns() -> Vec<String> {
    [
        "*.min.js",
        "*.bundle.js",
        "*.min.css",
        "package-lock.json",
        "yarn.lock",
        "*.lock",
        "target/",
        "build/",
        "dist/",
        "__pycache__/",
        "node_modules/",
        "*.log",
        "*.tmp",
        "*.temp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Partial per-language tuning from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageOverride {
    pub max_file_size_bytes: Option<u64>,
    pub max_blocks_per_file: Option<usize>,
    pub timeout_multiplier: Option<f64>,
}

/// Resolved, immutable tuning for one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageConfig {
    pub language_key: String,
    pub max_file_size_bytes: u64,
    pub max_blocks_per_file: usize,
    pub timeout_multiplier: f64,
    pub has_structural_support: bool,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file and apply environment overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_json_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `CODE_INDEX_EMBED_TIMEOUT` and `CODE_INDEX_CHUNKING_STRATEGY`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CODE_INDEX_EMBED_TIMEOUT") {
            self.timeout_seconds = raw.trim().parse::<f64>().map_err(|_| {
                ChunkError::Config(format!("CODE_INDEX_EMBED_TIMEOUT is not a number: {}", raw))
            })?;
        }
        if let Some(raw) = lookup("CODE_INDEX_CHUNKING_STRATEGY") {
            self.chunking_strategy = raw.parse()?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_blocks_per_file == 0 {
            return Err(ChunkError::Config("max_blocks_per_file must be > 0".into()));
        }
        if self.max_file_size_bytes == 0 {
            return Err(ChunkError::Config("max_file_size_bytes must be > 0".into()));
        }
        if self.query_cache_size == 0 {
            return Err(ChunkError::Config("query_cache_size must be > 0".into()));
        }
        if !(self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0) {
            return Err(ChunkError::Config("timeout_seconds must be positive".into()));
        }
        if self.token_chunk_overlap >= self.token_chunk_size {
            return Err(ChunkError::Config(
                "token_chunk_overlap must be smaller than token_chunk_size".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the tuning for a language key.
    ///
    /// Unknown languages get a permissive default without structural support.
    pub fn language_config(&self, language_key: &str) -> LanguageConfig {
        let (max_blocks, multiplier) = match language_key {
            // Large impl-heavy files time out easily
            "rust" => (self.max_blocks_per_file.min(30), 0.8),
            _ => (self.max_blocks_per_file, 1.0),
        };

        let mut resolved = LanguageConfig {
            language_key: language_key.to_string(),
            max_file_size_bytes: self.max_file_size_bytes,
            max_blocks_per_file: max_blocks,
            timeout_multiplier: multiplier,
            has_structural_support: crate::language::has_grammar(language_key)
                && crate::queries::get_query_for_language(language_key).is_some(),
        };

        if let Some(over) = self.language_overrides.get(language_key) {
            if let Some(size) = over.max_file_size_bytes {
                resolved.max_file_size_bytes = size;
            }
            if let Some(max_blocks) = over.max_blocks_per_file {
                resolved.max_blocks_per_file = max_blocks.max(1);
            }
            if let Some(multiplier) = over.timeout_multiplier {
                if multiplier.is_finite() && multiplier > 0.0 {
                    resolved.timeout_multiplier = multiplier;
                }
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes, 512 * 1024);
        assert!(config.skip_patterns.iter().any(|p| p == "*.log"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            Config::from_json_str(r#"{"max_blocks_per_file": 7, "chunking_strategy": "lines"}"#)
                .unwrap();
        assert_eq!(config.max_blocks_per_file, 7);
        assert_eq!(config.chunking_strategy, ChunkingStrategyKind::Lines);
        assert_eq!(config.query_cache_size, 100);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        assert!(Config::from_json_str(r#"{"max_blocks_per_file": 0}"#).is_err());
        assert!(Config::from_json_str(r#"{"chunking_strategy": "words"}"#).is_err());
    }

    #[test]
    fn test_from_file_reports_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("code_index.json");
        fs::write(&path, r#"{"debug_logging": true}"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert!(config.debug_logging);

        let missing = Config::from_file(&temp_dir.path().join("missing.json"));
        let message = format!("{:#}", missing.unwrap_err());
        assert!(message.contains("Failed to read config file"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides_from(|key| match key {
                "CODE_INDEX_EMBED_TIMEOUT" => Some("15".to_string()),
                "CODE_INDEX_CHUNKING_STRATEGY" => Some("tokens".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.timeout_seconds, 15.0);
        assert_eq!(config.chunking_strategy, ChunkingStrategyKind::Tokens);

        let bad = config.apply_overrides_from(|key| {
            (key == "CODE_INDEX_EMBED_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_language_config_rust_is_conservative() {
        let config = Config::default();
        let rust = config.language_config("rust");
        assert_eq!(rust.max_blocks_per_file, 30);
        assert_eq!(rust.timeout_multiplier, 0.8);
        assert!(rust.has_structural_support);
    }

    #[test]
    fn test_language_config_unknown_is_permissive() {
        let config = Config::default();
        let unknown = config.language_config("cobol");
        assert!(!unknown.has_structural_support);
        assert_eq!(unknown.max_blocks_per_file, 100);
        assert_eq!(unknown.timeout_multiplier, 1.0);
    }

    #[test]
    fn test_language_overrides_apply() {
        let config = Config::from_json_str(
            r#"{"language_overrides": {"python": {"max_blocks_per_file": 5, "timeout_multiplier": 2.0}}}"#,
        )
        .unwrap();
        let python = config.language_config("python");
        assert_eq!(python.max_blocks_per_file, 5);
        assert_eq!(python.timeout_multiplier, 2.0);
        assert_eq!(python.max_file_size_bytes, 512 * 1024);
    }
}
