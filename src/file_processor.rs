//! Pre-flight file filtering and per-language tuning.
//!
//! Purely name and content based: nothing here touches a parser.

use crate::config::{Config, LanguageConfig};
use crate::detector::LanguageDetector;
use crate::errors::{ChunkError, ErrorContext, ErrorHandler, Result};
use crate::utils::skip_patterns::SkipPatterns;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_BYTES: usize = 8192;

pub struct FileProcessor {
    config: Arc<Config>,
    detector: Arc<LanguageDetector>,
    skip_patterns: SkipPatterns,
    error_handler: Arc<ErrorHandler>,
}

impl FileProcessor {
    pub fn new(
        config: Arc<Config>,
        detector: Arc<LanguageDetector>,
        error_handler: Arc<ErrorHandler>,
    ) -> Self {
        let skip_patterns = SkipPatterns::new(&config.skip_patterns);
        Self {
            config,
            detector,
            skip_patterns,
            error_handler,
        }
    }

    /// Size ceiling for `path`: the detected language's limit, else the global one.
    pub fn max_file_size_for(&self, path: &Path) -> u64 {
        match self.detector.detect(&path.to_string_lossy()) {
            Some(language) => self.config.language_config(language).max_file_size_bytes,
            None => self.config.max_file_size_bytes,
        }
    }

    /// True when the file should be indexed.
    pub fn validate_file(&self, path: &Path) -> bool {
        match self.check_file(path) {
            Ok(()) => true,
            Err(err) => {
                debug!("Skipping {}: {}", path.display(), err);
                false
            }
        }
    }

    /// Like [`validate_file`](Self::validate_file) but says why a file was rejected.
    pub fn check_file(&self, path: &Path) -> Result<()> {
        let filtered = |reason: String| ChunkError::FileFiltered {
            file_path: path.display().to_string(),
            reason,
        };

        // Name-based checks first, they are free
        if let Some(pattern) = self.skip_patterns.matching_pattern(path) {
            return Err(filtered(format!("matches skip pattern '{}'", pattern)));
        }
        if self.config.skip_test_files && is_test_file(path) {
            return Err(filtered("test file".to_string()));
        }
        if self.config.skip_examples && is_example_file(path) {
            return Err(filtered("example file".to_string()));
        }

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(filtered("file does not exist".to_string()));
            }
            Err(e) => return Err(self.unreadable(path, e)),
        };
        if !metadata.is_file() {
            return Err(filtered("not a regular file".to_string()));
        }
        if metadata.len() == 0 {
            return Err(filtered("empty file".to_string()));
        }
        let max_size = self.max_file_size_for(path);
        if metadata.len() > max_size {
            return Err(filtered(format!(
                "{} bytes exceeds limit of {}",
                metadata.len(),
                max_size
            )));
        }

        let mut head = Vec::with_capacity(BINARY_SNIFF_BYTES);
        let read = File::open(path)
            .and_then(|file| file.take(BINARY_SNIFF_BYTES as u64).read_to_end(&mut head));
        if let Err(e) = read {
            return Err(self.unreadable(path, e));
        }
        if looks_binary(&head) {
            return Err(filtered("binary content".to_string()));
        }

        Ok(())
    }

    /// Permission and other IO failures are logged and reported, never raised.
    fn unreadable(&self, path: &Path, e: std::io::Error) -> ChunkError {
        if e.kind() == ErrorKind::PermissionDenied {
            warn!("🔒 Permission denied reading {}", path.display());
        }
        let err = ChunkError::Io(e);
        self.error_handler.handle_error(
            &err,
            ErrorContext::new("file_processor", "validate_file").with_file(path.display().to_string()),
        );
        err
    }

    /// Per-language tuning, or `None` when the language has no structural support.
    pub fn apply_language_optimizations(
        &self,
        path: &Path,
        language_key: &str,
    ) -> Option<LanguageConfig> {
        let resolved = self.config.language_config(language_key);
        if !resolved.has_structural_support {
            return None;
        }
        debug!(
            "Tuning for {} ({}): max_blocks={}, timeout_multiplier={}",
            path.display(),
            language_key,
            resolved.max_blocks_per_file,
            resolved.timeout_multiplier
        );
        Some(resolved)
    }

    /// Size-only check for callers that already know the byte size.
    pub fn filter_by_criteria(&self, path: &Path, size_bytes: u64) -> bool {
        if size_bytes > self.max_file_size_for(path) {
            debug!(
                "Skipping {}: {} bytes exceeds limit",
                path.display(),
                size_bytes
            );
            return false;
        }
        true
    }
}

fn looks_binary(head: &[u8]) -> bool {
    head.contains(&0)
}

fn lower_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn has_dir_segment(path: &Path, segment: &str) -> bool {
    path.parent()
        .map(|parent| {
            parent.components().any(|component| {
                component
                    .as_os_str()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(segment)
            })
        })
        .unwrap_or(false)
}

/// `test_*`, `*_test.*`, `*.test.*`, `*.spec.*`, or anything under `tests/`.
pub fn is_test_file(path: &Path) -> bool {
    let name = lower_file_name(path);
    let stem = name.split('.').next().unwrap_or("");
    name.starts_with("test_")
        || stem.ends_with("_test")
        || name.contains(".test.")
        || name.contains(".spec.")
        || has_dir_segment(path, "tests")
}

/// `example*`, `sample*`, `demo*`, or anything under `examples/`.
pub fn is_example_file(path: &Path) -> bool {
    let name = lower_file_name(path);
    ["example", "sample", "demo"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
        || has_dir_segment(path, "examples")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn processor(config: Config) -> FileProcessor {
        FileProcessor::new(
            Arc::new(config),
            Arc::new(LanguageDetector::new()),
            Arc::new(ErrorHandler::new()),
        )
    }

    #[test]
    fn test_accepts_regular_source_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("main.py");
        fs::write(&path, "print('hi')\n").unwrap();
        assert!(processor(Config::default()).validate_file(&path));
    }

    #[test]
    fn test_rejects_missing_empty_and_binary() {
        let temp_dir = TempDir::new().unwrap();
        let processor = processor(Config::default());

        assert!(!processor.validate_file(&temp_dir.path().join("missing.py")));

        let empty = temp_dir.path().join("empty.py");
        fs::write(&empty, "").unwrap();
        assert!(!processor.validate_file(&empty));

        let binary = temp_dir.path().join("blob.py");
        fs::write(&binary, [0x7f, 0x45, 0x00, 0x01]).unwrap();
        let err = processor.check_file(&binary).unwrap_err();
        assert!(err.to_string().contains("binary"));

        assert!(!processor.validate_file(temp_dir.path()));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.py");
        fs::write(&path, "x = 1\n".repeat(10)).unwrap();

        let config = Config {
            max_file_size_bytes: 16,
            ..Config::default()
        };
        assert!(!processor(config).validate_file(&path));
    }

    #[test]
    fn test_skip_patterns_apply() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            skip_patterns: vec!["temp_*".to_string(), "*.log".to_string()],
            ..Config::default()
        };
        let processor = processor(config);

        for name in ["temp_notes.py", "server.log"] {
            let path = temp_dir.path().join(name);
            fs::write(&path, "data\n").unwrap();
            assert!(!processor.validate_file(&path), "{} should be skipped", name);
        }
    }

    #[test]
    fn test_test_and_example_filters_are_switchable() {
        let temp_dir = TempDir::new().unwrap();
        let tests_dir = temp_dir.path().join("tests");
        fs::create_dir_all(&tests_dir).unwrap();
        let path = tests_dir.join("helpers.py");
        fs::write(&path, "def h():\n    pass\n").unwrap();

        assert!(!processor(Config::default()).validate_file(&path));

        let permissive = Config {
            skip_test_files: false,
            ..Config::default()
        };
        assert!(processor(permissive).validate_file(&path));
    }

    #[test]
    fn test_test_file_classification() {
        assert!(is_test_file(&PathBuf::from("test_parser.py")));
        assert!(is_test_file(&PathBuf::from("src/parser_test.go")));
        assert!(is_test_file(&PathBuf::from("web/app.spec.ts")));
        assert!(is_test_file(&PathBuf::from("pkg/tests/util.py")));
        assert!(!is_test_file(&PathBuf::from("src/contest.py")));
        assert!(!is_test_file(&PathBuf::from("src/testing_utils.py")));
    }

    #[test]
    fn test_example_file_classification() {
        assert!(is_example_file(&PathBuf::from("example_usage.py")));
        assert!(is_example_file(&PathBuf::from("Sample.java")));
        assert!(is_example_file(&PathBuf::from("demo.rs")));
        assert!(is_example_file(&PathBuf::from("repo/examples/basic.rs")));
        assert!(!is_example_file(&PathBuf::from("src/counterexample.py")));
    }

    #[test]
    fn test_language_optimizations() {
        let processor = processor(Config::default());
        let rust = processor
            .apply_language_optimizations(Path::new("lib.rs"), "rust")
            .unwrap();
        assert_eq!(rust.max_blocks_per_file, 30);
        assert!(processor
            .apply_language_optimizations(Path::new("x.cob"), "cobol")
            .is_none());
    }

    #[test]
    fn test_filter_by_criteria_is_size_only() {
        let processor = processor(Config::default());
        assert!(processor.filter_by_criteria(Path::new("tests/x.py"), 10));
        assert!(!processor.filter_by_criteria(Path::new("a.py"), 512 * 1024 + 1));
    }

    #[test]
    fn test_language_override_tightens_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        let python = temp_dir.path().join("module.py");
        let rust = temp_dir.path().join("module.rs");
        let body = "x = 1\n".repeat(20);
        fs::write(&python, &body).unwrap();
        fs::write(&rust, &body).unwrap();

        let config = Config::from_json_str(
            r#"{"language_overrides": {"python": {"max_file_size_bytes": 64}}}"#,
        )
        .unwrap();
        let processor = processor(config);

        assert_eq!(processor.max_file_size_for(&python), 64);
        let err = processor.check_file(&python).unwrap_err();
        assert!(err.to_string().contains("exceeds limit of 64"));
        assert!(processor.validate_file(&rust));

        assert!(!processor.filter_by_criteria(Path::new("a.py"), 65));
        assert!(processor.filter_by_criteria(Path::new("a.rs"), 65));
        assert_eq!(processor.max_file_size_for(Path::new("notes.unknown")), 512 * 1024);
    }
}
