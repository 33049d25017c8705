//! Skip-pattern matching for pre-flight file filtering
//!
//! Supports two pattern types:
//! - Directory patterns (ending with /): match a whole path segment, never a substring
//! - Glob patterns (`*.log`, `temp_*`, `package-lock.json`): matched against the file
//!   name first, then against the full `/`-normalized path
//!
//! Word boundary: "build/" matches "build" and "src/build/x.js" but NOT
//! "prebuild/x.js" or "build-tools/x.js".

use glob::Pattern;
use std::path::Path;
use tracing::warn;

/// Skip patterns compiled once per engine.
#[derive(Debug, Clone, Default)]
pub struct SkipPatterns {
    directories: Vec<String>,
    globs: Vec<Pattern>,
}

impl SkipPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Self::default();
        for raw in patterns {
            let pattern = raw.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            if let Some(dir) = pattern.strip_suffix('/') {
                compiled.directories.push(dir.to_string());
                continue;
            }
            match Pattern::new(pattern) {
                Ok(glob) => compiled.globs.push(glob),
                Err(e) => warn!("⚠️ Ignoring invalid skip pattern '{}': {}", pattern, e),
            }
        }
        compiled
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.globs.is_empty()
    }

    /// The first pattern that matches `path`, for diagnostics.
    pub fn matching_pattern(&self, path: &Path) -> Option<String> {
        // Normalize to Unix-style so patterns behave the same on Windows
        let path_str = path.to_string_lossy().replace('\\', "/");
        let segments: Vec<&str> = path_str.split('/').filter(|s| !s.is_empty()).collect();

        for dir in &self.directories {
            if segments.iter().any(|segment| segment == dir) {
                return Some(format!("{}/", dir));
            }
        }

        let file_name = segments.last().copied().unwrap_or("");
        self.globs
            .iter()
            .find(|glob| glob.matches(file_name) || glob.matches(&path_str))
            .map(|glob| glob.as_str().to_string())
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matching_pattern(path).is_some()
    }
}
