//! File path -> canonical language key.
//!
//! Resolution order: special filename, then (case-insensitive) last extension,
//! else `None`. Results are memoized per raw path string.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

static FILENAME_TO_LANGUAGE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("dockerfile", "dockerfile"),
        ("containerfile", "dockerfile"),
        ("makefile", "make"),
        ("gnumakefile", "make"),
        ("cmakelists.txt", "cmake"),
        ("gemfile", "ruby"),
        ("rakefile", "ruby"),
        ("podfile", "ruby"),
        ("vagrantfile", "ruby"),
        ("jenkinsfile", "groovy"),
        ("build", "bazel"),
        ("build.bazel", "bazel"),
        ("workspace", "bazel"),
        ("cargo.lock", "toml"),
        ("pipfile", "toml"),
        (".bashrc", "bash"),
        (".bash_profile", "bash"),
        (".zshrc", "bash"),
        (".profile", "bash"),
    ])
});

static EXTENSION_TO_LANGUAGE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Systems
        ("rs", "rust"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("cc", "cpp"),
        ("cxx", "cpp"),
        ("hpp", "cpp"),
        ("hh", "cpp"),
        ("hxx", "cpp"),
        ("go", "go"),
        ("zig", "zig"),
        // Web
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("mjs", "javascript"),
        ("cjs", "javascript"),
        ("ts", "typescript"),
        ("mts", "typescript"),
        ("cts", "typescript"),
        ("tsx", "tsx"),
        ("html", "html"),
        ("htm", "html"),
        ("css", "css"),
        ("scss", "scss"),
        ("vue", "vue"),
        ("svelte", "svelte"),
        // Backend
        ("py", "python"),
        ("pyi", "python"),
        ("java", "java"),
        ("cs", "csharp"),
        ("php", "php"),
        ("rb", "ruby"),
        ("swift", "swift"),
        ("kt", "kotlin"),
        ("kts", "kotlin"),
        ("scala", "scala"),
        ("dart", "dart"),
        ("ex", "elixir"),
        ("exs", "elixir"),
        ("erl", "erlang"),
        ("hs", "haskell"),
        ("ml", "ocaml"),
        ("clj", "clojure"),
        ("jl", "julia"),
        ("pl", "perl"),
        ("r", "r"),
        ("sol", "solidity"),
        // Scripting
        ("lua", "lua"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("zsh", "bash"),
        ("ps1", "powershell"),
        // Data / docs
        ("md", "markdown"),
        ("markdown", "markdown"),
        ("json", "json"),
        ("jsonc", "json"),
        ("toml", "toml"),
        ("yml", "yaml"),
        ("yaml", "yaml"),
        ("sql", "sql"),
        ("graphql", "graphql"),
        ("gql", "graphql"),
        ("proto", "protobuf"),
        ("tf", "terraform"),
        ("hcl", "hcl"),
    ])
});

#[derive(Debug, Clone, Serialize)]
pub struct DetectorCacheInfo {
    pub cache_size: usize,
    pub supported_languages_count: usize,
    pub extensions_count: usize,
    pub filenames_count: usize,
}

/// Maps file paths to language keys, memoizing results.
#[derive(Debug, Default)]
pub struct LanguageDetector {
    cache: DashMap<String, Option<&'static str>>,
}

impl LanguageDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect the language key for a path. Never fails; unknown input yields `None`.
    pub fn detect(&self, file_path: &str) -> Option<&'static str> {
        if file_path.trim().is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(file_path) {
            return *hit;
        }

        let language = detect_by_filename(file_path).or_else(|| detect_by_extension(file_path));
        self.cache.insert(file_path.to_string(), language);
        language
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        EXTENSION_TO_LANGUAGE.values().any(|l| *l == language)
            || FILENAME_TO_LANGUAGE.values().any(|l| *l == language)
    }

    /// Language for a bare extension, with or without the leading dot.
    pub fn get_language_for_extension(&self, extension: &str) -> Option<&'static str> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_TO_LANGUAGE.get(ext.as_str()).copied()
    }

    pub fn get_extensions_for_language(&self, language: &str) -> Vec<String> {
        let mut extensions: Vec<String> = EXTENSION_TO_LANGUAGE
            .iter()
            .filter(|(_, lang)| **lang == language)
            .map(|(ext, _)| format!(".{}", ext))
            .collect();
        extensions.sort();
        extensions
    }

    pub fn supported_languages(&self) -> BTreeSet<&'static str> {
        EXTENSION_TO_LANGUAGE
            .values()
            .chain(FILENAME_TO_LANGUAGE.values())
            .copied()
            .collect()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn get_cache_info(&self) -> DetectorCacheInfo {
        DetectorCacheInfo {
            cache_size: self.cache.len(),
            supported_languages_count: self.supported_languages().len(),
            extensions_count: EXTENSION_TO_LANGUAGE.len(),
            filenames_count: FILENAME_TO_LANGUAGE.len(),
        }
    }
}

fn file_name_lower(file_path: &str) -> Option<String> {
    // Accept both separators so Windows-style paths resolve on any host
    let name = file_path.rsplit(['/', '\\']).next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

fn detect_by_filename(file_path: &str) -> Option<&'static str> {
    let name = file_name_lower(file_path)?;
    FILENAME_TO_LANGUAGE.get(name.as_str()).copied()
}

fn detect_by_extension(file_path: &str) -> Option<&'static str> {
    let name = file_name_lower(file_path)?;
    // Dotfiles without a second dot have no extension (".gitignore")
    let ext = Path::new(&name).extension()?.to_str()?;
    EXTENSION_TO_LANGUAGE.get(ext).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect("src/main.rs"), Some("rust"));
        assert_eq!(detector.detect("a.py"), Some("python"));
        assert_eq!(detector.detect("web/app.tsx"), Some("tsx"));
    }

    #[test]
    fn test_multi_dot_and_case_insensitive() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect("dist/file.min.js"), Some("javascript"));
        assert_eq!(detector.detect("Module.PY"), Some("python"));
        assert_eq!(detector.detect("analysis.R"), Some("r"));
    }

    #[test]
    fn test_special_filenames_win() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect("/repo/Dockerfile"), Some("dockerfile"));
        assert_eq!(detector.detect("/repo/CMakeLists.txt"), Some("cmake"));
        assert_eq!(detector.detect("Makefile"), Some("make"));
        assert_eq!(detector.detect("C:\\repo\\Gemfile"), Some("ruby"));
    }

    #[test]
    fn test_dotfiles() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect(".gitignore"), None);
        assert_eq!(detector.detect("config/.eslintrc.json"), Some("json"));
        assert_eq!(detector.detect("~/.bashrc"), Some("bash"));
    }

    #[test]
    fn test_unknown_and_empty_input() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect("c.xyz"), None);
        assert_eq!(detector.detect(""), None);
        assert_eq!(detector.detect("   "), None);
        assert_eq!(detector.detect("src/"), None);
        assert_eq!(detector.detect("README"), None);
    }

    #[test]
    fn test_cache_is_inspectable_and_clearable() {
        let detector = LanguageDetector::new();
        detector.detect("a.py");
        detector.detect("a.py");
        detector.detect("b.unknown");
        assert_eq!(detector.cache_size(), 2);
        assert_eq!(detector.get_cache_info().cache_size, 2);

        detector.clear_cache();
        assert_eq!(detector.cache_size(), 0);
    }

    #[test]
    fn test_extension_helpers() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.get_language_for_extension(".RS"), Some("rust"));
        assert_eq!(detector.get_language_for_extension("py"), Some("python"));
        assert!(detector
            .get_extensions_for_language("python")
            .contains(&".pyi".to_string()));
        assert!(detector.is_language_supported("dockerfile"));
        assert!(!detector.is_language_supported("cobol"));
    }
}
