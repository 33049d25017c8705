//! Compiled query cache.
//!
//! Keyed by `(language, blake3(query_text))`. A hit hands back the same
//! `Arc<Query>` that was stored, so callers may compare handles with
//! `Arc::ptr_eq`. Failed compilations are cached as invalid entries and are
//! not retried until they expire or are evicted.

use crate::config::Config;
use crate::errors::{ChunkError, ErrorContext, ErrorHandler};
use crate::language::get_tree_sitter_language;
use crate::queries::{get_fallback_query_for_language, get_query_for_language};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tree_sitter::Query;

type CacheKey = (String, String);

/// One cache entry. `compiled_query` is `Some` exactly when `is_valid`.
#[derive(Clone)]
pub struct QueryInfo {
    pub language: String,
    pub query_text: String,
    pub compiled_query: Option<Arc<Query>>,
    pub compilation_time_ms: f64,
    pub last_used: Instant,
    pub use_count: u64,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl QueryInfo {
    fn snapshot(&self) -> QueryInfoSnapshot {
        QueryInfoSnapshot {
            language: self.language.clone(),
            compilation_time_ms: self.compilation_time_ms,
            seconds_since_last_use: self.last_used.elapsed().as_secs_f64(),
            use_count: self.use_count,
            is_valid: self.is_valid,
            error_message: self.error_message.clone(),
            capture_count: self
                .compiled_query
                .as_ref()
                .map(|q| q.capture_names().len())
                .unwrap_or(0),
        }
    }
}

/// Handle-free view of a cache entry for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct QueryInfoSnapshot {
    pub language: String,
    pub compilation_time_ms: f64,
    pub seconds_since_last_use: f64,
    pub use_count: u64,
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub capture_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryCacheInfo {
    pub cache_size: usize,
    pub valid_queries: usize,
    pub invalid_queries: usize,
    pub total_compilation_time_ms: f64,
    pub max_cache_size: usize,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryStats {
    pub language: String,
    pub cached_queries: usize,
    pub valid_queries: usize,
    pub invalid_queries: usize,
    pub total_uses: u64,
    pub has_default_query: bool,
    pub has_fallback_query: bool,
}

pub struct QueryManager {
    cache: Mutex<HashMap<CacheKey, QueryInfo>>,
    max_cache_size: usize,
    /// Zero disables expiry.
    ttl: Duration,
    error_handler: Arc<ErrorHandler>,
}

impl QueryManager {
    pub fn new(config: &Config, error_handler: Arc<ErrorHandler>) -> Self {
        Self::with_limits(
            config.query_cache_size,
            Duration::from_secs(config.query_cache_ttl_seconds),
            error_handler,
        )
    }

    pub fn with_limits(max_cache_size: usize, ttl: Duration, error_handler: Arc<ErrorHandler>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            max_cache_size: max_cache_size.max(1),
            ttl,
            error_handler,
        }
    }

    fn cache_key(language: &str, query_text: &str) -> CacheKey {
        (
            language.to_string(),
            blake3::hash(query_text.as_bytes()).to_hex().to_string(),
        )
    }

    fn is_expired(&self, info: &QueryInfo) -> bool {
        !self.ttl.is_zero() && info.last_used.elapsed() > self.ttl
    }

    /// Compile `query_text` for `language`, reusing the cached handle when present.
    ///
    /// Returns `None` for unknown grammars and for queries that fail to compile.
    pub fn compile_query(&self, language: &str, query_text: &str) -> Option<Arc<Query>> {
        let key = Self::cache_key(language, query_text);

        {
            let mut cache = self.cache.lock();
            let expired = match cache.get_mut(&key) {
                Some(info) if !self.is_expired(info) => {
                    info.use_count += 1;
                    info.last_used = Instant::now();
                    return info.compiled_query.clone();
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                debug!("Query cache entry for {} expired", language);
                cache.remove(&key);
            }
        }

        let grammar = match get_tree_sitter_language(language) {
            Ok(grammar) => grammar,
            Err(_) => {
                self.error_handler.handle_error(
                    &ChunkError::UnsupportedLanguage(language.to_string()),
                    ErrorContext::new("query_manager", "compile_query").with_language(language),
                );
                return None;
            }
        };

        let started = Instant::now();
        let compiled = Query::new(&grammar, query_text);
        let compilation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let info = match compiled {
            Ok(query) => {
                debug!(
                    "Compiled query for {} ({} captures, {:.2}ms)",
                    language,
                    query.capture_names().len(),
                    compilation_time_ms
                );
                QueryInfo {
                    language: language.to_string(),
                    query_text: query_text.to_string(),
                    compiled_query: Some(Arc::new(query)),
                    compilation_time_ms,
                    last_used: Instant::now(),
                    use_count: 1,
                    is_valid: true,
                    error_message: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.error_handler.handle_error(
                    &ChunkError::QueryCompilation {
                        language: language.to_string(),
                        message: message.clone(),
                    },
                    ErrorContext::new("query_manager", "compile_query").with_language(language),
                );
                QueryInfo {
                    language: language.to_string(),
                    query_text: query_text.to_string(),
                    compiled_query: None,
                    compilation_time_ms,
                    last_used: Instant::now(),
                    use_count: 1,
                    is_valid: false,
                    error_message: Some(message),
                }
            }
        };

        let mut cache = self.cache.lock();
        // Another thread may have compiled the same text meanwhile; keep its handle
        if let Some(existing) = cache.get_mut(&key) {
            existing.use_count += 1;
            existing.last_used = Instant::now();
            return existing.compiled_query.clone();
        }
        if cache.len() >= self.max_cache_size {
            Self::evict_least_recently_used(&mut cache);
        }
        let handle = info.compiled_query.clone();
        cache.insert(key, info);
        handle
    }

    fn evict_least_recently_used(cache: &mut HashMap<CacheKey, QueryInfo>) {
        let oldest = cache
            .iter()
            .min_by_key(|(_, info)| info.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!("Evicting cached query for {}", key.0);
            cache.remove(&key);
        }
    }

    pub fn get_query_for_language(&self, language: &str) -> Option<&'static str> {
        get_query_for_language(language)
    }

    pub fn get_fallback_query_for_language(&self, language: &str) -> Option<&'static str> {
        get_fallback_query_for_language(language)
    }

    /// Compiled default query for `language`.
    pub fn get_compiled_query(&self, language: &str) -> Option<Arc<Query>> {
        let text = get_query_for_language(language)?;
        self.compile_query(language, text)
    }

    pub fn get_compiled_fallback_query(&self, language: &str) -> Option<Arc<Query>> {
        let text = get_fallback_query_for_language(language)?;
        self.compile_query(language, text)
    }

    /// True when the query compiles and has at least one capture.
    pub fn validate_query(&self, language: &str, query_text: &str) -> bool {
        match self.compile_query(language, query_text) {
            Some(query) => !query.capture_names().is_empty(),
            None => false,
        }
    }

    /// Warm the cache for the given languages. Returns how many compiled.
    pub fn preload_common_queries<S: AsRef<str>>(&self, languages: &[S]) -> usize {
        let loaded = languages
            .iter()
            .filter(|language| self.get_compiled_query(language.as_ref()).is_some())
            .count();
        info!("Preloaded {} of {} structural queries", loaded, languages.len());
        loaded
    }

    pub fn get_cache_info(&self) -> QueryCacheInfo {
        let cache = self.cache.lock();
        let valid_queries = cache.values().filter(|info| info.is_valid).count();
        QueryCacheInfo {
            cache_size: cache.len(),
            valid_queries,
            invalid_queries: cache.len() - valid_queries,
            total_compilation_time_ms: cache.values().map(|info| info.compilation_time_ms).sum(),
            max_cache_size: self.max_cache_size,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Drop expired entries now. Returns how many were removed.
    pub fn cleanup_expired_queries(&self) -> usize {
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, info| self.ttl.is_zero() || info.last_used.elapsed() <= self.ttl);
        let removed = before - cache.len();
        if removed > 0 {
            debug!("Removed {} expired queries", removed);
        }
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn get_query_stats(&self, language: &str) -> QueryStats {
        let cache = self.cache.lock();
        let mut stats = QueryStats {
            language: language.to_string(),
            has_default_query: get_query_for_language(language).is_some(),
            has_fallback_query: get_fallback_query_for_language(language).is_some(),
            ..Default::default()
        };
        for info in cache.values().filter(|info| info.language == language) {
            stats.cached_queries += 1;
            stats.total_uses += info.use_count;
            if info.is_valid {
                stats.valid_queries += 1;
            } else {
                stats.invalid_queries += 1;
            }
        }
        stats
    }

    pub fn query_info(&self, language: &str, query_text: &str) -> Option<QueryInfoSnapshot> {
        let key = Self::cache_key(language, query_text);
        self.cache.lock().get(&key).map(QueryInfo::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> QueryManager {
        QueryManager::new(&Config::default(), Arc::new(ErrorHandler::new()))
    }

    #[test]
    fn test_cache_hit_returns_same_handle() {
        let manager = manager();
        let text = get_query_for_language("python").unwrap();

        let first = manager.compile_query("python", text).unwrap();
        assert_eq!(manager.query_info("python", text).unwrap().use_count, 1);

        let second = manager.compile_query("python", text).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.query_info("python", text).unwrap().use_count, 2);
    }

    #[test]
    fn test_invalid_query_is_cached_as_invalid() {
        let handler = Arc::new(ErrorHandler::new());
        let manager = QueryManager::new(&Config::default(), handler.clone());

        assert!(manager.compile_query("python", "(not_a_node_kind) @x").is_none());
        assert!(manager.compile_query("python", "(not_a_node_kind) @x").is_none());

        let info = manager.query_info("python", "(not_a_node_kind) @x").unwrap();
        assert!(!info.is_valid);
        assert!(info.error_message.is_some());
        assert_eq!(info.use_count, 2);
        // Second call hit the cache instead of recompiling
        assert_eq!(handler.failure_stats().total_failures, 1);
        assert_eq!(manager.get_cache_info().invalid_queries, 1);
    }

    #[test]
    fn test_unknown_language_returns_none() {
        let manager = manager();
        assert!(manager.compile_query("cobol", "(x) @y").is_none());
        assert!(manager.get_compiled_query("cobol").is_none());
        assert_eq!(manager.get_cache_info().cache_size, 0);
    }

    #[test]
    fn test_validate_query_rejects_zero_captures() {
        let manager = manager();
        assert!(manager.validate_query("python", "(function_definition) @function"));
        assert!(!manager.validate_query("python", "(function_definition)"));
        assert!(!manager.validate_query("python", "(((("));
    }

    #[test]
    fn test_size_bound_evicts_least_recently_used() {
        let manager = QueryManager::with_limits(2, Duration::ZERO, Arc::new(ErrorHandler::new()));
        manager.compile_query("python", "(function_definition) @a");
        std::thread::sleep(Duration::from_millis(2));
        manager.compile_query("python", "(class_definition) @b");
        std::thread::sleep(Duration::from_millis(2));
        // Touch the first entry so the second becomes the oldest
        manager.compile_query("python", "(function_definition) @a");
        std::thread::sleep(Duration::from_millis(2));
        manager.compile_query("python", "(identifier) @c");

        assert_eq!(manager.get_cache_info().cache_size, 2);
        assert!(manager.query_info("python", "(function_definition) @a").is_some());
        assert!(manager.query_info("python", "(class_definition) @b").is_none());
    }

    #[test]
    fn test_ttl_expiry_is_lazy_and_sweepable() {
        let manager =
            QueryManager::with_limits(10, Duration::from_millis(50), Arc::new(ErrorHandler::new()));
        let first = manager.compile_query("python", "(function_definition) @f").unwrap();
        manager.compile_query("rust", "(function_item) @f");
        std::thread::sleep(Duration::from_millis(120));

        // Lazy: an expired entry is recompiled on access
        let second = manager.compile_query("python", "(function_definition) @f").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        assert_eq!(manager.cleanup_expired_queries(), 1);
        assert_eq!(manager.get_cache_info().cache_size, 1);
    }

    #[test]
    fn test_preload_and_stats() {
        let manager = manager();
        let loaded = manager.preload_common_queries(&["python", "rust", "cobol"]);
        assert_eq!(loaded, 2);

        let stats = manager.get_query_stats("python");
        assert_eq!(stats.cached_queries, 1);
        assert_eq!(stats.valid_queries, 1);
        assert!(stats.has_default_query);

        manager.clear_cache();
        assert_eq!(manager.get_cache_info().cache_size, 0);
    }
}
