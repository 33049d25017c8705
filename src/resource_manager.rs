//! Parser pool.
//!
//! One tree-sitter `Parser` per language, created lazily and reused. A parser
//! is checked out as a [`ParserLease`]; dropping the lease resets the parser
//! and returns it to its slot, so release happens on every exit path.
//! Different languages can be used concurrently, one language is serialized.

use crate::config::Config;
use crate::errors::{ChunkError, ErrorContext, ErrorHandler, Result};
use crate::language::{get_tree_sitter_language, supported_languages};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tree_sitter::{Language, Parser, Tree};

struct ParserSlot {
    grammar: Language,
    /// `None` while the parser is checked out.
    parser: Mutex<Option<Parser>>,
    returned: Condvar,
}

/// Exclusive use of a pooled parser.
pub struct ParserLease {
    language: String,
    parser: Option<Parser>,
    slot: Arc<ParserSlot>,
}

impl ParserLease {
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn grammar(&self) -> &Language {
        &self.slot.grammar
    }

    /// Parse `text` from scratch. `None` when tree-sitter gives up.
    pub fn parse(&mut self, text: &str) -> Option<Tree> {
        self.parser.as_mut()?.parse(text, None)
    }
}

impl Drop for ParserLease {
    fn drop(&mut self) {
        if let Some(mut parser) = self.parser.take() {
            parser.reset();
            *self.slot.parser.lock() = Some(parser);
            self.slot.returned.notify_one();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    pub parsers: usize,
    pub languages: Vec<String>,
    pub checked_out: usize,
    pub acquisitions: u64,
    pub reuses: u64,
    pub timeouts: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub parsers_cleaned: usize,
    pub languages_cleared: Vec<String>,
}

pub struct ResourceManager {
    config: Arc<Config>,
    pool: Mutex<HashMap<String, Arc<ParserSlot>>>,
    error_handler: Arc<ErrorHandler>,
    acquisitions: AtomicU64,
    reuses: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
}

impl ResourceManager {
    pub fn new(config: Arc<Config>, error_handler: Arc<ErrorHandler>) -> Self {
        Self {
            config,
            pool: Mutex::new(HashMap::new()),
            error_handler,
            acquisitions: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Check every bundled grammar against the linked tree-sitter runtime.
    ///
    /// Run once at startup. This is the only fatal error in the engine.
    pub fn ensure_version_compatible(&self) -> Result<()> {
        let supported = tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION..=tree_sitter::LANGUAGE_VERSION;
        let mut parser = Parser::new();

        for language in supported_languages() {
            let grammar = get_tree_sitter_language(language)
                .map_err(|e| ChunkError::VersionIncompatible(e.to_string()))?;
            let abi = grammar.abi_version();
            if !supported.contains(&abi) {
                let err = ChunkError::VersionIncompatible(format!(
                    "grammar '{}' has ABI {}, runtime supports {}..={}",
                    language,
                    abi,
                    supported.start(),
                    supported.end()
                ));
                self.error_handler.handle_error(
                    &err,
                    ErrorContext::new("resource_manager", "ensure_version_compatible")
                        .with_language(*language),
                );
                return Err(err);
            }
            parser.set_language(&grammar).map_err(|e| {
                ChunkError::VersionIncompatible(format!("grammar '{}': {}", language, e))
            })?;
        }

        info!(
            "✅ tree-sitter ABI {} verified for {} grammars",
            tree_sitter::LANGUAGE_VERSION,
            supported_languages().len()
        );
        Ok(())
    }

    /// Check out the pooled parser for `language`, creating it on first use.
    ///
    /// Waits at most `timeout_seconds * timeout_multiplier`. Failures are
    /// reported through the error handler and yield `None`.
    pub fn acquire_resources(&self, language: &str) -> Option<ParserLease> {
        let multiplier = self.config.language_config(language).timeout_multiplier;
        self.acquire_with_multiplier(language, multiplier)
    }

    /// Like [`acquire_resources`](Self::acquire_resources) with an explicit timeout multiplier.
    pub fn acquire_with_multiplier(&self, language: &str, multiplier: f64) -> Option<ParserLease> {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);

        let slot = match self.slot_for(language) {
            Ok(slot) => slot,
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.error_handler.handle_error(
                    &err,
                    ErrorContext::new("resource_manager", "acquire_resources")
                        .with_language(language),
                );
                return None;
            }
        };

        let now = Instant::now();
        let deadline = now
            .checked_add(self.acquire_timeout(multiplier))
            .unwrap_or(now + Duration::from_secs(3600));
        let mut guard = slot.parser.lock();
        while guard.is_none() {
            if slot.returned.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }

        let checked_out = guard.take();
        drop(guard);

        match checked_out {
            Some(parser) => Some(ParserLease {
                language: language.to_string(),
                parser: Some(parser),
                slot: Arc::clone(&slot),
            }),
            None => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                self.error_handler.handle_error(
                    &ChunkError::ResourceUnavailable {
                        language: language.to_string(),
                        reason: "timed out waiting for parser".to_string(),
                    },
                    ErrorContext::new("resource_manager", "acquire_resources")
                        .with_language(language),
                );
                None
            }
        }
    }

    /// Explicitly return a lease. Equivalent to dropping it.
    pub fn release_resources(&self, lease: ParserLease) {
        debug!("Releasing parser for {}", lease.language());
        drop(lease);
    }

    fn acquire_timeout(&self, multiplier: f64) -> Duration {
        Duration::try_from_secs_f64(self.config.timeout_seconds * multiplier)
            .unwrap_or(Duration::from_secs(60))
    }

    fn slot_for(&self, language: &str) -> Result<Arc<ParserSlot>> {
        let mut pool = self.pool.lock();
        if let Some(slot) = pool.get(language) {
            self.reuses.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(slot));
        }

        let grammar = get_tree_sitter_language(language)
            .map_err(|_| ChunkError::UnsupportedLanguage(language.to_string()))?;
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ChunkError::ResourceUnavailable {
                language: language.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Created parser for {}", language);
        let slot = Arc::new(ParserSlot {
            grammar,
            parser: Mutex::new(Some(parser)),
            returned: Condvar::new(),
        });
        pool.insert(language.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Tear down the pooled parser for one language. Outstanding leases stay valid.
    pub fn evict(&self, language: &str) -> bool {
        self.pool.lock().remove(language).is_some()
    }

    pub fn cleanup_all(&self) -> CleanupStats {
        let mut pool = self.pool.lock();
        let mut languages_cleared: Vec<String> = pool.keys().cloned().collect();
        languages_cleared.sort();
        let parsers_cleaned = pool.len();
        pool.clear();

        if parsers_cleaned > 0 {
            info!("Cleaned up {} pooled parsers", parsers_cleaned);
        }
        CleanupStats {
            parsers_cleaned,
            languages_cleared,
        }
    }

    pub fn get_resource_usage(&self) -> ResourceUsage {
        let pool = self.pool.lock();
        let mut languages: Vec<String> = pool.keys().cloned().collect();
        languages.sort();
        let checked_out = pool
            .values()
            .filter(|slot| slot.parser.lock().is_none())
            .count();

        ResourceUsage {
            parsers: pool.len(),
            languages,
            checked_out,
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(config: Config) -> ResourceManager {
        ResourceManager::new(Arc::new(config), Arc::new(ErrorHandler::new()))
    }

    #[test]
    fn test_version_check_passes_for_bundled_grammars() {
        assert!(manager_with(Config::default()).ensure_version_compatible().is_ok());
    }

    #[test]
    fn test_acquire_creates_once_and_reuses() {
        let manager = manager_with(Config::default());
        {
            let mut lease = manager.acquire_resources("python").unwrap();
            let tree = lease.parse("def f():\n    return 1").unwrap();
            assert_eq!(tree.root_node().kind(), "module");
        }
        let lease = manager.acquire_resources("python").unwrap();
        manager.release_resources(lease);

        let usage = manager.get_resource_usage();
        assert_eq!(usage.parsers, 1);
        assert_eq!(usage.languages, vec!["python".to_string()]);
        assert_eq!(usage.acquisitions, 2);
        assert_eq!(usage.reuses, 1);
        assert_eq!(usage.checked_out, 0);
    }

    #[test]
    fn test_unknown_language_returns_none_and_reports() {
        let handler = Arc::new(ErrorHandler::new());
        let manager = ResourceManager::new(Arc::new(Config::default()), handler.clone());
        assert!(manager.acquire_resources("cobol").is_none());
        assert_eq!(manager.get_resource_usage().failures, 1);
        assert_eq!(handler.failure_stats().failures_by_language.get("cobol"), Some(&1));
    }

    #[test]
    fn test_acquire_times_out_while_checked_out() {
        let config = Config {
            timeout_seconds: 0.05,
            ..Config::default()
        };
        let manager = manager_with(config);
        let held = manager.acquire_resources("go").unwrap();
        assert_eq!(manager.get_resource_usage().checked_out, 1);

        assert!(manager.acquire_resources("go").is_none());
        assert_eq!(manager.get_resource_usage().timeouts, 1);

        drop(held);
        assert!(manager.acquire_resources("go").is_some());
    }

    #[test]
    fn test_waiting_acquire_gets_returned_parser() {
        let manager = Arc::new(manager_with(Config::default()));
        let held = manager.acquire_resources("rust").unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || manager.acquire_resources("rust").is_some())
        };
        std::thread::sleep(Duration::from_millis(20));
        drop(held);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_cleanup_all_and_evict() {
        let manager = manager_with(Config::default());
        drop(manager.acquire_resources("python"));
        drop(manager.acquire_resources("rust"));

        assert!(manager.evict("rust"));
        assert!(!manager.evict("rust"));

        let stats = manager.cleanup_all();
        assert_eq!(stats.parsers_cleaned, 1);
        assert_eq!(stats.languages_cleared, vec!["python".to_string()]);
        assert_eq!(manager.get_resource_usage().parsers, 0);
    }
}
