// Shared helpers used by file validation and chunking.

/// Glob and directory skip patterns
pub mod skip_patterns;

/// Token estimation for token-window chunking
pub mod token_estimation;
