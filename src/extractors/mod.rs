//! Block extraction
//!
//! This module turns a parsed syntax tree into `CodeBlock`s.
//!
//! # Architecture
//!
//! - `adapter.rs` - QueryResultAdapter: every query result shape normalized to one record
//! - `structural.rs` - node-kind enumeration used when queries find nothing
//! - `block_extractor.rs` - BlockExtractor public API and the ordered fallback chain

pub mod adapter;
pub mod block_extractor;
pub mod structural;

pub use adapter::{CanonicalCapture, QueryResultAdapter};
pub use block_extractor::{BlockExtractor, ExtractionStrategy};
