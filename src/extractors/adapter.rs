//! QueryResultAdapter - one canonical capture record for every result shape
//!
//! A query run can be read three ways:
//! - `CursorMatches`: per-match capture lists from `QueryCursor::matches`
//! - `ObjectCaptures`: a flat stream of captures from `QueryCursor::captures`,
//!   each tagged with the match it belongs to
//! - `DictCaptures`: per-match maps of capture name -> nodes (also how
//!   callers hand in synthetic capture sets)
//!
//! Normalization is total. Records without a body capture are skipped and
//! counted, never raised.

use std::collections::BTreeMap;
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

/// Capture name that carries the identifier instead of a block.
pub const NAME_CAPTURE: &str = "name";

/// Bound on in-progress matches; pathological files stop early instead of hogging memory.
const MATCH_LIMIT: u32 = 4096;

/// Canonical capture record consumed by block building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalCapture<'tree> {
    pub kind: &'static str,
    pub name_node: Option<Node<'tree>>,
    pub body_node: Node<'tree>,
}

/// Normalized captures plus how many records could not be used.
#[derive(Debug, Default)]
pub struct NormalizedCaptures<'tree> {
    pub captures: Vec<CanonicalCapture<'tree>>,
    pub total_records: usize,
    pub skipped_records: usize,
}

/// One capture as read from a cursor.
#[derive(Debug, Clone, Copy)]
pub struct RawCapture<'tree> {
    pub match_id: u32,
    pub capture_name: &'static str,
    pub node: Node<'tree>,
}

#[derive(Debug)]
pub enum QueryResultAdapter<'tree> {
    DictCaptures(Vec<BTreeMap<&'static str, Vec<Node<'tree>>>>),
    ObjectCaptures(Vec<RawCapture<'tree>>),
    CursorMatches(Vec<Vec<(&'static str, Node<'tree>)>>),
}

impl<'tree> QueryResultAdapter<'tree> {
    /// Run `query` with `QueryCursor::matches`.
    pub fn from_matches(query: &Query, root: Node<'tree>, text: &str) -> Self {
        let names = capture_names(query);
        let mut cursor = QueryCursor::new();
        cursor.set_match_limit(MATCH_LIMIT);

        let mut records = Vec::new();
        let mut matches = cursor.matches(query, root, text.as_bytes());
        while let Some(query_match) = matches.next() {
            let record = query_match
                .captures
                .iter()
                .filter_map(|capture| {
                    names
                        .get(capture.index as usize)
                        .map(|name| (*name, capture.node))
                })
                .collect();
            records.push(record);
        }
        QueryResultAdapter::CursorMatches(records)
    }

    /// Run `query` with `QueryCursor::captures` (document order).
    pub fn from_capture_stream(query: &Query, root: Node<'tree>, text: &str) -> Self {
        let names = capture_names(query);
        let mut cursor = QueryCursor::new();
        cursor.set_match_limit(MATCH_LIMIT);

        let mut raw = Vec::new();
        let mut captures = cursor.captures(query, root, text.as_bytes());
        while let Some((query_match, capture_index)) = captures.next() {
            let Some(capture) = query_match.captures.get(*capture_index) else {
                continue;
            };
            if let Some(name) = names.get(capture.index as usize) {
                raw.push(RawCapture {
                    match_id: query_match.id(),
                    capture_name: name,
                    node: capture.node,
                });
            }
        }
        QueryResultAdapter::ObjectCaptures(raw)
    }

    /// Run `query` and group each match into a name -> nodes map.
    pub fn from_grouped_matches(query: &Query, root: Node<'tree>, text: &str) -> Self {
        match Self::from_matches(query, root, text) {
            QueryResultAdapter::CursorMatches(records) => QueryResultAdapter::DictCaptures(
                records
                    .into_iter()
                    .map(|record| {
                        let mut grouped: BTreeMap<&'static str, Vec<Node<'tree>>> =
                            BTreeMap::new();
                        for (name, node) in record {
                            grouped.entry(name).or_default().push(node);
                        }
                        grouped
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Reduce any shape to canonical records, ordered by body start position.
    pub fn normalize(self) -> NormalizedCaptures<'tree> {
        let records: Vec<Vec<(&'static str, Node<'tree>)>> = match self {
            QueryResultAdapter::CursorMatches(records) => records,
            QueryResultAdapter::DictCaptures(maps) => maps
                .into_iter()
                .map(|map| {
                    map.into_iter()
                        .flat_map(|(name, nodes)| nodes.into_iter().map(move |node| (name, node)))
                        .collect()
                })
                .collect(),
            QueryResultAdapter::ObjectCaptures(raw) => {
                // Group by match id, keeping first-seen order of matches
                let mut order: Vec<u32> = Vec::new();
                let mut grouped: BTreeMap<u32, Vec<(&'static str, Node<'tree>)>> = BTreeMap::new();
                for capture in raw {
                    let entry = grouped.entry(capture.match_id).or_insert_with(|| {
                        order.push(capture.match_id);
                        Vec::new()
                    });
                    // The capture stream can repeat a capture for the same match
                    if !entry
                        .iter()
                        .any(|(name, node)| *name == capture.capture_name && *node == capture.node)
                    {
                        entry.push((capture.capture_name, capture.node));
                    }
                }
                order
                    .into_iter()
                    .filter_map(|id| grouped.remove(&id))
                    .collect()
            }
        };

        let mut normalized = NormalizedCaptures {
            total_records: records.len(),
            ..Default::default()
        };
        for record in records {
            match canonical_record(&record) {
                Some(capture) => normalized.captures.push(capture),
                None => normalized.skipped_records += 1,
            }
        }
        normalized
            .captures
            .sort_by_key(|capture| (capture.body_node.start_byte(), capture.body_node.end_byte()));
        normalized
    }
}

fn capture_names(query: &Query) -> Vec<&'static str> {
    // Capture names live as long as the query; intern them as 'static block types
    query
        .capture_names()
        .iter()
        .map(|name| intern_capture_name(name))
        .collect()
}

/// Map a capture name onto a `'static` str so records do not borrow the query.
fn intern_capture_name(name: &str) -> &'static str {
    match name {
        "function" => "function",
        "method" => "method",
        "class" => "class",
        "struct" => "struct",
        "enum" => "enum",
        "trait" => "trait",
        "impl" => "impl",
        "interface" => "interface",
        "type" => "type",
        "module" => "module",
        "constructor" => "constructor",
        "heading" => "heading",
        "code_block" => "code_block",
        "pair" => "pair",
        "table" => "table",
        "script" => "script",
        "style" => "style",
        "element" => "element",
        "rule" => "rule",
        "media" => "media",
        "keyframes" => "keyframes",
        "command" => "command",
        NAME_CAPTURE => NAME_CAPTURE,
        _ => "block",
    }
}

/// Body is the first non-name capture; the name is the `@name` capture if any.
fn canonical_record<'tree>(
    record: &[(&'static str, Node<'tree>)],
) -> Option<CanonicalCapture<'tree>> {
    let (kind, body_node) = record
        .iter()
        .find(|(name, _)| *name != NAME_CAPTURE)
        .copied()?;
    let name_node = record
        .iter()
        .find(|(name, _)| *name == NAME_CAPTURE)
        .map(|(_, node)| *node);
    Some(CanonicalCapture {
        kind,
        name_node,
        body_node,
    })
}
