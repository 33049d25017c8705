// Structural fallback: enumerate nodes of known kinds when queries find nothing
//
// Walks with a TreeCursor instead of recursion so deeply nested files cannot
// blow the stack; the depth bound keeps the walk cheap on huge files.

use super::adapter::CanonicalCapture;
use crate::language::{block_type_for_kind, get_symbol_name_field, structural_node_kinds};
use tree_sitter::Node;

/// Deepest level below the root that is still inspected.
pub const MAX_STRUCTURAL_DEPTH: usize = 7;

/// Nodes whose kind is in the language's structural set, in document order.
pub fn structural_captures<'tree>(root: Node<'tree>, language: &str) -> Vec<CanonicalCapture<'tree>> {
    let kinds = structural_node_kinds(language);
    let mut found = Vec::new();
    let mut cursor = root.walk();
    let mut depth = 0usize;

    loop {
        let node = cursor.node();
        if kinds.contains(&node.kind()) {
            found.push(CanonicalCapture {
                kind: block_type_for_kind(node.kind()),
                name_node: None,
                body_node: node,
            });
        }

        if depth < MAX_STRUCTURAL_DEPTH && cursor.goto_first_child() {
            depth += 1;
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if depth == 0 || !cursor.goto_parent() {
                return found;
            }
            depth -= 1;
        }
    }
}

/// Identifier node for a block body when no `@name` capture was produced.
///
/// C-family declarators nest the identifier (`pointer_declarator >
/// function_declarator > identifier`), so descend until the innermost one.
pub fn resolve_name_node<'tree>(body: Node<'tree>, language: &str) -> Option<Node<'tree>> {
    let mut node = body
        .child_by_field_name(get_symbol_name_field(language))
        .or_else(|| body.child_by_field_name("name"))
        .or_else(|| body.child_by_field_name("type"))?;
    while let Some(inner) = inner_declarator(node) {
        node = inner;
    }
    Some(node)
}

fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        // `int& f()` and `int&& f()` carry the declarator as an unnamed child
        "reference_declarator" => node.named_child(0),
        _ => node.child_by_field_name("declarator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::get_tree_sitter_language;
    use tree_sitter::{Parser, Tree};

    fn parse(language: &str, source: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&get_tree_sitter_language(language).unwrap())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn test_finds_python_functions_and_classes() {
        let source = "class A:\n    def m(self):\n        pass\n\ndef f():\n    pass\n";
        let tree = parse("python", source);
        let kinds: Vec<&str> = structural_captures(tree.root_node(), "python")
            .iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec!["class", "function", "function"]);
    }

    #[test]
    fn test_depth_limit_stops_descent() {
        // Each nested def adds two levels (function_definition > block)
        let mut source = String::new();
        for level in 0..8 {
            source.push_str(&"    ".repeat(level));
            source.push_str(&format!("def f{}():\n", level));
        }
        source.push_str(&"    ".repeat(8));
        source.push_str("pass\n");

        let tree = parse("python", &source);
        let found = structural_captures(tree.root_node(), "python");
        assert!(!found.is_empty());
        assert!(found.len() < 8, "found {} nested defs", found.len());
    }

    #[test]
    fn test_resolve_name_through_declarators() {
        let source = "int add(int a, int b) { return a + b; }\n";
        let tree = parse("c", source);
        let function = structural_captures(tree.root_node(), "c")[0].body_node;
        let name = resolve_name_node(function, "c").unwrap();
        assert_eq!(&source[name.byte_range()], "add");
    }

    #[test]
    fn test_resolve_name_by_field() {
        let source = "fn run() {}\n";
        let tree = parse("rust", source);
        let function = structural_captures(tree.root_node(), "rust")[0].body_node;
        let name = resolve_name_node(function, "rust").unwrap();
        assert_eq!(&source[name.byte_range()], "run");
    }

    #[test]
    fn test_resolve_name_through_pointer_and_reference_returns() {
        let c_source = "char **split(const char *s) { return 0; }\n";
        let tree = parse("c", c_source);
        let function = structural_captures(tree.root_node(), "c")[0].body_node;
        let name = resolve_name_node(function, "c").unwrap();
        assert_eq!(&c_source[name.byte_range()], "split");

        let cpp_source = "int& counter() { static int n = 0; return n; }\n";
        let tree = parse("cpp", cpp_source);
        let function = structural_captures(tree.root_node(), "cpp")[0].body_node;
        let name = resolve_name_node(function, "cpp").unwrap();
        assert_eq!(&cpp_source[name.byte_range()], "counter");
    }
}
