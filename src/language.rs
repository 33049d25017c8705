//! Language Support - Shared tree-sitter grammar registry
//!
//! ALL grammar lookups and node-kind tables go through this module. The
//! resource manager, query manager and structural fallback share it so a
//! language is either fully supported or not at all.

use anyhow::Result;

/// Language keys with a compiled-in grammar.
///
/// **Systems**: Rust, C, C++, Go
/// **Web**: TypeScript, TSX, JavaScript, HTML, CSS
/// **Backend**: Python, Java, C#, PHP, Ruby, Kotlin
/// **Scripting**: Lua, Bash
/// **Documentation/config**: Markdown, JSON, TOML, YAML
const GRAMMAR_LANGUAGES: &[&str] = &[
    "rust",
    "c",
    "cpp",
    "go",
    "typescript",
    "tsx",
    "javascript",
    "html",
    "css",
    "python",
    "java",
    "csharp",
    "php",
    "ruby",
    "kotlin",
    "lua",
    "bash",
    "markdown",
    "json",
    "toml",
    "yaml",
];

/// Get tree-sitter language for a given language key
pub fn get_tree_sitter_language(language: &str) -> Result<tree_sitter::Language> {
    match language {
        // Systems languages
        "rust" => Ok(tree_sitter_rust::LANGUAGE.into()),
        "c" => Ok(tree_sitter_c::LANGUAGE.into()),
        "cpp" => Ok(tree_sitter_cpp::LANGUAGE.into()),
        "go" => Ok(tree_sitter_go::LANGUAGE.into()),

        // Web languages
        "typescript" => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "javascript" => Ok(tree_sitter_javascript::LANGUAGE.into()),
        "html" => Ok(tree_sitter_html::LANGUAGE.into()),
        "css" => Ok(tree_sitter_css::LANGUAGE.into()),

        // Backend languages
        "python" => Ok(tree_sitter_python::LANGUAGE.into()),
        "java" => Ok(tree_sitter_java::LANGUAGE.into()),
        "csharp" => Ok(tree_sitter_c_sharp::LANGUAGE.into()),
        "php" => Ok(tree_sitter_php::LANGUAGE_PHP.into()),
        "ruby" => Ok(tree_sitter_ruby::LANGUAGE.into()),
        "kotlin" => Ok(tree_sitter_kotlin_ng::LANGUAGE.into()),

        // Scripting languages
        "lua" => Ok(tree_sitter_lua::LANGUAGE.into()),
        "bash" => Ok(tree_sitter_bash::LANGUAGE.into()),

        // Documentation and configuration languages
        "markdown" => Ok(tree_sitter_md::LANGUAGE.into()),
        "json" => Ok(tree_sitter_json::LANGUAGE.into()),
        "toml" => Ok(tree_sitter_toml_ng::LANGUAGE.into()),
        "yaml" => Ok(tree_sitter_yaml::LANGUAGE.into()),

        _ => Err(anyhow::anyhow!(
            "No tree-sitter grammar for '{}'. Available: {}",
            language,
            GRAMMAR_LANGUAGES.join(", ")
        )),
    }
}

pub fn has_grammar(language: &str) -> bool {
    GRAMMAR_LANGUAGES.contains(&language)
}

pub fn supported_languages() -> &'static [&'static str] {
    GRAMMAR_LANGUAGES
}

/// Node kinds enumerated by the structural fallback when queries give nothing.
pub fn structural_node_kinds(language: &str) -> &'static [&'static str] {
    match language {
        "rust" => &[
            "function_item",
            "impl_item",
            "struct_item",
            "enum_item",
            "trait_item",
        ],
        "python" => &["function_definition", "class_definition"],
        "javascript" => &[
            "function_declaration",
            "method_definition",
            "class_declaration",
            "arrow_function",
        ],
        "typescript" => &[
            "function_declaration",
            "arrow_function",
            "method_definition",
            "method_signature",
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
            "function_signature",
            "type_alias_declaration",
        ],
        "tsx" => &[
            "function_declaration",
            "method_definition",
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
            "type_alias_declaration",
        ],
        "go" => &[
            "function_declaration",
            "method_declaration",
            "type_declaration",
        ],
        "java" => &[
            "class_declaration",
            "method_declaration",
            "interface_declaration",
        ],
        "cpp" => &["function_definition", "class_specifier", "struct_specifier"],
        "c" => &["function_definition"],
        "csharp" => &[
            "class_declaration",
            "method_declaration",
            "interface_declaration",
        ],
        "ruby" => &["method", "class", "module"],
        "php" => &["function_definition", "class_declaration"],
        "kotlin" => &["class_declaration", "function_declaration"],
        "lua" => &["function_declaration"],
        "bash" => &["function_definition"],
        "json" => &["pair"],
        "yaml" => &["block_mapping_pair"],
        "markdown" => &["atx_heading", "setext_heading"],
        "html" => &["element"],
        "css" => &["rule_set"],
        "toml" => &["table", "table_array_element"],
        _ => &["function_definition", "class_definition"], // Generic fallback
    }
}

/// Canonical block type for a grammar node kind.
pub fn block_type_for_kind(kind: &str) -> &str {
    match kind {
        "function_definition"
        | "function_declaration"
        | "function_item"
        | "arrow_function"
        | "function_expression"
        | "function_signature" => "function",
        "method_definition" | "method_declaration" | "method_signature" | "method"
        | "singleton_method" => "method",
        "class_definition"
        | "class_declaration"
        | "abstract_class_declaration"
        | "class_specifier"
        | "class" => "class",
        "struct_item" | "struct_specifier" => "struct",
        "enum_item" | "enum_declaration" => "enum",
        "trait_item" => "trait",
        "impl_item" => "impl",
        "interface_declaration" => "interface",
        "type_alias_declaration" | "type_declaration" => "type",
        "module" => "module",
        "atx_heading" | "setext_heading" => "heading",
        "rule_set" => "rule",
        "block_mapping_pair" | "pair" => "pair",
        "table" | "table_array_element" => "table",
        other => other,
    }
}

/// Field name that carries a declaration's identifier.
///
/// Most grammars use "name"; C/C++ nest it inside a declarator.
pub fn get_symbol_name_field(language: &str) -> &'static str {
    match language {
        "cpp" | "c" => "declarator",
        "json" | "yaml" | "toml" => "key",
        _ => "name",
    }
}
