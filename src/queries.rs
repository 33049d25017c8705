//! Structural query catalogue.
//!
//! Capture conventions shared by every query:
//! - the outer capture names the block type (`@function`, `@class`, ...)
//! - an optional `@name` capture carries the identifier node
//!
//! Fallback queries list node kinds only, without field constraints, so they
//! still compile and match when a grammar renames a field.

/// Primary query text for a language, or `None` when there is no structural support.
pub fn get_query_for_language(language: &str) -> Option<&'static str> {
    let query = match language {
        "python" => {
            r#"
            (function_definition name: (identifier) @name) @function
            (class_definition name: (identifier) @name) @class
            "#
        }
        "rust" => {
            r#"
            (function_item name: (identifier) @name) @function
            (struct_item name: (type_identifier) @name) @struct
            (enum_item name: (type_identifier) @name) @enum
            (trait_item name: (type_identifier) @name) @trait
            (impl_item type: (_) @name) @impl
            (mod_item name: (identifier) @name) @module
            "#
        }
        "javascript" => {
            r#"
            (function_declaration name: (identifier) @name) @function
            (method_definition name: (property_identifier) @name) @method
            (class_declaration name: (identifier) @name) @class
            (lexical_declaration
              (variable_declarator
                name: (identifier) @name
                value: [(arrow_function) (function_expression)])) @function
            "#
        }
        "typescript" | "tsx" => {
            r#"
            (function_declaration name: (identifier) @name) @function
            (method_definition name: (property_identifier) @name) @method
            (class_declaration name: (type_identifier) @name) @class
            (abstract_class_declaration name: (type_identifier) @name) @class
            (interface_declaration name: (type_identifier) @name) @interface
            (type_alias_declaration name: (type_identifier) @name) @type
            (lexical_declaration
              (variable_declarator
                name: (identifier) @name
                value: [(arrow_function) (function_expression)])) @function
            "#
        }
        "go" => {
            r#"
            (function_declaration name: (identifier) @name) @function
            (method_declaration name: (field_identifier) @name) @method
            (type_declaration (type_spec name: (type_identifier) @name)) @type
            "#
        }
        "java" => {
            r#"
            (class_declaration name: (identifier) @name) @class
            (interface_declaration name: (identifier) @name) @interface
            (method_declaration name: (identifier) @name) @method
            (constructor_declaration name: (identifier) @name) @constructor
            "#
        }
        // Pointer and reference return types wrap the function_declarator,
        // so the name is resolved through the declarator chain instead
        "c" => {
            r#"
            (function_definition) @function
            (struct_specifier name: (type_identifier) @name body: (_)) @struct
            "#
        }
        "cpp" => {
            r#"
            (function_definition) @function
            (class_specifier name: (type_identifier) @name) @class
            (struct_specifier name: (type_identifier) @name body: (_)) @struct
            "#
        }
        "csharp" => {
            r#"
            (class_declaration name: (identifier) @name) @class
            (interface_declaration name: (identifier) @name) @interface
            (method_declaration name: (identifier) @name) @method
            (constructor_declaration name: (identifier) @name) @constructor
            "#
        }
        "ruby" => {
            r#"
            (class name: (constant) @name) @class
            (module name: (constant) @name) @module
            (method name: (identifier) @name) @method
            (singleton_method name: (identifier) @name) @method
            "#
        }
        "php" => {
            r#"
            (class_declaration name: (name) @name) @class
            (function_definition name: (name) @name) @function
            (method_declaration name: (name) @name) @method
            "#
        }
        "kotlin" => {
            r#"
            (class_declaration) @class
            (function_declaration) @function
            "#
        }
        "lua" => "(function_declaration) @function",
        "bash" => "(function_definition name: (word) @name) @function",
        "markdown" => {
            r#"
            (atx_heading) @heading
            (setext_heading) @heading
            (fenced_code_block) @code_block
            "#
        }
        "json" => "(document (object (pair key: (_) @name) @pair))",
        "yaml" => "(block_mapping_pair key: (_) @name) @pair",
        "toml" => {
            r#"
            (table) @table
            (table_array_element) @table
            "#
        }
        "html" => {
            r#"
            (script_element) @script
            (style_element) @style
            "#
        }
        "css" => {
            r#"
            (rule_set) @rule
            (media_statement) @media
            (keyframes_statement) @keyframes
            "#
        }
        _ => return None,
    };
    Some(query)
}

/// Second-attempt query: node kinds only.
pub fn get_fallback_query_for_language(language: &str) -> Option<&'static str> {
    let query = match language {
        "python" => "(function_definition) @function (class_definition) @class",
        "rust" => {
            "(function_item) @function (struct_item) @struct (enum_item) @enum \
             (trait_item) @trait (impl_item) @impl"
        }
        "javascript" => {
            "(function_declaration) @function (method_definition) @method \
             (class_declaration) @class"
        }
        "typescript" | "tsx" => {
            "(function_declaration) @function (method_definition) @method \
             (class_declaration) @class (abstract_class_declaration) @class \
             (interface_declaration) @interface"
        }
        "go" => "(function_declaration) @function (method_declaration) @method",
        "java" | "csharp" => "(class_declaration) @class (method_declaration) @method",
        "c" => "(function_definition) @function",
        "cpp" => "(function_definition) @function (class_specifier) @class",
        "ruby" => "(class) @class (method) @method",
        "php" => "(class_declaration) @class (function_definition) @function",
        "kotlin" => "(class_declaration) @class",
        "bash" => "(function_definition) @function",
        "markdown" => "(atx_heading) @heading",
        "html" => "(element) @element",
        "css" => "(rule_set) @rule",
        _ => return None,
    };
    Some(query)
}

/// Languages that have a primary query.
pub fn languages_with_queries() -> Vec<&'static str> {
    crate::language::supported_languages()
        .iter()
        .copied()
        .filter(|language| get_query_for_language(language).is_some())
        .collect()
}
