//! The content resolver (§3.3, §4.6): a pure function from an AST element to
//! the `RoledValues` it contributes to T*. Every element kind not explicitly
//! handled below is purely structural and contributes no content.

use crate::{java_profile, node::AstNode, role::{Role, RoledValues}};

const LITERAL_KINDS: &[&str] = &[
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "hex_floating_point_literal",
    "true",
    "false",
    "character_literal",
    "string_literal",
    "null_literal",
];

const NAME_KINDS: &[&str] = &["identifier", "type_identifier", "scoped_identifier", "scoped_type_identifier"];

const MODIFIER_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "static", "final", "abstract", "synchronized", "native",
    "strictfp", "transient", "volatile", "sealed", "non-sealed",
];

/// Extracts the `RoledValues` for a single node, per the per-kind table in
/// §4.6. Returns an empty collection for purely structural nodes.
pub fn extract(node: &AstNode) -> RoledValues {
    let mut values = RoledValues::new();

    if LITERAL_KINDS.contains(&node.kind) {
        values.push(Role::Value, node.source);
    }

    if NAME_KINDS.contains(&node.kind) {
        values.push(Role::Name, normalize_anonymous_class_name(node.source));
    }

    match node.kind {
        "binary_expression" | "unary_expression" | "assignment_expression" | "update_expression" => {
            if let Some(operator) = node.children_by_field_name("operator").first() {
                values.push(Role::OperatorKind, operator.source);
            }
        }
        "spread_parameter" => {
            values.push(Role::IsVarargs, "true");
            values.push(Role::IsInferred, if is_inferred_parameter(node) { "true" } else { "false" });
        }
        "formal_parameter" => {
            values.push(Role::IsVarargs, "false");
            values.push(Role::IsInferred, if is_inferred_parameter(node) { "true" } else { "false" });
        }
        "local_variable_declaration" => {
            let is_var = node
                .children_by_field_name("type")
                .first()
                .is_some_and(|t| t.source == "var");
            values.push(Role::IsInferred, if is_var { "true" } else { "false" });
        }
        // `super`/`extends` are anonymous keyword tokens in a wildcard bound
        // (e.g. `? extends Foo`), so the bound is read off the source text
        // directly rather than off a typed child.
        "wildcard" => {
            values.push(Role::IsUpper, if node.source.contains("extends") { "true" } else { "false" });
        }
        // Modifier keywords (`public`, `static`, ...) are anonymous tokens
        // too; split the node's own source text instead of walking children.
        "modifiers" => {
            for word in node.source.split_whitespace() {
                if MODIFIER_KEYWORDS.contains(&word) {
                    values.push(Role::Modifier, word);
                }
            }
            let is_default = node.source.split_whitespace().any(|w| w == "default");
            values.push(Role::IsDefault, if is_default { "true" } else { "false" });
        }
        _ if java_profile::is_comment(node.kind) => {
            values.push(Role::CommentContent, node.source);
            values.push(
                Role::CommentType,
                if node.kind == "line_comment" { "LINE" } else { "BLOCK" },
            );
        }
        _ => {}
    }

    values
}

/// Whether a `formal_parameter`/`spread_parameter` declares its type with
/// `var` rather than spelling it out (e.g. a lambda parameter `(var x) ->`).
fn is_inferred_parameter(node: &AstNode) -> bool {
    node.children_by_field_name("type").first().is_some_and(|t| t.source == "var")
}

/// Anonymous class bodies are numbered by tree-sitter only incidentally
/// (they have no name at all); normalize any bare numeric name to a fixed
/// placeholder so two independently-introduced anonymous classes never
/// spuriously conflict over their "identity" (§4.6, NAME role notes).
fn normalize_anonymous_class_name(source: &str) -> &str {
    if source.bytes().all(|b| b.is_ascii_digit()) && !source.is_empty() {
        "0"
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use super::*;

    #[test]
    fn literal_gets_value_role() {
        let arena = Arena::new();
        let root = AstNode::parse("class A { int x = 3; }", &arena).unwrap();
        let literal = root
            .dfs()
            .find(|n| n.kind == "decimal_integer_literal")
            .unwrap();
        let content = extract(literal);
        assert_eq!(content.get(Role::Value), Some("3"));
    }

    #[test]
    fn modifiers_are_extracted_individually() {
        let arena = Arena::new();
        let root = AstNode::parse("class A { public static void f() {} }", &arena).unwrap();
        let modifiers = root.dfs().find(|n| n.kind == "modifiers").unwrap();
        let content = extract(modifiers);
        let modifier_values: Vec<_> = content
            .iter()
            .filter(|rv| rv.role == Role::Modifier)
            .map(|rv| rv.value.as_str())
            .collect();
        assert_eq!(modifier_values, vec!["public", "static"]);
    }

    #[test]
    fn non_content_node_has_no_content() {
        let arena = Arena::new();
        let root = AstNode::parse("class A {}", &arena).unwrap();
        assert!(extract(root).is_empty());
    }
}
