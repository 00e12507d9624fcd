//! Java-specific configuration consumed by the Node model (role groups),
//! the content resolver (per-kind `RoledValues` extraction) and the
//! structural-conflict handlers (commutative/type-member-ordering parents).
//!
//! This plays the role the teacher's generic, multi-language `LangProfile`
//! played, specialized down to a single, fixed configuration since this
//! crate only ever merges Java.

use crate::role::Role;

/// For a small, fixed set of element kinds, the grammar wraps two unordered
/// concerns (type parameters and value parameters, or type parameters and
/// type members) in separate container fields. The 3DM model instead treats
/// the *contents* of those wrapper fields as role-group children of the
/// owning element directly (§3.1, §4.1), so that adding a parameter on one
/// side and a type parameter on the other never produces a spurious PCS
/// conflict over "who comes last".
///
/// Returns `None` for element kinds with a single homogeneous child list
/// (the common case; tree-sitter's field-based grammar already gives those
/// their own container, so no splitting is needed).
pub fn role_groups_for(kind: &str) -> Option<&'static [(Role, &'static str)]> {
    match kind {
        "method_declaration" | "constructor_declaration" => {
            Some(&[(Role::TypeParameter, "type_parameters"), (Role::Parameter, "parameters")])
        }
        "class_declaration" | "interface_declaration" | "record_declaration" => {
            Some(&[(Role::TypeParameter, "type_parameters"), (Role::TypeMember, "body")])
        }
        _ => None,
    }
}

/// Element kinds whose child list is a *commutative parent* (§4.6.1 calls
/// out MODIFIER specifically; this is the structural counterpart: a child
/// list where source order is not semantically meaningful, so insertions
/// from both sides should be unioned rather than treated as a strict
/// successor conflict).
///
/// `program` is the one case this applies to: tree-sitter-java gives import
/// declarations no wrapper node of their own (they're direct repeated
/// children of `program`, interleaved with the package declaration and type
/// declarations), and in practice reordering among those three concerns
/// never carries meaning (§4.10 step 8, import-statement set-union).
///
/// `class_body` (the TYPE_MEMBER role group) is intentionally *not* listed
/// here: spec.md's type-member-ordering handler (§4.7) explicitly
/// concatenates LEFT ++ RIGHT rather than commutatively merging, and
/// documents that as a known non-commutativity (§9).
pub fn is_commutative_parent(kind: &str) -> bool {
    matches!(kind, "program")
}

/// Element kinds representing a single comment.
pub fn is_comment(kind: &str) -> bool {
    matches!(kind, "line_comment" | "block_comment")
}

/// Element kinds whose structural children are exactly one TYPE_MEMBER role
/// group (used by the type-member-ordering structural-conflict handler to
/// recognize when it applies).
pub fn is_type_member_container(kind: &str) -> bool {
    matches!(
        kind,
        "class_body" | "interface_body" | "enum_body_declarations" | "annotation_type_body"
    )
}

/// Best-effort signature used to deduplicate type members that the
/// differencer failed to match as a single class (e.g. two independently
/// authored, textually identical methods): the element kind plus its name
/// and parameter-type list. Returns `None` for kinds with no natural
/// signature (fields, initializer blocks, ...).
pub fn member_signature(node: &crate::node::AstNode) -> Option<String> {
    match node.kind {
        "method_declaration" | "constructor_declaration" => {
            let name = node
                .children_by_field_name("name")
                .first()
                .map(|n| n.source)
                .unwrap_or_default();
            let params = node
                .children_by_field_name("parameters")
                .first()
                .map(|p| {
                    p.children
                        .iter()
                        .filter(|c| c.kind == "formal_parameter" || c.kind == "spread_parameter")
                        .filter_map(|c| c.children_by_field_name("type").first().map(|t| t.source))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            Some(format!("{}({})", name, params))
        }
        _ => None,
    }
}
