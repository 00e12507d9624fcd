//! Commutative-parent merging: a compilation unit's `program` node is the
//! one parent the node model marks order-insensitive (see
//! `Leader::is_commutative_parent`), since tree-sitter-java gives import
//! declarations no wrapper node of their own — they're direct, interleaved
//! children of `program` alongside the package and type declarations. Its
//! children are merged as a set rather than linearized like an ordinary
//! child list. A child kept by both sides survives; one added by either
//! side is kept; one missing from a side that still had it in BASE is
//! dropped.

use crate::{
    class_mapping::{ClassMapping, Leader},
    pcs::Revision,
};

/// The merged child order for a commutative parent: BASE survivors first
/// (in BASE order), then LEFT-only additions, then RIGHT-only additions.
pub fn commutative_union<'a>(leader: &Leader<'a>, class_mapping: &ClassMapping<'a>) -> Vec<Leader<'a>> {
    let base = class_mapping.children_at_revision(leader, Revision::Base).unwrap_or_default();
    let left = class_mapping.children_at_revision(leader, Revision::Left).unwrap_or_default();
    let right = class_mapping.children_at_revision(leader, Revision::Right).unwrap_or_default();

    let mut result = Vec::with_capacity(base.len() + left.len() + right.len());
    for child in &base {
        if left.contains(child) && right.contains(child) {
            result.push(*child);
        }
    }
    for child in left.iter().chain(right.iter()) {
        if !base.contains(child) && !result.contains(child) {
            result.push(*child);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use super::*;
    use crate::{class_mapping::RevNode, node::AstNode, tree_matcher::TreeMatcher};

    fn matcher() -> TreeMatcher {
        TreeMatcher { min_height: 2, sim_threshold: 0.5, max_recovery_size: 100, use_rted: true }
    }

    #[test]
    fn additions_on_both_sides_are_both_kept() {
        let arena = Arena::new();
        let base = AstNode::parse("import a.A;\n\nclass X {}\n", &arena).unwrap();
        let left = AstNode::parse("import a.A;\nimport b.B;\n\nclass X {}\n", &arena).unwrap();
        let right = AstNode::parse("import a.A;\nimport c.C;\n\nclass X {}\n", &arena).unwrap();

        let mut class_mapping = ClassMapping::new();
        class_mapping.add_matching(&matcher().match_trees(base, left, None).full, Revision::Base, Revision::Left, false);
        class_mapping.add_matching(&matcher().match_trees(base, right, None).full, Revision::Base, Revision::Right, false);

        assert_eq!(base.kind, "program");

        let program_leader = class_mapping.map_to_leader(RevNode::new(Revision::Base, base));
        let merged = commutative_union(&program_leader, &class_mapping);

        // The shared import, both additions, and the class declaration.
        assert_eq!(merged.len(), 4);
    }
}
