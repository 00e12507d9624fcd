//! The intermediate Spork tree (C7, §4.8): walks the resolved change set (the
//! output of `merge_3dm::resolve`) from the virtual root and rebuilds a
//! single ordered forest, materializing structural conflicts along the way
//! via the handlers in `structural_conflict` and falling back to a
//! whole-subtree line-based merge when a child list cannot be linearized.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    changeset::ChangeSet,
    class_mapping::{ClassMapping, Leader},
    imports,
    line_based::line_based_merge,
    pcs::{PCSNode, Revision},
    role::Role,
    settings::DisplaySettings,
    structural_conflict::{self, Resolution as StructuralResolution},
};

/// One node of the rebuilt tree, ready for the output-tree builder (§4.9) to
/// turn into concrete elements.
pub enum SporkTree<'a> {
    /// A concrete element, surviving under one leader, with its merged
    /// children in final order.
    Node {
        leader: Leader<'a>,
        children: Vec<SporkTree<'a>>,
    },
    /// A role group's merged children. Flattened back into the owner's
    /// child list by the output-tree builder (§4.9 step 2); never itself
    /// materialized as a distinct element.
    RoleGroup {
        owner: Leader<'a>,
        role: Role,
        children: Vec<SporkTree<'a>>,
    },
    /// A child list that could not be linearized: rendered as a whole-text
    /// conflict instead of a structural one (§4.8.1).
    TextConflict {
        rendered: String,
        has_conflicts: bool,
    },
}

/// The outcome of resolving a fork in a child list (more than one distinct
/// successor recorded for the same predecessor).
enum ConflictOutcome<'a> {
    /// Take this single node next and keep walking the list.
    Next(PCSNode<'a>),
    /// Replaces the remainder of the child list outright (used by the
    /// TYPE_MEMBER concatenation handler, which doesn't produce a
    /// step-by-step linearization but a whole merged order).
    FullOrder(Vec<PCSNode<'a>>),
    /// No handler applied; the owning subtree falls back to line-based merge.
    Unresolved,
}

pub struct TreeBuilder<'a, 'b> {
    cleaned: &'b ChangeSet<'a>,
    class_mapping: &'b ClassMapping<'a>,
    settings: &'b DisplaySettings,
    /// The three whole-file sources, used as the line-based fallback for a
    /// conflict that reaches all the way up to the virtual root (§4.10 step
    /// 6's last resort, since there's no single surviving node to re-parse).
    whole_file: (&'b str, &'b str, &'b str),
}

impl<'a, 'b> TreeBuilder<'a, 'b> {
    pub fn new(
        cleaned: &'b ChangeSet<'a>,
        class_mapping: &'b ClassMapping<'a>,
        settings: &'b DisplaySettings,
        whole_file: (&'b str, &'b str, &'b str),
    ) -> Self {
        Self { cleaned, class_mapping, settings, whole_file }
    }

    /// Builds the forest of compilation units rooted at the virtual root.
    pub fn build(&self) -> Vec<SporkTree<'a>> {
        let mut visited = FxHashSet::default();
        self.build_children(PCSNode::VirtualRoot, &mut visited)
    }

    fn build_children(&self, parent: PCSNode<'a>, visited: &mut FxHashSet<Leader<'a>>) -> Vec<SporkTree<'a>> {
        if let PCSNode::Node { node: leader, .. } = parent
            && leader.is_commutative_parent()
        {
            let mut out = Vec::new();
            for child in imports::commutative_union(&leader, self.class_mapping) {
                let revisions = self.class_mapping.revision_set(&child);
                match self.build_node(PCSNode::Node { node: child, revisions }, visited) {
                    Some(tree) => out.push(tree),
                    // A move/duplicate conflict among the merged imports: no
                    // single order survives, so escalate (§4.8).
                    None => return vec![self.text_conflict_fallback(parent)],
                }
            }
            return out;
        }

        let mut by_predecessor: FxHashMap<PCSNode<'a>, Vec<PCSNode<'a>>> = FxHashMap::default();
        for pcs in self.cleaned.children_pcs(parent) {
            let successors = by_predecessor.entry(pcs.predecessor).or_default();
            if !successors.contains(&pcs.successor) {
                successors.push(pcs.successor);
            }
        }

        let mut out = Vec::new();
        let mut current = PCSNode::LeftMarker;
        loop {
            let Some(candidates) = by_predecessor.get(&current).cloned() else {
                break;
            };
            match candidates.as_slice() {
                [] => break,
                [only] => {
                    if *only == PCSNode::RightMarker {
                        break;
                    }
                    match self.build_node(*only, visited) {
                        Some(child) => out.push(child),
                        // Already placed elsewhere: a move/duplicate
                        // conflict the resolver didn't catch (§4.8).
                        None => return vec![self.text_conflict_fallback(parent)],
                    }
                    current = *only;
                }
                many => match self.resolve_conflict(parent, &by_predecessor, current, many) {
                    ConflictOutcome::Next(node) => {
                        if node == PCSNode::RightMarker {
                            break;
                        }
                        match self.build_node(node, visited) {
                            Some(child) => out.push(child),
                            None => return vec![self.text_conflict_fallback(parent)],
                        }
                        current = node;
                    }
                    ConflictOutcome::FullOrder(nodes) => {
                        for node in nodes {
                            match self.build_node(node, visited) {
                                Some(child) => out.push(child),
                                None => return vec![self.text_conflict_fallback(parent)],
                            }
                        }
                        break;
                    }
                    ConflictOutcome::Unresolved => return vec![self.text_conflict_fallback(parent)],
                },
            }
        }
        out
    }

    fn build_node(&self, node: PCSNode<'a>, visited: &mut FxHashSet<Leader<'a>>) -> Option<SporkTree<'a>> {
        match node {
            PCSNode::Node { node: leader, .. } => {
                if !visited.insert(leader) {
                    // Already placed elsewhere in the tree: a move/duplicate
                    // conflict that slipped past the resolver (§4.8, "move
                    // conflict"). Callers escalate this to the enclosing
                    // subtree's text-conflict fallback rather than placing
                    // it twice or dropping it silently.
                    return None;
                }
                let children = self.build_children(node, visited);
                Some(SporkTree::Node { leader, children })
            }
            PCSNode::RoleGroup { owner, role, .. } => {
                let children = self.build_children(node, visited);
                Some(SporkTree::RoleGroup { owner, role, children })
            }
            PCSNode::VirtualRoot | PCSNode::LeftMarker | PCSNode::RightMarker => None,
        }
    }

    fn resolve_conflict(
        &self,
        parent: PCSNode<'a>,
        by_predecessor: &FxHashMap<PCSNode<'a>, Vec<PCSNode<'a>>>,
        current: PCSNode<'a>,
        candidates: &[PCSNode<'a>],
    ) -> ConflictOutcome<'a> {
        if let PCSNode::RoleGroup { role: Role::TypeMember, .. } = parent {
            let left_chain = self.side_chain(by_predecessor, current, Revision::Left);
            let right_chain = self.side_chain(by_predecessor, current, Revision::Right);
            let left_with_sig: Vec<(PCSNode<'a>, Option<String>)> =
                left_chain.iter().map(|n| (*n, Self::signature_of(n))).collect();
            let right_with_sig: Vec<(PCSNode<'a>, Option<String>)> =
                right_chain.iter().map(|n| (*n, Self::signature_of(n))).collect();
            return ConflictOutcome::FullOrder(structural_conflict::type_member_ordering(&left_with_sig, &right_with_sig));
        }

        let left_insertions: Vec<PCSNode<'a>> = candidates
            .iter()
            .copied()
            .filter(|c| self.present_in(c, Revision::Left) && !self.present_in(c, Revision::Right))
            .collect();
        let right_insertions: Vec<PCSNode<'a>> = candidates
            .iter()
            .copied()
            .filter(|c| self.present_in(c, Revision::Right) && !self.present_in(c, Revision::Left))
            .collect();

        match structural_conflict::optimistic_empty_side(&left_insertions, &right_insertions) {
            StructuralResolution::Resolved(nodes) if nodes.is_empty() => ConflictOutcome::Next(PCSNode::RightMarker),
            StructuralResolution::Resolved(mut nodes) => ConflictOutcome::Next(nodes.remove(0)),
            StructuralResolution::NoHandler => ConflictOutcome::Unresolved,
        }
    }

    /// Walks the successor chain from `start`, following only edges whose
    /// destination is present at `side`, stopping at the list's end marker.
    fn side_chain(
        &self,
        by_predecessor: &FxHashMap<PCSNode<'a>, Vec<PCSNode<'a>>>,
        start: PCSNode<'a>,
        side: Revision,
    ) -> Vec<PCSNode<'a>> {
        let mut chain = Vec::new();
        let mut current = start;
        while let Some(candidates) = by_predecessor.get(&current) {
            let Some(next) = candidates.iter().find(|c| self.present_in(c, side)).copied() else {
                break;
            };
            if next == PCSNode::RightMarker {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    fn present_in(&self, node: &PCSNode<'a>, side: Revision) -> bool {
        match node {
            PCSNode::Node { revisions, .. } | PCSNode::RoleGroup { revisions, .. } => revisions.contains(side),
            _ => true,
        }
    }

    fn signature_of(node: &PCSNode<'a>) -> Option<String> {
        match node {
            PCSNode::Node { node: leader, .. } => leader.signature(),
            _ => None,
        }
    }

    fn text_conflict_fallback(&self, parent: PCSNode<'a>) -> SporkTree<'a> {
        let owner = match parent {
            PCSNode::Node { node: leader, .. } => Some(leader),
            PCSNode::RoleGroup { owner, .. } => Some(owner),
            _ => None,
        };
        let (base, left, right) = match owner {
            Some(leader) => (
                self.class_mapping.node_at_rev(&leader, Revision::Base).map_or_else(String::new, |n| n.source.to_string()),
                self.class_mapping.node_at_rev(&leader, Revision::Left).map_or_else(String::new, |n| n.source.to_string()),
                self.class_mapping.node_at_rev(&leader, Revision::Right).map_or_else(String::new, |n| n.source.to_string()),
            ),
            // A conflict at the virtual root: no single surviving node covers
            // it, so fall back to the three whole files.
            None => (self.whole_file.0.to_string(), self.whole_file.1.to_string(), self.whole_file.2.to_string()),
        };
        let merged = line_based_merge(&base, &left, &right, self.settings);
        SporkTree::TextConflict { rendered: merged.contents, has_conflicts: merged.has_conflicts }
    }
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use crate::{merge_3dm, node::AstNode, tree_matcher::TreeMatcher};

    use super::*;

    fn matcher() -> TreeMatcher {
        TreeMatcher { min_height: 2, sim_threshold: 0.5, max_recovery_size: 100, use_rted: true }
    }

    #[test]
    fn identical_revisions_rebuild_the_whole_tree() {
        let arena = Arena::new();
        let source = "class A { int x; }";
        let base = AstNode::parse(source, &arena).unwrap();
        let left = AstNode::parse(source, &arena).unwrap();
        let right = AstNode::parse(source, &arena).unwrap();

        let class_mapping = ClassMapping::new();
        let mut base_changeset = ChangeSet::new();
        base_changeset.add_tree(base, Revision::Base, &class_mapping);

        let mut delta = ChangeSet::new();
        delta.add_tree(base, Revision::Base, &class_mapping);
        delta.add_tree(left, Revision::Left, &class_mapping);
        delta.add_tree(right, Revision::Right, &class_mapping);

        let cleaned = merge_3dm::resolve(&delta, &base_changeset);
        let settings = DisplaySettings::default();
        let builder = TreeBuilder::new(&cleaned, &class_mapping, &settings, (source, source, source));
        let forest = builder.build();

        assert_eq!(forest.len(), 1);
        assert!(matches!(forest[0], SporkTree::Node { .. }));
    }

    #[test]
    fn disjoint_additions_on_both_sides_are_both_kept() {
        let arena = Arena::new();
        let base = AstNode::parse("class A {}\n", &arena).unwrap();
        let left = AstNode::parse("class A {}\nclass B {}\n", &arena).unwrap();
        let right = AstNode::parse("class A {}\nclass C {}\n", &arena).unwrap();

        let mut class_mapping = ClassMapping::new();
        class_mapping.add_matching(&matcher().match_trees(base, left, None).full, Revision::Base, Revision::Left, false);
        class_mapping.add_matching(&matcher().match_trees(base, right, None).full, Revision::Base, Revision::Right, false);

        let mut base_changeset = ChangeSet::new();
        base_changeset.add_tree(base, Revision::Base, &class_mapping);

        let mut delta = ChangeSet::new();
        delta.add_tree(base, Revision::Base, &class_mapping);
        delta.add_tree(left, Revision::Left, &class_mapping);
        delta.add_tree(right, Revision::Right, &class_mapping);

        let cleaned = merge_3dm::resolve(&delta, &base_changeset);
        let settings = DisplaySettings::default();
        let builder = TreeBuilder::new(&cleaned, &class_mapping, &settings, ("class A {}\n", "class A {}\nclass B {}\n", "class A {}\nclass C {}\n"));
        let forest = builder.build();

        assert_eq!(forest.len(), 3);
    }
}
