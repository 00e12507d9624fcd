//! The top-level driver (C9, §4.10): parses the three revisions, computes
//! the pairwise matchings, builds the class-rep map and the change sets,
//! runs the 3DM resolver, retries once after root-conflict recovery if
//! needed, rebuilds the output tree, and merges import statements.

use log::debug;
use rustc_hash::FxHashSet;
use typed_arena::Arena;

use crate::{
    changeset::{ChangeSet, ConflictKind},
    class_mapping::ClassMapping,
    error::MergeError,
    line_based::line_based_merge,
    matching::Matching,
    merge_result::MergeResult,
    node::AstNode,
    output_tree,
    pcs::{PCSNode, Revision},
    settings::DisplaySettings,
    tree_builder::TreeBuilder,
    tree_matcher::TreeMatcher,
};

const STRUCTURED_METHOD: &str = "structured";
const LINE_BASED_METHOD: &str = "line-based";

fn matcher() -> TreeMatcher {
    TreeMatcher { min_height: 2, sim_threshold: 0.5, max_recovery_size: 100, use_rted: true }
}

/// Runs a full structured merge of the three revisions, falling back to a
/// whole-file line-based merge if parsing fails or an unhandled error
/// surfaces along the way (§4.10, failure semantics).
pub fn merge(contents_base: &str, contents_left: &str, contents_right: &str, settings: &DisplaySettings) -> MergeResult {
    match structured_merge(contents_base, contents_left, contents_right, settings) {
        Ok(result) => result,
        Err(err) => {
            debug!("structured merge failed, falling back to line-based: {err}");
            let merged = line_based_merge(contents_base, contents_left, contents_right, settings);
            MergeResult {
                contents: merged.contents,
                conflict_count: usize::from(merged.has_conflicts),
                method: LINE_BASED_METHOD,
            }
        }
    }
}

fn structured_merge(
    contents_base: &str,
    contents_left: &str,
    contents_right: &str,
    settings: &DisplaySettings,
) -> Result<MergeResult, MergeError> {
    let arena = Arena::new();
    let base = AstNode::parse(contents_base, &arena)?;
    let left = AstNode::parse(contents_left, &arena)?;
    let right = AstNode::parse(contents_right, &arena)?;

    let matcher = matcher();
    let mut base_left = matcher.match_trees(base, left, None).full;
    let mut base_right = matcher.match_trees(base, right, None).full;
    let mut left_right = matcher.match_trees(left, right, None).full;

    let (forest, cleaned, class_mapping) =
        run_resolution(base, left, right, &base_left, &base_right, &left_right);

    // Root-conflict recovery (§4.10 step 6) is scoped to genuine root
    // conflicts (the same predecessor/successor claimed under two
    // different parents): ordinary same-parent forks are left for
    // `tree_builder`'s own handlers and fallback, not purged and retried.
    let root_conflicted: Vec<_> = cleaned
        .structural_conflicts()
        .filter(|(_, kind)| **kind == ConflictKind::Root)
        .flat_map(|(pair, _)| [pair.0, pair.1])
        .filter(|n| matches!(n, PCSNode::Node { .. } | PCSNode::RoleGroup { .. }))
        .collect();

    let (forest, cleaned, class_mapping) = if !root_conflicted.is_empty() {
        // Purge the nodes fought over by two different parents from every
        // matching and retry once.
        purge_conflicting_nodes(&root_conflicted, &mut base_left, &mut base_right, &mut left_right);
        run_resolution(base, left, right, &base_left, &base_right, &left_right)
    } else {
        (forest, cleaned, class_mapping)
    };

    let (output, _has_conflicts) = output_tree::render(&forest, &cleaned, &class_mapping);

    let contents = output.render(settings);
    Ok(MergeResult { contents, conflict_count: output.conflict_count(), method: STRUCTURED_METHOD })
}

type ResolutionResult<'a> = (Vec<crate::tree_builder::SporkTree<'a>>, ChangeSet<'a>, ClassMapping<'a>);

fn run_resolution<'a>(
    base: &'a AstNode<'a>,
    left: &'a AstNode<'a>,
    right: &'a AstNode<'a>,
    base_left: &Matching<'a>,
    base_right: &Matching<'a>,
    left_right: &Matching<'a>,
) -> ResolutionResult<'a> {
    let mut class_mapping = ClassMapping::new();
    class_mapping.add_matching(base_left, Revision::Base, Revision::Left, false);
    class_mapping.add_matching(base_right, Revision::Base, Revision::Right, false);
    class_mapping.add_matching(left_right, Revision::Left, Revision::Right, false);

    let mut base_changeset = ChangeSet::new();
    base_changeset.add_tree(base, Revision::Base, &class_mapping);

    let mut delta = ChangeSet::new();
    delta.add_tree(base, Revision::Base, &class_mapping);
    delta.add_tree(left, Revision::Left, &class_mapping);
    delta.add_tree(right, Revision::Right, &class_mapping);

    let cleaned = crate::merge_3dm::resolve(&delta, &base_changeset);

    let settings = DisplaySettings::default();
    let builder = TreeBuilder::new(&cleaned, &class_mapping, &settings, (base.source, left.source, right.source));
    let forest = builder.build();

    (forest, cleaned, class_mapping)
}

/// Removes every matched pair touching one of `nodes`' representatives (in
/// any revision) or their descendants, from all three matchings.
fn purge_conflicting_nodes<'a>(
    nodes: &[PCSNode<'a>],
    base_left: &mut Matching<'a>,
    base_right: &mut Matching<'a>,
    left_right: &mut Matching<'a>,
) {
    let mut purged_ids = FxHashSet::default();
    for node in nodes {
        let leader = match node {
            PCSNode::Node { node: leader, .. } | PCSNode::RoleGroup { owner: leader, .. } => *leader,
            _ => continue,
        };
        for descendant in leader.as_representative().node.dfs() {
            purged_ids.insert(descendant.id);
        }
    }

    for matching in [base_left, base_right, left_right] {
        let pairs: Vec<(&'a AstNode<'a>, &'a AstNode<'a>)> = matching
            .iter_right_to_left()
            .map(|(right, left)| (*left, *right))
            .filter(|(left, right)| purged_ids.contains(&left.id) || purged_ids.contains(&right.id))
            .collect();
        for (left, right) in pairs {
            matching.remove(left, right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_revisions_merge_without_conflicts() {
        let source = "class A {\n    int x;\n}\n";
        let result = merge(source, source, source, &DisplaySettings::default());
        assert_eq!(result.conflict_count, 0);
        assert_eq!(result.contents, source);
    }

    #[test]
    fn disjoint_field_additions_merge_cleanly() {
        let base = "class A {\n}\n";
        let left = "class A {\n    int x;\n}\n";
        let right = "class A {\n    int y;\n}\n";
        let result = merge(base, left, right, &DisplaySettings::default());
        assert_eq!(result.conflict_count, 0);
        assert!(result.contents.contains("int x"));
        assert!(result.contents.contains("int y"));
    }

    #[test]
    fn conflicting_field_initializers_are_marked() {
        let base = "class A {\n    int x = 1;\n}\n";
        let left = "class A {\n    int x = 2;\n}\n";
        let right = "class A {\n    int x = 3;\n}\n";
        let result = merge(base, left, right, &DisplaySettings::default());
        assert!(result.conflict_count > 0);
        assert!(result.contents.contains("<<<<<<< LEFT"));
    }
}
