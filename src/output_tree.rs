//! The output tree builder (C8, §4.9): walks a `SporkTree` forest and
//! renders it to final text. Unchanged leaves print their surviving
//! revision's source verbatim; leaves whose content the 3DM resolver
//! (§4.5.1) could not reconcile are rendered as a content conflict.
//! Inter-child whitespace is recovered from whichever revision still has
//! the node, by reusing that revision's original gaps between children.

use rustc_hash::FxHashMap;

use crate::{
    changeset::ChangeSet,
    class_mapping::{ClassMapping, Leader},
    node::AstNode,
    pcs::Revision,
    printer::MergedText,
    role::{Role, RoledValues},
    tree_builder::SporkTree,
};

/// Renders a merged forest of compilation units, returning the accumulated
/// text and whether any conflict (structural or content) survived.
pub fn render<'a>(forest: &[SporkTree<'a>], cleaned: &ChangeSet<'a>, class_mapping: &ClassMapping<'a>) -> (MergedText, bool) {
    let mut output = MergedText::new();
    let mut has_conflicts = false;
    for (i, unit) in forest.iter().enumerate() {
        if i > 0 {
            output.push_merged("\n");
        }
        has_conflicts |= render_tree(unit, cleaned, class_mapping, &mut output);
    }
    (output, has_conflicts)
}

fn render_tree<'a>(tree: &SporkTree<'a>, cleaned: &ChangeSet<'a>, class_mapping: &ClassMapping<'a>, output: &mut MergedText) -> bool {
    match tree {
        SporkTree::TextConflict { rendered, has_conflicts } => {
            output.push_merged(rendered.clone());
            *has_conflicts
        }
        SporkTree::RoleGroup { owner, role, children } => {
            render_list(*owner, *role, children, cleaned, class_mapping, output)
        }
        SporkTree::Node { leader, children } => render_node(*leader, children, cleaned, class_mapping, output),
    }
}

fn render_node<'a>(
    leader: Leader<'a>,
    children: &[SporkTree<'a>],
    cleaned: &ChangeSet<'a>,
    class_mapping: &ClassMapping<'a>,
    output: &mut MergedText,
) -> bool {
    if children.is_empty() {
        return render_leaf(leader, cleaned, class_mapping, output);
    }

    let glue = preferred_revision(&leader, class_mapping)
        .and_then(|rev| class_mapping.node_at_rev(&leader, rev).map(|node| (node, rev)))
        .map(|(node, rev)| glue_map(node, &leader, rev, class_mapping))
        .unwrap_or_default();

    let mut has_conflicts = false;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            let separator = child_leader(child).and_then(|l| glue.get(&l)).cloned().unwrap_or_else(|| default_separator(leader.grammar_name()).to_string());
            output.push_merged(separator);
        }
        has_conflicts |= render_tree(child, cleaned, class_mapping, output);
    }
    has_conflicts
}

fn render_list<'a>(
    owner: Leader<'a>,
    role: Role,
    children: &[SporkTree<'a>],
    cleaned: &ChangeSet<'a>,
    class_mapping: &ClassMapping<'a>,
    output: &mut MergedText,
) -> bool {
    let _ = owner;
    let mut has_conflicts = false;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            output.push_merged(separator_for_role(role));
        }
        has_conflicts |= render_tree(child, cleaned, class_mapping, output);
    }
    has_conflicts
}

fn render_leaf<'a>(leader: Leader<'a>, cleaned: &ChangeSet<'a>, class_mapping: &ClassMapping<'a>, output: &mut MergedText) -> bool {
    match cleaned.contents(&leader) {
        Some(contents) if distinct_values(contents) > 1 => {
            let text_at = |rev: Revision| class_mapping.node_at_rev(&leader, rev).map_or_else(String::new, |n| n.source.to_string());
            output.push_conflict(text_at(Revision::Base), text_at(Revision::Left), text_at(Revision::Right));
            true
        }
        _ => {
            if let Some(rev) = preferred_revision(&leader, class_mapping)
                && let Some(node) = class_mapping.node_at_rev(&leader, rev)
            {
                output.push_merged(node.source.to_string());
            }
            false
        }
    }
}

fn distinct_values(contents: &FxHashMap<Revision, RoledValues>) -> usize {
    let mut seen: Vec<&RoledValues> = Vec::new();
    for value in contents.values() {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen.len()
}

fn preferred_revision<'a>(leader: &Leader<'a>, class_mapping: &ClassMapping<'a>) -> Option<Revision> {
    [Revision::Left, Revision::Right, Revision::Base]
        .into_iter()
        .find(|rev| class_mapping.node_at_rev(leader, *rev).is_some())
}

fn child_leader<'a>(tree: &SporkTree<'a>) -> Option<Leader<'a>> {
    match tree {
        SporkTree::Node { leader, .. } => Some(*leader),
        SporkTree::RoleGroup { owner, .. } => Some(*owner),
        SporkTree::TextConflict { .. } => None,
    }
}

/// The whitespace gaps between `template`'s own children, keyed by the
/// leader each child maps to. Children inserted by the merge with no
/// counterpart in `template` aren't present in this map; callers fall back
/// to `default_separator`.
fn glue_map<'a>(
    template: &'a AstNode<'a>,
    leader: &Leader<'a>,
    revision: Revision,
    class_mapping: &ClassMapping<'a>,
) -> FxHashMap<Leader<'a>, String> {
    let Some(child_leaders) = class_mapping.children_at_revision(leader, revision) else {
        return FxHashMap::default();
    };
    let mut map = FxHashMap::default();
    let mut prev_end = 0usize;
    for (child_node, child_leader) in template.children.iter().zip(child_leaders.iter()) {
        let start = child_node.byte_range.start.saturating_sub(template.byte_range.start).min(template.source.len());
        if prev_end <= start {
            map.insert(*child_leader, template.source[prev_end..start].to_string());
        }
        prev_end = child_node.byte_range.end.saturating_sub(template.byte_range.start).min(template.source.len());
    }
    map
}

fn separator_for_role(role: Role) -> &'static str {
    match role {
        Role::TypeParameter | Role::Parameter => ", ",
        Role::TypeMember => "\n\n",
        Role::Then | Role::Else => " ",
        _ => " ",
    }
}

fn default_separator(kind: &str) -> &'static str {
    if kind == "program" || kind.ends_with("_body") || kind.ends_with("_block") {
        "\n"
    } else {
        " "
    }
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use crate::{merge_3dm, node::AstNode, tree_builder::TreeBuilder};

    use super::*;

    #[test]
    fn unchanged_tree_renders_back_to_its_own_source() {
        let arena = Arena::new();
        let source = "class A {\n    int x;\n}\n";
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
        let settings = crate::settings::DisplaySettings::default();
        let builder = TreeBuilder::new(&cleaned, &class_mapping, &settings, (source, source, source));
        let forest = builder.build();

        let (text, has_conflicts) = render(&forest, &cleaned, &class_mapping);
        assert!(!has_conflicts);
        assert_eq!(text.render(&settings), source);
    }
}
