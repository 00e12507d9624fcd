//! The 3DM resolver (C5, §4.5): reduces the union change set T* = BASE ∪
//! LEFT ∪ RIGHT to a consistent PCS forest, registering irreconcilable
//! disagreements as structural conflicts and reconciling per-node content
//! along the way (§4.5.1).

use rustc_hash::FxHashSet;

use crate::{
    changeset::{ChangeSet, ConflictKind},
    content_conflict::{self, ModifierMerge, Resolution},
    pcs::{PCS, Revision},
    role::{Role, RoledValue, RoledValues},
};

/// Runs the resolver over `delta` (the union T*), consulting `base_changeset`
/// for the base-agreement fast path, and returns the cleaned change set: the
/// surviving PCS triples, their reconciled contents, and every structural
/// conflict discovered along the way.
pub fn resolve<'a>(delta: &ChangeSet<'a>, base_changeset: &ChangeSet<'a>) -> ChangeSet<'a> {
    let base_set: FxHashSet<PCS<'a>> = base_changeset.iter().copied().collect();
    let mut eliminated: FxHashSet<PCS<'a>> = FxHashSet::default();
    let mut cleaned = ChangeSet::new();

    for pcs in delta.iter() {
        if eliminated.contains(pcs) {
            continue;
        }
        if cleaned.is_conflicted(pcs.predecessor) || cleaned.is_conflicted(pcs.successor) || cleaned.is_conflicted(pcs.parent) {
            continue;
        }

        let others: Vec<PCS<'a>> = delta
            .other_roots(pcs)
            .chain(delta.other_successors(pcs))
            .chain(delta.other_predecessors(pcs))
            .copied()
            .collect();

        let mut pcs_eliminated = false;
        for other in others {
            if eliminated.contains(&other) {
                continue;
            }
            if base_set.contains(&other) {
                eliminated.insert(other);
            } else if base_set.contains(pcs) {
                eliminated.insert(*pcs);
                pcs_eliminated = true;
                break;
            } else {
                register_conflict(&mut cleaned, pcs, &other);
            }
        }

        if !pcs_eliminated {
            cleaned.add(*pcs);
        }
    }

    for (leader, contents) in delta.all_contents() {
        match reconcile_leader_content(contents) {
            Some(merged) => {
                for revision in [Revision::Base, Revision::Left, Revision::Right] {
                    if contents.contains_key(&revision) {
                        cleaned.set_content(*leader, revision, merged.clone());
                    }
                }
            }
            None => {
                for (revision, content) in contents {
                    cleaned.set_content(*leader, *revision, content.clone());
                }
            }
        }
    }

    cleaned
}

/// Determines which pair of `PCSNode`s the disagreement between `pcs` and
/// `other` is actually over, and records it (§4.5 step 4, last branch).
fn register_conflict<'a>(cleaned: &mut ChangeSet<'a>, pcs: &PCS<'a>, other: &PCS<'a>) {
    if pcs.parent != other.parent {
        // shares a predecessor or successor but claimed under a different
        // parent: a move/duplicate-insertion conflict, the only kind
        // root-conflict recovery (§4.10 step 6) is scoped to.
        cleaned.register_structural_conflict(pcs.parent, other.parent, ConflictKind::Root);
    } else if pcs.predecessor == other.predecessor {
        cleaned.register_structural_conflict(pcs.successor, other.successor, ConflictKind::Fork);
    } else {
        cleaned.register_structural_conflict(pcs.predecessor, other.predecessor, ConflictKind::Fork);
    }
}

/// Per-node content reconciliation (§4.5.1). Returns `Some` with a single
/// agreed value to install for every revision that had content, or `None` to
/// leave the per-revision multiset untouched (an unresolved conflict, left
/// for the printer to render).
fn reconcile_leader_content(contents: &rustc_hash::FxHashMap<Revision, RoledValues>) -> Option<RoledValues> {
    let base = contents.get(&Revision::Base);
    let left = contents.get(&Revision::Left);
    let right = contents.get(&Revision::Right);

    let mut distinct: Vec<&RoledValues> = Vec::new();
    for c in [base, left, right].into_iter().flatten() {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }
    if distinct.len() <= 1 {
        return None;
    }

    let left_differs = left.is_some() && left != base;
    let right_differs = right.is_some() && right != base;

    match (left_differs, right_differs) {
        (false, false) => None,
        (true, false) => left.cloned(),
        (false, true) => right.cloned(),
        (true, true) => {
            let (left, right) = (left.unwrap(), right.unwrap());
            if left == right {
                Some(left.clone())
            } else {
                merge_roled_values(base, left, right)
            }
        }
    }
}

fn merge_roled_values(base: Option<&RoledValues>, left: &RoledValues, right: &RoledValues) -> Option<RoledValues> {
    let is_modifier_set = |rv: &RoledValues| rv.iter().any(|v| v.role == Role::Modifier);
    if is_modifier_set(left) || is_modifier_set(right) {
        return merge_modifier_content(base, left, right);
    }

    if left.len() != right.len() {
        return None;
    }

    let mut merged = Vec::with_capacity(left.len());
    for (lv, rv) in left.iter().zip(right.iter()) {
        if lv.role != rv.role {
            return None;
        }
        if lv.value == rv.value {
            merged.push(lv.clone());
            continue;
        }
        let base_value = base.and_then(|b| b.get(lv.role));
        match content_conflict::resolve(lv.role, base_value, &lv.value, &rv.value) {
            Resolution::Merged(value) => merged.push(RoledValue::new(lv.role, value)),
            Resolution::Unresolved => return None,
        }
    }
    Some(RoledValues(merged))
}

fn merge_modifier_content(base: Option<&RoledValues>, left: &RoledValues, right: &RoledValues) -> Option<RoledValues> {
    let empty = RoledValues::new();
    let base_values = base.unwrap_or(&empty);

    let modifiers = match content_conflict::merge_modifiers(&base_values.0, &left.0, &right.0) {
        ModifierMerge::Merged(mods) => mods,
        ModifierMerge::VisibilityConflict { .. } => return None,
    };

    let mut merged: Vec<RoledValue> = modifiers.into_iter().map(|m| RoledValue::new(Role::Modifier, m)).collect();

    let left_default = left.get(Role::IsDefault);
    let right_default = right.get(Role::IsDefault);
    if let (Some(l), Some(r)) = (left_default, right_default) {
        if l == r {
            merged.push(RoledValue::new(Role::IsDefault, l));
        } else {
            match content_conflict::resolve(Role::IsDefault, base_values.get(Role::IsDefault), l, r) {
                Resolution::Merged(value) => merged.push(RoledValue::new(Role::IsDefault, value)),
                Resolution::Unresolved => return None,
            }
        }
    }

    Some(RoledValues(merged))
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use crate::{class_mapping::ClassMapping, node::AstNode};

    use super::*;

    #[test]
    fn identical_revisions_produce_no_conflicts() {
        let arena = Arena::new();
        let base = AstNode::parse("class A { int x; }", &arena).unwrap();
        let left = AstNode::parse("class A { int x; }", &arena).unwrap();
        let right = AstNode::parse("class A { int x; }", &arena).unwrap();

        let class_mapping = ClassMapping::new();
        let mut base_changeset = ChangeSet::new();
        base_changeset.add_tree(base, Revision::Base, &class_mapping);

        let mut delta = ChangeSet::new();
        delta.add_tree(base, Revision::Base, &class_mapping);
        delta.add_tree(left, Revision::Left, &class_mapping);
        delta.add_tree(right, Revision::Right, &class_mapping);

        let cleaned = resolve(&delta, &base_changeset);
        assert!(cleaned.len() > 0);
    }

    #[test]
    fn reconcile_prefers_non_base_side() {
        let base = RoledValues(vec![RoledValue::new(Role::Value, "1")]);
        let left = RoledValues(vec![RoledValue::new(Role::Value, "2")]);
        let right = RoledValues(vec![RoledValue::new(Role::Value, "1")]);

        let mut contents = rustc_hash::FxHashMap::default();
        contents.insert(Revision::Base, base);
        contents.insert(Revision::Left, left.clone());
        contents.insert(Revision::Right, right);

        let merged = reconcile_leader_content(&contents).expect("expected a reconciled value");
        assert_eq!(merged, left);
    }

    #[test]
    fn reconcile_leaves_genuine_conflicts_untouched() {
        let base = RoledValues(vec![RoledValue::new(Role::Value, "1")]);
        let left = RoledValues(vec![RoledValue::new(Role::Value, "2")]);
        let right = RoledValues(vec![RoledValue::new(Role::Value, "3")]);

        let mut contents = rustc_hash::FxHashMap::default();
        contents.insert(Revision::Base, base);
        contents.insert(Revision::Left, left);
        contents.insert(Revision::Right, right);

        assert!(reconcile_leader_content(&contents).is_none());
    }
}
