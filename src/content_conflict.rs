//! Content-conflict handlers (§4.6): role-typed reconciliation rules applied
//! when a node's content differs across at least two revisions and neither
//! side is a no-op relative to base. Each handler either produces a single
//! reconciled value or leaves the conflict for the printer to render as a
//! literal content conflict.

use diffy_imara::MergeOptions;
use itertools::Itertools;

use crate::role::{Role, RoledValue};

/// The outcome of attempting to reconcile a content conflict for one role.
pub enum Resolution {
    /// The values were merged into a single agreed value.
    Merged(String),
    /// Could not be reconciled; render both sides as a conflict.
    Unresolved,
}

/// Attempts to resolve a conflict between `base`, `left` and `right` values
/// for a single role, dispatching on the role-specific handler table (§4.6).
/// `base` is `None` when the role was absent from the base revision.
pub fn resolve(role: Role, base: Option<&str>, left: &str, right: &str) -> Resolution {
    match role {
        Role::CommentContent => resolve_comment_content(base, left, right),
        // a boolean flag never conflicts: whichever side flips it away from
        // base wins, and if both flip it the same way there's no conflict.
        Role::IsImplicit | Role::IsVarargs | Role::IsInferred | Role::IsDefault => {
            resolve_boolean_flag(base, left, right)
        }
        Role::IsUpper => resolve_boolean_flag(base, left, right),
        _ => Resolution::Unresolved,
    }
}

fn resolve_boolean_flag(base: Option<&str>, left: &str, right: &str) -> Resolution {
    if left == right {
        return Resolution::Merged(left.to_string());
    }
    match base {
        Some(base) if base == left => Resolution::Merged(right.to_string()),
        Some(base) if base == right => Resolution::Merged(left.to_string()),
        _ => Resolution::Unresolved,
    }
}

/// Comments never produce a hard conflict: their textual content is merged
/// with a line-based diff, since a human can always reconcile prose freely.
fn resolve_comment_content(base: Option<&str>, left: &str, right: &str) -> Resolution {
    if left == right {
        return Resolution::Merged(left.to_string());
    }
    let base = base.unwrap_or("");
    match MergeOptions::new().merge(base, left, right) {
        Ok(merged) => Resolution::Merged(merged),
        Err(_) => Resolution::Unresolved,
    }
}

/// The outcome of merging a MODIFIER set across three revisions (§4.6.1).
pub enum ModifierMerge {
    Merged(Vec<String>),
    VisibilityConflict { left: Vec<String>, right: Vec<String> },
}

const VISIBILITY_MODIFIERS: &[&str] = &["public", "private", "protected"];

/// Merges the MODIFIER role-group (a commutative set, unlike most content
/// roles) by partitioning into visibility / inheritance-related / other
/// modifiers and reconciling each partition independently (§4.6.1).
///
/// Visibility modifiers are mutually exclusive by construction, so any
/// disagreement where both sides changed visibility away from base (to
/// different values) is a genuine conflict; everything else unions the
/// symmetric differences from base.
pub fn merge_modifiers(base: &[RoledValue], left: &[RoledValue], right: &[RoledValue]) -> ModifierMerge {
    let base_set: Vec<&str> = base.iter().filter(|rv| rv.role == Role::Modifier).map(|rv| rv.value.as_str()).collect();
    let left_set: Vec<&str> = left.iter().filter(|rv| rv.role == Role::Modifier).map(|rv| rv.value.as_str()).collect();
    let right_set: Vec<&str> = right.iter().filter(|rv| rv.role == Role::Modifier).map(|rv| rv.value.as_str()).collect();

    let base_vis = base_set.iter().find(|m| VISIBILITY_MODIFIERS.contains(*m));
    let left_vis = left_set.iter().find(|m| VISIBILITY_MODIFIERS.contains(*m));
    let right_vis = right_set.iter().find(|m| VISIBILITY_MODIFIERS.contains(*m));

    let resolved_vis = match (base_vis, left_vis, right_vis) {
        (_, l, r) if l == r => l.copied(),
        (b, l, r) if b == l => r.copied(),
        (b, l, r) if b == r => l.copied(),
        _ => {
            return ModifierMerge::VisibilityConflict {
                left: left_set.into_iter().map(String::from).collect(),
                right: right_set.into_iter().map(String::from).collect(),
            };
        }
    };

    let is_other = |m: &&str| !VISIBILITY_MODIFIERS.contains(m);
    let base_other: Vec<&str> = base_set.iter().copied().filter(|m| is_other(m)).collect();
    let left_other: Vec<&str> = left_set.iter().copied().filter(|m| is_other(m)).collect();
    let right_other: Vec<&str> = right_set.iter().copied().filter(|m| is_other(m)).collect();

    // symmetric-difference union: keep what base had unless one side
    // dropped it, plus whatever either side added.
    let merged_other: Vec<&str> = base_other
        .iter()
        .copied()
        .filter(|m| left_other.contains(m) && right_other.contains(m))
        .chain(left_other.iter().copied().filter(|m| !base_other.contains(m)))
        .chain(right_other.iter().copied().filter(|m| !base_other.contains(m)))
        .unique()
        .collect();

    let mut merged: Vec<String> = resolved_vis.map(String::from).into_iter().chain(merged_other.into_iter().map(String::from)).collect();
    merged.sort();
    ModifierMerge::Merged(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_flag_prefers_side_that_changed_it() {
        let res = resolve_boolean_flag(Some("false"), "true", "false");
        assert!(matches!(res, Resolution::Merged(v) if v == "true"));
    }

    #[test]
    fn boolean_flag_conflicts_when_both_change_differently() {
        // base is absent (e.g. a brand new node on both sides) and the two
        // sides disagree: unresolved.
        let res = resolve_boolean_flag(None, "true", "false");
        assert!(matches!(res, Resolution::Unresolved));
    }

    #[test]
    fn modifier_merge_unions_additions_from_both_sides() {
        let base = vec![RoledValue::new(Role::Modifier, "static")];
        let left = vec![
            RoledValue::new(Role::Modifier, "static"),
            RoledValue::new(Role::Modifier, "public"),
        ];
        let right = vec![
            RoledValue::new(Role::Modifier, "static"),
            RoledValue::new(Role::Modifier, "final"),
        ];
        match merge_modifiers(&base, &left, &right) {
            ModifierMerge::Merged(mods) => {
                assert!(mods.contains(&"public".to_string()));
                assert!(mods.contains(&"final".to_string()));
                assert!(mods.contains(&"static".to_string()));
            }
            ModifierMerge::VisibilityConflict { .. } => panic!("expected a clean merge"),
        }
    }

    #[test]
    fn conflicting_visibility_changes_are_reported() {
        let base = vec![RoledValue::new(Role::Modifier, "private")];
        let left = vec![RoledValue::new(Role::Modifier, "public")];
        let right = vec![RoledValue::new(Role::Modifier, "protected")];
        match merge_modifiers(&base, &left, &right) {
            ModifierMerge::VisibilityConflict { left, right } => {
                assert_eq!(left, vec!["public".to_string()]);
                assert_eq!(right, vec!["protected".to_string()]);
            }
            ModifierMerge::Merged(_) => panic!("expected a visibility conflict"),
        }
    }
}
