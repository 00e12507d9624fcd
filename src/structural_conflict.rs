//! Structural-conflict handlers (§4.7): applied to an INSERT_INSERT
//! disagreement over a child list's order before falling back to a
//! whole-subtree line-based merge.

use itertools::Itertools;

use crate::pcs::PCSNode;

/// The outcome of attempting a structural-conflict handler.
pub enum Resolution<'a> {
    /// A single, agreed linearization of the child list.
    Resolved(Vec<PCSNode<'a>>),
    /// No handler applied; caller should fall back to a line-based merge of
    /// the owning subtree (§4.8.1).
    NoHandler,
}

/// Picks the non-empty side when one of the two conflicting insertions is an
/// empty list (§4.7, "optimistic empty side"): a side that inserted nothing
/// can never meaningfully conflict with a side that inserted something.
pub fn optimistic_empty_side<'a>(
    left_insertions: &[PCSNode<'a>],
    right_insertions: &[PCSNode<'a>],
) -> Resolution<'a> {
    match (left_insertions.is_empty(), right_insertions.is_empty()) {
        (true, true) => Resolution::Resolved(Vec::new()),
        (true, false) => Resolution::Resolved(right_insertions.to_vec()),
        (false, true) => Resolution::Resolved(left_insertions.to_vec()),
        (false, false) => Resolution::NoHandler,
    }
}

/// Resolves an INSERT_INSERT conflict on a TYPE_MEMBER role group by
/// concatenating LEFT ++ RIGHT (§4.7, §9): type member order is not
/// semantically meaningful enough to warrant a genuine structural conflict,
/// but it is also not commutative, so the two insertion lists are simply
/// appended rather than merged as a symmetric difference.
///
/// Members independently added on both sides with the same signature
/// (`java_profile::member_signature`) are deduplicated, keeping the left
/// copy, since the differencer likely failed to match them as a single
/// class only because their bodies diverged too.
pub fn type_member_ordering<'a>(
    left_insertions: &[(PCSNode<'a>, Option<String>)],
    right_insertions: &[(PCSNode<'a>, Option<String>)],
) -> Vec<PCSNode<'a>> {
    let left_signatures: Vec<&str> = left_insertions
        .iter()
        .filter_map(|(_, sig)| sig.as_deref())
        .collect();

    left_insertions
        .iter()
        .map(|(node, _)| *node)
        .chain(
            right_insertions
                .iter()
                .filter(|(_, sig)| sig.as_deref().is_none_or(|s| !left_signatures.contains(&s)))
                .map(|(node, _)| *node),
        )
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_picks_non_empty_side() {
        let left: Vec<PCSNode> = vec![];
        let right = vec![PCSNode::LeftMarker];
        match optimistic_empty_side(&left, &right) {
            Resolution::Resolved(r) => assert_eq!(r, right),
            Resolution::NoHandler => panic!("expected a resolution"),
        }
    }

    #[test]
    fn both_non_empty_has_no_handler() {
        let left = vec![PCSNode::LeftMarker];
        let right = vec![PCSNode::RightMarker];
        assert!(matches!(optimistic_empty_side(&left, &right), Resolution::NoHandler));
    }
}
