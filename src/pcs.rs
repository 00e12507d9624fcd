use std::{cmp::Ordering, fmt::Display, hash::Hash};

use crate::class_mapping::{Leader, RevisionNESet};
use crate::role::Role;

/// One of the three sides to be merged.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Copy, Clone, Ord)]
pub enum Revision {
    Base,
    Left,
    Right,
}

/// A component of a [`PCS`] triple (§3.1, §3.2).
///
/// List-edge and role-group nodes carry no content but still participate in
/// PCS edges so that the 3DM algorithm never needs to special-case "first" or
/// "last" child, or a heterogeneous child list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PCSNode<'a> {
    /// The unique process-global root, parent of every compilation unit.
    VirtualRoot,
    /// A virtual node parented by a concrete node, segregating one role's
    /// children from the rest of that node's child list.
    RoleGroup {
        owner: Leader<'a>,
        role: Role,
        revisions: RevisionNESet,
    },
    /// Start-of-list sentinel, denoted `⊣`.
    LeftMarker,
    /// A concrete node from one of the three syntax trees.
    Node {
        revisions: RevisionNESet,
        node: Leader<'a>,
    },
    /// End-of-list sentinel, denoted `⊢`.
    RightMarker,
}

/// A PCS triple: `root` is the owner of a child list; `predecessor` and
/// `successor` are adjacent siblings in that list (§3.2).
///
/// Equality and hashing ignore `revision`: identical triples produced from
/// different revisions compare equal, which is what lets the change set
/// (§3.4) detect agreement between revisions by plain set membership.
#[derive(Debug, Copy, Clone, PartialOrd, Ord)]
#[allow(clippy::upper_case_acronyms)]
pub struct PCS<'a> {
    pub parent: PCSNode<'a>,
    pub predecessor: PCSNode<'a>,
    pub successor: PCSNode<'a>,
    pub revision: Revision,
}

impl<'a> PartialEq for PCS<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent
            && self.predecessor == other.predecessor
            && self.successor == other.successor
    }
}

impl<'a> Eq for PCS<'a> {}

impl<'a> Hash for PCS<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.parent.hash(state);
        self.predecessor.hash(state);
        self.successor.hash(state);
    }
}

impl<'a> Display for PCSNode<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PCSNode::VirtualRoot => write!(f, "⊥"),
            PCSNode::RoleGroup { owner, role, .. } => write!(f, "{owner}#{role}"),
            PCSNode::LeftMarker => write!(f, "⊣"),
            PCSNode::Node { node, .. } => write!(f, "{node}"),
            PCSNode::RightMarker => write!(f, "⊢"),
        }
    }
}

// only useful to list a change set in a meaningful order for debugging purposes
impl<'a> Ord for PCSNode<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        #[allow(clippy::match_same_arms)]
        match (self, other) {
            (PCSNode::VirtualRoot, PCSNode::VirtualRoot) => Ordering::Equal,
            (PCSNode::VirtualRoot, _) => Ordering::Less,
            (_, PCSNode::VirtualRoot) => Ordering::Greater,
            (PCSNode::LeftMarker, PCSNode::LeftMarker) => Ordering::Equal,
            (PCSNode::LeftMarker, _) => Ordering::Less,
            (_, PCSNode::LeftMarker) => Ordering::Greater,
            (PCSNode::RightMarker, PCSNode::RightMarker) => Ordering::Equal,
            (PCSNode::RightMarker, _) => Ordering::Greater,
            (_, PCSNode::RightMarker) => Ordering::Less,
            (PCSNode::Node { node: a, .. }, PCSNode::Node { node: b, .. }) => {
                Self::node_sort_key(a).cmp(&Self::node_sort_key(b))
            }
            (PCSNode::Node { .. }, PCSNode::RoleGroup { .. }) => Ordering::Less,
            (PCSNode::RoleGroup { .. }, PCSNode::Node { .. }) => Ordering::Greater,
            (
                PCSNode::RoleGroup {
                    owner: a, role: ra, ..
                },
                PCSNode::RoleGroup {
                    owner: b, role: rb, ..
                },
            ) => (Self::node_sort_key(a), *ra).cmp(&(Self::node_sort_key(b), *rb)),
        }
    }
}

impl<'a> PCSNode<'a> {
    fn node_sort_key(leader: &Leader<'a>) -> (usize, i64, i32) {
        let n = leader.as_representative().node;
        (
            n.byte_range.start,
            n.byte_range.start as i64 - n.byte_range.end as i64,
            -n.height(),
        )
    }
}

impl<'a> PartialOrd for PCSNode<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Revision::Base => "Base",
            Revision::Left => "Left",
            Revision::Right => "Right",
        })
    }
}

impl<'a> Display for PCS<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.parent, self.predecessor, self.successor, self.revision
        )
    }
}
