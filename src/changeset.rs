//! The change set T* (C4, §3.4, §4.4): the union of PCS triples contributed
//! by all three revisions, indexed by predecessor/successor/parent for
//! O(1) conflict lookup, plus the per-node contents extracted by the
//! content resolver and an explicit, symmetric structural-conflict record.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    class_mapping::{ClassMapping, Leader, RevNode},
    content,
    multimap::MultiMap,
    node::AstNode,
    pcs::{PCS, PCSNode, Revision},
    role::RoledValues,
};

/// What kind of disagreement a structural conflict records (§4.5 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The same predecessor/successor pair was claimed under two different
    /// parents: a move or duplicate-insertion conflict. This is the only
    /// kind root-conflict recovery (§4.10 step 6) is scoped to.
    Root,
    /// An ordinary fork in a single child list under one shared parent
    /// (same predecessor, different successor, or vice versa), left for
    /// `tree_builder`'s structural-conflict handlers or its text-conflict
    /// fallback to resolve.
    Fork,
}

#[derive(Debug, Default)]
pub struct ChangeSet<'a> {
    successors: MultiMap<PCSNode<'a>, PCS<'a>>,
    predecessors: MultiMap<PCSNode<'a>, PCS<'a>>,
    parents: MultiMap<PCSNode<'a>, PCS<'a>>,
    /// The content extracted from each leader, per revision it appears in
    /// (§3.3, §4.4). A leader absent from this map has no content (purely
    /// structural node).
    contents: FxHashMap<Leader<'a>, FxHashMap<Revision, RoledValues>>,
    /// Unordered pairs of PCS components known to be in irreconcilable
    /// structural conflict (§3.4, §4.5), tagged with what kind of
    /// disagreement they record. Recorded explicitly so later lookups
    /// don't need to re-derive predecessor/successor disagreement from
    /// scratch.
    structural_conflicts: FxHashMap<(PCSNode<'a>, PCSNode<'a>), ConflictKind>,
    /// Every `PCSNode` that appears in at least one registered structural
    /// conflict, for the resolver's O(1) "already conflicted" check (§4.5
    /// step 1).
    conflicted_nodes: FxHashSet<PCSNode<'a>>,
}

impl<'a> ChangeSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the PCS triples and contents that encode one revision's tree.
    pub fn add_tree(
        &mut self,
        root: &'a AstNode<'a>,
        revision: Revision,
        classmapping: &ClassMapping<'a>,
    ) {
        let node = self.add_node_recursively(
            root,
            PCSNode::VirtualRoot,
            PCSNode::LeftMarker,
            revision,
            classmapping,
        );
        self.add(PCS {
            parent: PCSNode::VirtualRoot,
            predecessor: node,
            successor: PCSNode::RightMarker,
            revision,
        });
    }

    fn add_node_recursively(
        &mut self,
        node: &'a AstNode<'a>,
        parent: PCSNode<'a>,
        predecessor: PCSNode<'a>,
        revision: Revision,
        classmapping: &ClassMapping<'a>,
    ) -> PCSNode<'a> {
        let rev_node = RevNode::new(revision, node);
        let leader = classmapping.map_to_leader(rev_node);
        let mut revision_set = classmapping.revision_set(&leader);
        revision_set.add(revision);

        let wrapped = PCSNode::Node {
            node: leader,
            revisions: revision_set,
        };

        self.add(PCS {
            parent,
            predecessor,
            successor: wrapped,
            revision,
        });

        self.record_content(leader, revision, content::extract(node));

        // An isomorphic-in-all-revisions cluster contributes no further
        // PCS triples: its subtree is identical everywhere, so descending
        // into it can only produce noise (§4.4).
        if classmapping.is_isomorphic_in_all_revisions(&leader) {
            return wrapped;
        }

        let mut current_predecessor = PCSNode::LeftMarker;
        if node.has_role_groups() {
            for (role, members) in node.role_groups() {
                let group = PCSNode::RoleGroup {
                    owner: leader,
                    role,
                    revisions: revision_set,
                };
                self.add(PCS {
                    parent: wrapped,
                    predecessor: current_predecessor,
                    successor: group,
                    revision,
                });
                let mut member_predecessor = PCSNode::LeftMarker;
                for member in members {
                    member_predecessor = self.add_node_recursively(
                        member,
                        group,
                        member_predecessor,
                        revision,
                        classmapping,
                    );
                }
                self.add(PCS {
                    parent: group,
                    predecessor: member_predecessor,
                    successor: PCSNode::RightMarker,
                    revision,
                });
                current_predecessor = group;
            }
        } else {
            for child in &node.children {
                current_predecessor = self.add_node_recursively(
                    child,
                    wrapped,
                    current_predecessor,
                    revision,
                    classmapping,
                );
            }
        }
        self.add(PCS {
            parent: wrapped,
            predecessor: current_predecessor,
            successor: PCSNode::RightMarker,
            revision,
        });

        wrapped
    }

    fn record_content(&mut self, leader: Leader<'a>, revision: Revision, content: RoledValues) {
        if content.is_empty() {
            return;
        }
        self.contents.entry(leader).or_default().insert(revision, content);
    }

    /// The content recorded for a leader, by revision.
    pub fn contents(&self, leader: &Leader<'a>) -> Option<&FxHashMap<Revision, RoledValues>> {
        self.contents.get(leader)
    }

    /// Overwrites the content recorded for a leader at a single revision;
    /// used by the resolver (§4.5) to install a reconciled value.
    pub fn set_content(&mut self, leader: Leader<'a>, revision: Revision, content: RoledValues) {
        self.contents.entry(leader).or_default().insert(revision, content);
    }

    /// All leaders with recorded content, paired with their per-revision
    /// `RoledValues`. Used by the resolver to drive per-node content
    /// reconciliation (§4.5.1) independently of PCS iteration order.
    pub fn all_contents(&self) -> impl Iterator<Item = (&Leader<'a>, &FxHashMap<Revision, RoledValues>)> {
        self.contents.iter()
    }

    /// Adds a new PCS to the set.
    pub fn add(&mut self, pcs: PCS<'a>) {
        self.successors.insert(pcs.successor, pcs);
        self.predecessors.insert(pcs.predecessor, pcs);
        self.parents.insert(pcs.parent, pcs);
    }

    /// Removes a PCS from all three indices (used during root-conflict
    /// recovery, §4.10 step 6).
    pub fn remove(&mut self, pcs: &PCS<'a>) {
        self.successors.remove(&pcs.successor, pcs);
        self.predecessors.remove(&pcs.predecessor, pcs);
        self.parents.remove(&pcs.parent, pcs);
    }

    /// Records that `a` and `b` are in irreconcilable structural conflict
    /// of the given kind. Symmetric: querying with either order returns the
    /// same result.
    pub fn register_structural_conflict(&mut self, a: PCSNode<'a>, b: PCSNode<'a>, kind: ConflictKind) {
        self.structural_conflicts.insert(Self::order_pair(a, b), kind);
        self.conflicted_nodes.insert(a);
        self.conflicted_nodes.insert(b);
    }

    pub fn in_structural_conflict(&self, a: PCSNode<'a>, b: PCSNode<'a>) -> bool {
        self.structural_conflicts.contains_key(&Self::order_pair(a, b))
    }

    /// Whether `node` appears in at least one registered structural
    /// conflict, regardless of which node it was paired with.
    pub fn is_conflicted(&self, node: PCSNode<'a>) -> bool {
        self.conflicted_nodes.contains(&node)
    }

    /// Every pair of `PCSNode`s recorded as being in irreconcilable
    /// structural conflict, together with the kind of disagreement it is.
    /// Used by the driver's root-conflict recovery (§4.10 step 6) to find
    /// nodes worth purging and retrying, scoped to `ConflictKind::Root`.
    pub fn structural_conflicts(&self) -> impl Iterator<Item = (&(PCSNode<'a>, PCSNode<'a>), &ConflictKind)> {
        self.structural_conflicts.iter()
    }

    fn order_pair(a: PCSNode<'a>, b: PCSNode<'a>) -> (PCSNode<'a>, PCSNode<'a>) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// All PCS triples sharing this parent, in no particular order. Used by
    /// the tree builder to reconstruct a parent's child list (§4.8).
    pub fn children_pcs(&self, parent: PCSNode<'a>) -> impl Iterator<Item = &PCS<'a>> {
        self.parents.get(&parent).iter()
    }

    /// Finds all the PCS which contain either the successor or predecessor of this PCS as successor or predecessor,
    /// and whose parent is different.
    pub fn other_roots(&self, pcs: &PCS<'a>) -> impl Iterator<Item = &PCS<'a>> {
        let mut results = Vec::new();
        if let PCSNode::Node { .. } | PCSNode::RoleGroup { .. } = pcs.predecessor {
            results.extend(
                (self.predecessors.get(&pcs.predecessor).iter())
                    .chain(self.successors.get(&pcs.predecessor).iter())
                    .filter(|other| other.parent != pcs.parent),
            );
        }
        if let PCSNode::Node { .. } | PCSNode::RoleGroup { .. } = pcs.successor {
            results.extend(
                (self.predecessors.get(&pcs.successor).iter())
                    .chain(self.successors.get(&pcs.successor).iter())
                    .filter(|other| other.parent != pcs.parent),
            );
        }
        results.into_iter()
    }

    /// Finds all the PCS that are successor-conflicting with this PCS: same
    /// predecessor, different successor.
    pub fn other_successors<'s, 'b>(
        &'s self,
        pcs: &'b PCS<'a>,
    ) -> impl Iterator<Item = &'s PCS<'a>> {
        self.parents.get(&pcs.parent).iter().filter(move |other| {
            other.successor != pcs.successor && other.predecessor == pcs.predecessor
        })
    }

    /// Finds all the PCS that are predecessor-conflicting with this PCS: same
    /// successor, different predecessor.
    pub fn other_predecessors<'s, 'b>(
        &'s self,
        pcs: &'b PCS<'a>,
    ) -> impl Iterator<Item = &'s PCS<'a>> {
        self.parents.get(&pcs.parent).iter().filter(move |other| {
            other.predecessor != pcs.predecessor && other.successor == pcs.successor
        })
    }

    /// Finds all the inconsistent triples
    pub fn inconsistent_triples<'s, 'b>(
        &'s self,
        pcs: &'b PCS<'a>,
    ) -> impl Iterator<Item = &'s PCS<'a>> {
        self.parents
            .get(&pcs.parent)
            .iter()
            .filter(move |other| {
                (other.predecessor == pcs.predecessor) != (other.successor == pcs.successor)
            })
            .chain(self.other_roots(pcs))
    }

    /// Iterate over the PCS triples contained in this `ChangeSet`
    pub fn iter(&self) -> impl Iterator<Item = &PCS<'a>> {
        self.predecessors.values()
    }

    /// Number of PCS triples
    pub fn len(&self) -> usize {
        self.predecessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predecessors.len() == 0
    }

    /// Save to file, for debugging purposes
    pub fn save(&self, fname: impl AsRef<Path>) {
        let f = File::create(fname).expect("Unable to open changeset file");
        let mut f = BufWriter::new(f);

        for pcs in self.iter().sorted() {
            writeln!(f, "{pcs}").expect("Unable to write changeset file");
        }
    }
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use super::*;

    #[test]
    fn from_tree() {
        let arena = Arena::new();
        let tree = AstNode::parse("class A { int x; }", &arena).unwrap();

        let classmapping = ClassMapping::new();
        let mut changeset = ChangeSet::new();
        changeset.add_tree(tree, Revision::Base, &classmapping);

        assert!(changeset.len() > 0);
        let as_strings = changeset
            .iter()
            .map(|pcs| format!("({}, {}, {})", pcs.parent, pcs.predecessor, pcs.successor))
            .collect_vec();
        assert!(as_strings.iter().any(|s| s.starts_with("(⊥, ⊣, program")));
    }

    #[test]
    fn single_tree_has_no_conflicts() {
        let arena = Arena::new();
        let tree = AstNode::parse("class A { int x; int y; }", &arena).unwrap();

        let classmapping = ClassMapping::new();
        let mut changeset = ChangeSet::new();
        changeset.add_tree(tree, Revision::Base, &classmapping);

        for pcs in changeset.iter() {
            assert_eq!(changeset.other_successors(pcs).count(), 0);
            assert_eq!(changeset.other_predecessors(pcs).count(), 0);
        }
    }

    #[test]
    fn write_to_file() {
        let arena = Arena::new();
        let tree = AstNode::parse("class A { int x; }", &arena).unwrap();

        let classmapping = ClassMapping::new();
        let mut changeset = ChangeSet::new();
        changeset.add_tree(tree, Revision::Base, &classmapping);

        let tmp_dir = tempfile::tempdir().expect("failed to create a temp dir");
        let path = tmp_dir.path().to_owned().join("changeset.txt");
        changeset.save(&path);

        let contents = std::fs::read_to_string(&path).expect("failed to read changeset.txt");
        assert_eq!(contents.lines().count(), changeset.len());
    }

    #[test]
    fn structural_conflicts_are_symmetric() {
        let mut changeset = ChangeSet::new();
        let a = PCSNode::LeftMarker;
        let b = PCSNode::RightMarker;
        changeset.register_structural_conflict(a, b, ConflictKind::Fork);
        assert!(changeset.in_structural_conflict(a, b));
        assert!(changeset.in_structural_conflict(b, a));
    }
}
