//! The Node model (C1, §3.1, §4.1): an identity-based wrapper around the
//! `tree-sitter-java` parse tree, augmented with role-group child lists.

use std::cell::Cell;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use rustc_hash::FxHashMap;
use typed_arena::Arena;

use crate::java_profile::role_groups_for;
use crate::role::Role;

/// A concrete AST element, arena-allocated and identified by a monotonic id.
///
/// Two `AstNode`s are equal iff their `id`s are equal: identity, never deep
/// structural comparison (§9, "Identity over structural equality"). `hash` is
/// precomputed over the grammar name and children, independent of `id`, and
/// used to detect isomorphic subtrees during matching.
pub struct AstNode<'a> {
    pub id: usize,
    pub kind: &'static str,
    pub field_name: Option<&'static str>,
    pub source: &'a str,
    pub byte_range: Range<usize>,
    pub children: Vec<&'a AstNode<'a>>,
    pub hash: u64,
    parent: Cell<Option<&'a AstNode<'a>>>,
    descendant_count: usize,
    height: i32,
}

impl<'a> PartialEq for AstNode<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<'a> Eq for AstNode<'a> {}

impl<'a> Hash for AstNode<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<'a> Display for AstNode<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}…{}",
            self.kind, self.byte_range.start, self.byte_range.end
        )
    }
}

impl<'a> AstNode<'a> {
    /// Parses `source` as Java and wraps the resulting tree, allocating every
    /// node out of `arena`. Node ids are assigned in pre-order.
    pub fn parse(
        source: &'a str,
        arena: &'a Arena<AstNode<'a>>,
    ) -> Result<&'a AstNode<'a>, crate::error::MergeError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| crate::error::MergeError::InvariantViolation(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| crate::error::MergeError::InvariantViolation("parse failed".into()))?;
        let mut next_id = 0usize;
        let root = Self::build(tree.root_node(), None, source, arena, &mut next_id);
        Ok(root)
    }

    fn build(
        ts_node: tree_sitter::Node,
        field_name: Option<&'static str>,
        source: &'a str,
        arena: &'a Arena<AstNode<'a>>,
        next_id: &mut usize,
    ) -> &'a AstNode<'a> {
        let mut cursor = ts_node.walk();
        let mut children = Vec::new();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                let fname = cursor.field_name();
                // Keep named nodes always; keep anonymous tokens only when
                // the grammar gives them a field name (e.g. the operator
                // token of a binary_expression) since that field carries
                // content the resolver needs (§4.6).
                if child.is_named() || fname.is_some() {
                    children.push(Self::build(child, fname, source, arena, next_id));
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        let descendant_count = children.iter().map(|c| c.descendant_count + 1).sum();
        let height = children.iter().map(|c| c.height + 1).max().unwrap_or(0);
        let kind: &'static str = Box::leak(ts_node.kind().to_string().into_boxed_str());
        let byte_range = ts_node.byte_range();
        let node_source = &source[byte_range.clone()];
        let hash = Self::compute_hash(kind, &children, node_source, children.is_empty());
        let id = *next_id;
        *next_id += 1;
        let node = arena.alloc(AstNode {
            id,
            kind,
            field_name,
            source: node_source,
            byte_range,
            children,
            hash,
            parent: Cell::new(None),
            descendant_count,
            height,
        });
        for child in &node.children {
            child.parent.set(Some(node));
        }
        node
    }

    fn compute_hash(kind: &str, children: &[&AstNode], source: &str, is_leaf: bool) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        kind.hash(&mut hasher);
        if is_leaf {
            source.hash(&mut hasher);
        } else {
            for child in children {
                child.hash.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.get().is_none()
    }

    pub fn parent(&self) -> Option<&'a AstNode<'a>> {
        self.parent.get()
    }

    /// Walks up to the root of the tree this node belongs to.
    pub fn root(&'a self) -> &'a AstNode<'a> {
        self.ancestors().last().unwrap_or(self)
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of nodes in the subtree rooted here, including itself.
    pub fn size(&self) -> i32 {
        (self.descendant_count + 1) as i32
    }

    /// The weight this node alone contributes to a dice-coefficient
    /// computation (every node counts for one).
    pub fn own_weight(&self) -> usize {
        1
    }

    pub fn isomorphic_to(&self, other: &Self) -> bool {
        self.hash == other.hash
    }

    /// Pre-order depth-first traversal, including `self`.
    pub fn dfs(&'a self) -> impl Iterator<Item = &'a AstNode<'a>> {
        DfsIter {
            stack: vec![self],
        }
    }

    /// Post-order depth-first traversal, including `self` last.
    pub fn postfix(&'a self) -> impl Iterator<Item = &'a AstNode<'a>> {
        let mut order = Vec::with_capacity(self.descendant_count + 1);
        Self::postfix_into(self, &mut order);
        order.into_iter()
    }

    fn postfix_into(node: &'a AstNode<'a>, out: &mut Vec<&'a AstNode<'a>>) {
        for child in &node.children {
            Self::postfix_into(child, out);
        }
        out.push(node);
    }

    /// Ancestors starting with `self`, up to (and including) the root.
    pub fn ancestors(&'a self) -> impl Iterator<Item = &'a AstNode<'a>> {
        AncestorIter { current: Some(self) }
    }

    pub fn child(&self, index: usize) -> Option<&'a AstNode<'a>> {
        self.children.get(index).copied()
    }

    pub fn children_by_field_name(&self, field_name: &str) -> Vec<&'a AstNode<'a>> {
        self.children
            .iter()
            .filter(|c| c.field_name == Some(field_name))
            .copied()
            .collect()
    }

    /// Groups this node's children into role-groups, per §3.1 and the
    /// per-element-kind configuration in `java_profile`. Elements with no
    /// configured role groups return a single implicit group holding all
    /// children in source order.
    pub fn role_groups(&self) -> Vec<(Role, Vec<&'a AstNode<'a>>)> {
        match role_groups_for(self.kind) {
            Some(groups) => groups
                .iter()
                .map(|(role, wrapper_field)| {
                    let members = self
                        .children_by_field_name(wrapper_field)
                        .first()
                        .map(|wrapper| wrapper.children.clone())
                        .unwrap_or_default();
                    (*role, members)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether this element kind has configured role groups at all.
    pub fn has_role_groups(&self) -> bool {
        role_groups_for(self.kind).is_some()
    }

    /// Truncates the tree, keeping only the ancestry of nodes matching
    /// `keep`; nodes failing the predicate that have no kept descendant are
    /// dropped from the copy entirely. Used by the differencer's bottom-up
    /// pass to shrink already-matched subtrees before recovery matching.
    pub fn truncate(
        &'a self,
        keep: impl Fn(&'a AstNode<'a>) -> bool + Copy,
        arena: &'a Arena<AstNode<'a>>,
    ) -> &'a AstNode<'a> {
        self.truncate_rec(keep, arena)
    }

    fn truncate_rec(
        &'a self,
        keep: impl Fn(&'a AstNode<'a>) -> bool + Copy,
        arena: &'a Arena<AstNode<'a>>,
    ) -> &'a AstNode<'a> {
        let children: Vec<&AstNode> = self
            .children
            .iter()
            .filter(|c| keep(c) || Self::has_kept_descendant(c, keep))
            .map(|c| c.truncate_rec(keep, arena))
            .collect();
        let node = arena.alloc(AstNode {
            id: self.id,
            kind: self.kind,
            field_name: self.field_name,
            source: self.source,
            byte_range: self.byte_range.clone(),
            children,
            hash: self.hash,
            parent: Cell::new(None),
            descendant_count: self.descendant_count,
            height: self.height,
        });
        for child in &node.children {
            child.parent.set(Some(node));
        }
        node
    }

    fn has_kept_descendant(node: &AstNode, keep: impl Fn(&AstNode) -> bool + Copy) -> bool {
        node.children
            .iter()
            .any(|c| keep(c) || Self::has_kept_descendant(c, keep))
    }
}

struct DfsIter<'a> {
    stack: Vec<&'a AstNode<'a>>,
}

impl<'a> Iterator for DfsIter<'a> {
    type Item = &'a AstNode<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

struct AncestorIter<'a> {
    current: Option<&'a AstNode<'a>>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a AstNode<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.parent();
        Some(node)
    }
}

/// A cache mapping a raw `tree-sitter` field name to the Java-specific
/// role it is exposed as, when it differs from a 1:1 passthrough. Most
/// fields pass through unchanged; this only matters for the role-group
/// synthesis in `java_profile`.
pub type FieldNameMap = FxHashMap<&'static str, Role>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_class() {
        let arena = Arena::new();
        let root = AstNode::parse("class A { void f() {} }", &arena).unwrap();
        assert_eq!(root.kind, "program");
        assert!(root.size() > 1);
    }

    #[test]
    fn identical_sources_hash_equal() {
        let arena = Arena::new();
        let a = AstNode::parse("class A { int x; }", &arena).unwrap();
        let b = AstNode::parse("class A { int x; }", &arena).unwrap();
        assert!(a.isomorphic_to(b));
    }

    #[test]
    fn dfs_visits_all_descendants() {
        let arena = Arena::new();
        let root = AstNode::parse("class A { int x; int y; }", &arena).unwrap();
        assert_eq!(root.dfs().count(), root.size() as usize);
    }
}
