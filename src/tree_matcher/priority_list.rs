use std::{cmp::Ordering, collections::BinaryHeap};

use crate::node::AstNode;

/// A priority queue which indexes trees by their height.
/// This follows the "indexed priority list" of
/// [Fine-grained and accurate source code differencing](https://hal.science/hal-01054552), Falleri et al. 2014.
#[derive(Debug, Default)]
pub struct PriorityList<'tree> {
    heap: BinaryHeap<Entry<'tree>>,
}

#[derive(Debug, PartialEq, Eq)]
struct Entry<'tree> {
    height: i32,
    node: &'tree AstNode<'tree>,
}

impl<'tree> From<&'tree AstNode<'tree>> for Entry<'tree> {
    fn from(node: &'tree AstNode<'tree>) -> Self {
        Self {
            height: node.height(),
            node,
        }
    }
}

impl<'tree> PriorityList<'tree> {
    /// Creates an empty priority list
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new node to the priority list
    pub fn push(&mut self, node: &'tree AstNode<'tree>) {
        self.heap.push(Entry::from(node));
    }

    /// Returns the maximum height of the tree in the list
    pub fn peek_max(&self) -> Option<i32> {
        self.heap.peek().map(|entry| entry.height)
    }

    /// Returns the list of all nodes with maximum height
    pub fn pop<'a>(&'a mut self) -> Vec<&'tree AstNode<'tree>> {
        let desired_height = self.peek_max();
        let mut results = Vec::new();
        while desired_height.is_some() && desired_height == self.peek_max() {
            results.push(self.heap.pop().unwrap().node);
        }
        results
    }

    /// Adds all of the direct children of a node into the queue
    pub fn open(&mut self, node: &'tree AstNode<'tree>) {
        let entries = node.children.iter().copied().map(Entry::from);
        self.heap.extend(entries);
    }
}

impl Ord for Entry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.height, self.node.source).cmp(&(other.height, other.node.source))
    }
}

impl PartialOrd for Entry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use super::*;

    #[test]
    fn empty() {
        let mut priority_list = PriorityList::new();

        assert_eq!(priority_list.peek_max(), None);
        assert_eq!(priority_list.pop().len(), 0);
    }

    #[test]
    fn one_element() {
        let arena = Arena::new();
        let mut priority_list = PriorityList::new();

        let node = AstNode::parse("class A { int x() { return 1 + 2; } }", &arena).unwrap();
        priority_list.push(node);

        assert_eq!(priority_list.peek_max(), Some(node.height()));
        assert_eq!(priority_list.pop(), vec![node]);
    }

    #[test]
    fn two_elements_same_height() {
        let arena = Arena::new();
        let mut priority_list = PriorityList::new();

        let node1 = AstNode::parse("class A { int y() { return 1 + 2; } }", &arena).unwrap();
        let node2 = AstNode::parse("class B { int z() { return 3 * 5; } }", &arena).unwrap();
        assert_eq!(node1.height(), node2.height());
        priority_list.push(node1);
        priority_list.push(node2);

        assert_eq!(priority_list.peek_max(), Some(node1.height()));
        assert_eq!(priority_list.pop().len(), 2);
    }

    #[test]
    fn two_elements_different_height() {
        let arena = Arena::new();
        let mut priority_list = PriorityList::new();

        let shallow = AstNode::parse("class A { int x() { return 1; } }", &arena).unwrap();
        let deep = AstNode::parse("class B { int y() { return 3 * (5 + 1); } }", &arena).unwrap();
        assert!(deep.height() > shallow.height());
        priority_list.push(shallow);
        priority_list.push(deep);

        assert_eq!(priority_list.peek_max(), Some(deep.height()));
        assert_eq!(priority_list.pop(), vec![deep]);
        assert_eq!(priority_list.peek_max(), Some(shallow.height()));
        assert_eq!(priority_list.pop(), vec![shallow]);
    }

    #[test]
    fn open() {
        let arena = Arena::new();
        let mut priority_list = PriorityList::new();

        let root = AstNode::parse("class A { int x() { return 1 + (2 + 5); } }", &arena).unwrap();
        let method = root
            .children_by_field_name("body")
            .first()
            .unwrap()
            .children[0];
        priority_list.open(method);

        assert_eq!(priority_list.peek_max(), Some(method.children[0].height()));
        assert_eq!(priority_list.pop().len(), method.children.len());
    }
}
