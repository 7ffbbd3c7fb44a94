#![forbid(unsafe_code)]

//! NodeSet type for document-subset canonicalization.
//!
//! A `NodeSet` represents an explicit set of nodes from an XML document,
//! identified by their `NodeId`.  Attribute nodes, namespace declarations
//! included, are members in their own right: an element in the set only
//! renders the attributes that are also in the set.

use crate::document::{Document, NodeId, NodeKind};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node set from a set of node IDs.
    pub fn from_ids(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: ids.into_iter().collect(),
        }
    }

    /// Create a node set containing all nodes in the document.
    pub fn all(doc: &Document) -> Self {
        Self::tree(doc, doc.root(), true)
    }

    /// Create a node set containing all nodes except comments.
    /// Per W3C DSig spec, `URI=""` selects the document without comments.
    pub fn all_without_comments(doc: &Document) -> Self {
        Self::tree(doc, doc.root(), false)
    }

    /// Create a node set for the subtree rooted at `root`, attribute nodes
    /// included, optionally without comments.
    pub fn tree(doc: &Document, root: NodeId, with_comments: bool) -> Self {
        let mut nodes = HashSet::new();
        for id in doc.descendants(root) {
            if !with_comments && matches!(doc.kind(id), NodeKind::Comment(_)) {
                continue;
            }
            nodes.insert(id);
            nodes.extend(doc.attributes(id).iter().copied());
        }
        Self { nodes }
    }

    /// Check if a node is in this set.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Add a node to this set.
    pub fn insert(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    /// Remove a node from this set.
    pub fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    /// Remove a node, its attributes and all its descendants.
    pub fn remove_subtree(&mut self, doc: &Document, root: NodeId) {
        for id in doc.descendants(root) {
            self.nodes.remove(&id);
            for attr in doc.attributes(id) {
                self.nodes.remove(attr);
            }
        }
    }

    /// Compute the intersection of two node sets.
    pub fn intersection(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.intersection(&other.nodes).copied().collect(),
        }
    }

    /// Compute the union of two node sets.
    pub fn union(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.union(&other.nodes).copied().collect(),
        }
    }

    /// Compute self - other (subtraction).
    pub fn subtract(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.difference(&other.nodes).copied().collect(),
        }
    }

    /// Iterate over the members in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Check if this set is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl FromIterator<NodeId> for NodeSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(root, "a", None);
        doc.set_attribute(a, "x", None, "1");
        let comment = doc.append_comment(a, "c");
        let b = doc.append_element(a, "b", None);
        (doc, a, comment, b)
    }

    #[test]
    fn test_tree_includes_attributes() {
        let (doc, a, comment, b) = doc();
        let set = NodeSet::tree(&doc, a, true);
        assert!(set.contains(a));
        assert!(set.contains(doc.attributes(a)[0]));
        assert!(set.contains(comment));
        assert!(set.contains(b));
        assert!(!set.contains(doc.root()));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_all_without_comments() {
        let (doc, _, comment, _) = doc();
        let set = NodeSet::all_without_comments(&doc);
        assert!(set.contains(doc.root()));
        assert!(!set.contains(comment));
    }

    #[test]
    fn test_set_algebra() {
        let (doc, a, comment, b) = doc();
        let all = NodeSet::all(&doc);
        let sub = NodeSet::from_ids([a, b]);
        assert_eq!(all.intersection(&sub), sub);
        assert!(all.subtract(&sub).contains(comment));
        assert!(!all.subtract(&sub).contains(b));
        assert_eq!(sub.union(&NodeSet::from_ids([comment])).len(), 3);
    }

    #[test]
    fn test_remove_subtree() {
        let (doc, a, _, _) = doc();
        let mut set = NodeSet::all(&doc);
        set.remove_subtree(&doc, a);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![doc.root()]);
    }
}
