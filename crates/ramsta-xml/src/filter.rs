#![forbid(unsafe_code)]

//! Node visibility decisions and composable node filters.

use crate::document::{Document, NodeId};

/// Whether a node takes part in the canonical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The node and everything below it are left out.
    Excluded,
    /// The node itself is left out but its descendants are still visited,
    /// and its namespace and `xml:*` context still reaches them.
    ExcludedKeepDescending,
    /// The node is output.
    Included,
}

impl Visibility {
    pub fn is_included(self) -> bool {
        self == Visibility::Included
    }

    /// Combine with a second decision: an `Included` answer defers to
    /// `next`, anything else stands.
    pub fn and_then(self, next: impl FnOnce() -> Visibility) -> Visibility {
        match self {
            Visibility::Included => next(),
            other => other,
        }
    }
}

impl From<bool> for Visibility {
    fn from(included: bool) -> Self {
        if included {
            Visibility::Included
        } else {
            Visibility::ExcludedKeepDescending
        }
    }
}

/// A predicate deciding the visibility of each node.
///
/// Filters compose with [`NodeFilter::and`]; the combined filter asks each
/// part in order and returns the first answer that is not `Included`.
pub trait NodeFilter {
    fn include(&self, doc: &Document, node: NodeId) -> Visibility;

    /// Decision for an element met at `level` during a walk.  Filters that
    /// can answer faster with the depth at hand override this.
    fn include_at_level(&self, doc: &Document, node: NodeId, level: usize) -> Visibility {
        let _ = level;
        self.include(doc, node)
    }

    fn and<F: NodeFilter>(self, other: F) -> And<Self, F>
    where
        Self: Sized,
    {
        And(self, other)
    }
}

impl<F> NodeFilter for F
where
    F: Fn(&Document, NodeId) -> Visibility,
{
    fn include(&self, doc: &Document, node: NodeId) -> Visibility {
        self(doc, node)
    }
}

/// Two filters evaluated in order.
#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<A: NodeFilter, B: NodeFilter> NodeFilter for And<A, B> {
    fn include(&self, doc: &Document, node: NodeId) -> Visibility {
        self.0
            .include(doc, node)
            .and_then(|| self.1.include(doc, node))
    }

    fn include_at_level(&self, doc: &Document, node: NodeId, level: usize) -> Visibility {
        self.0
            .include_at_level(doc, node, level)
            .and_then(|| self.1.include_at_level(doc, node, level))
    }
}

/// Excludes one subtree, as the enveloped-signature transform does with
/// its `Signature` element.
#[derive(Debug, Clone, Copy)]
pub struct ExcludeSubtree {
    root: NodeId,
}

impl ExcludeSubtree {
    pub fn new(root: NodeId) -> Self {
        Self { root }
    }
}

impl NodeFilter for ExcludeSubtree {
    fn include(&self, doc: &Document, node: NodeId) -> Visibility {
        if doc.is_ancestor_or_self(self.root, node) {
            Visibility::Excluded
        } else {
            Visibility::Included
        }
    }
}
