#![forbid(unsafe_code)]

//! The per-variant choice of namespace declarations and attributes.
//!
//! A walk asks its [`AttrSelector`] what each element emits.  Selectors
//! update the namespace table and the `xml:*` stack as a side effect, so
//! they must be called exactly once per element, in document order.

use crate::render::{AttrSet, NsDecl};
use crate::symbol_table::NsSymbolTable;
use crate::xml_attrs::{XmlAttrPolicy, XmlAttrStack};
use ramsta_core::{ns, C14nError};
use ramsta_xml::{Document, NodeFilter, NodeId, NodeSet, Visibility};
use tracing::trace;

/// Namespace and `xml:*` state of one walk.
#[derive(Debug)]
pub struct WalkState<'a> {
    pub ns: NsSymbolTable<'a>,
    pub xml_attrs: XmlAttrStack<'a>,
}

impl<'a> WalkState<'a> {
    pub fn new(policy: XmlAttrPolicy) -> Self {
        Self {
            ns: NsSymbolTable::new(),
            xml_attrs: XmlAttrStack::new(policy),
        }
    }

    /// The current depth, as seen by the `xml:*` stack.
    pub fn level(&self) -> isize {
        self.ns.level() as isize
    }
}

/// Which nodes of a document-subset walk are output.
#[derive(Clone, Copy, Default)]
pub struct Selection<'s> {
    pub node_set: Option<&'s NodeSet>,
    pub filter: Option<&'s dyn NodeFilter>,
}

impl Selection<'_> {
    fn membership(&self, node: NodeId) -> Visibility {
        match self.node_set {
            Some(set) if !set.contains(node) => Visibility::ExcludedKeepDescending,
            _ => Visibility::Included,
        }
    }

    pub fn visibility(&self, doc: &Document, node: NodeId) -> Visibility {
        self.filter
            .map_or(Visibility::Included, |f| f.include(doc, node))
            .and_then(|| self.membership(node))
    }

    pub fn visibility_at(&self, doc: &Document, node: NodeId, level: usize) -> Visibility {
        self.filter
            .map_or(Visibility::Included, |f| f.include_at_level(doc, node, level))
            .and_then(|| self.membership(node))
    }

    pub fn is_visible(&self, doc: &Document, node: NodeId) -> bool {
        self.visibility(doc, node).is_included()
    }
}

/// Decides, per element, which namespace declarations and attributes are
/// written, mutating the walk state.
pub trait AttrSelector {
    fn xml_attr_policy(&self) -> XmlAttrPolicy;

    /// Record the bindings of an ancestor of the walk root.  `distance` is
    /// 1 for the parent of the root.
    fn seed_ancestor<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        distance: isize,
        state: &mut WalkState<'a>,
    );

    /// Select for an element of a whole-subtree walk.  `apex` marks the
    /// walk root, which also receives the context inherited from outside.
    fn select_subtree<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        apex: bool,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError>;

    /// Select for an element of a document-subset walk.  Called for
    /// output elements and for omitted ones whose descendants are visited.
    fn select_node_set<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        visible: bool,
        selection: &Selection<'_>,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError>;
}

/// `xmlns:xml="http://www.w3.org/XML/1998/namespace"` is never output.
pub(crate) fn is_xml_binding(prefix: &str, uri: &str) -> bool {
    prefix == ns::XML_PREFIX && uri == ns::XML
}

/// A URI is absolute when empty or when it has a scheme before a `:`.
pub(crate) fn namespace_is_relative(uri: &str) -> bool {
    !uri.is_empty() && !uri.find(':').is_some_and(|i| i > 0)
}

/// The prefix of an element's namespace, "" for the default namespace.
pub(crate) fn element_prefix<'a>(doc: &'a Document, element: NodeId) -> &'a str {
    doc.element(element)
        .filter(|el| el.name.namespace_uri().is_some())
        .and_then(|el| el.name.prefix())
        .unwrap_or("")
}

/// The element's `xmlns="..."` attribute, if it has one.
pub(crate) fn default_namespace_decl(doc: &Document, element: NodeId) -> Option<NodeId> {
    doc.attributes(element)
        .iter()
        .copied()
        .find(|&id| doc.attribute(id).and_then(|a| a.declared_prefix()) == Some(""))
}

/// Add an ancestor's namespace declarations, and the binding its own name
/// relies on, without rendering them.
pub(crate) fn seed_namespaces<'a>(doc: &'a Document, element: NodeId, state: &mut WalkState<'a>) {
    for &id in doc.attributes(element) {
        let Some(attr) = doc.attribute(id) else {
            continue;
        };
        if let Some(prefix) = attr.declared_prefix() {
            if !is_xml_binding(prefix, &attr.value) {
                state.ns.add_mapping(prefix, &attr.value, Some(id));
            }
        }
    }
    if let Some(el) = doc.element(element) {
        if let Some(uri) = el.name.namespace_uri() {
            state
                .ns
                .add_mapping(element_prefix(doc, element), uri, None);
        }
    }
}

/// Fail if `uri`, bound to `prefix` on `element`, is a relative URI.
pub(crate) fn reject_relative(
    doc: &Document,
    element: NodeId,
    prefix: &str,
    uri: &str,
) -> Result<(), C14nError> {
    if !namespace_is_relative(uri) {
        return Ok(());
    }
    let decl = NsDecl {
        prefix,
        uri,
        source: None,
    };
    Err(C14nError::RelativeNamespace {
        element: doc
            .element(element)
            .map_or_else(String::new, |el| el.name.qualified_name().to_owned()),
        prefix: decl.attr_name(),
        uri: uri.to_owned(),
    })
}

/// Add a declaration to the output of `element`.  A relative URI declared
/// on `element` itself is rejected; bindings inherited from elsewhere are
/// written as they are.
pub(crate) fn render_namespace<'a>(
    doc: &Document,
    element: NodeId,
    decl: NsDecl<'a>,
    out: &mut AttrSet<'a>,
) -> Result<(), C14nError> {
    let own = decl
        .source
        .and_then(|id| doc.attribute(id))
        .is_some_and(|attr| attr.owner == element);
    if own {
        reject_relative(doc, element, decl.prefix, decl.uri)?;
    }
    trace!(prefix = decl.prefix, uri = decl.uri, "rendering namespace");
    out.insert_namespace(decl);
    Ok(())
}
