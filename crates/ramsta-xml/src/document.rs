#![forbid(unsafe_code)]

//! Arena-backed XML document model.
//!
//! Every node, attributes included, lives in one `Vec` and is addressed by a
//! [`NodeId`].  Namespace declarations are ordinary attribute nodes in the
//! `http://www.w3.org/2000/xmlns/` namespace, so node sets can include or
//! exclude them individually.  Attribute nodes have no parent; their owner
//! element is recorded on the attribute itself.

use ramsta_core::ns;

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The position of the node in its document's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A qualified name together with its namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    qualified: String,
    prefix_len: Option<usize>,
    namespace_uri: Option<String>,
}

impl QName {
    /// Build a name from its lexical form (`prefix:local` or `local`).
    ///
    /// An empty namespace URI is the same as no namespace.
    pub fn new(qualified: &str, namespace_uri: Option<&str>) -> Self {
        Self {
            qualified: qualified.to_owned(),
            prefix_len: qualified.find(':'),
            namespace_uri: namespace_uri
                .filter(|uri| !uri.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix_len.map(|len| &self.qualified[..len])
    }

    pub fn local_name(&self) -> &str {
        match self.prefix_len {
            Some(len) => &self.qualified[len + 1..],
            None => &self.qualified,
        }
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }
}

/// An element: its name and its attribute nodes in document order.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<NodeId>,
}

/// An attribute node, including namespace declarations.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
    pub owner: NodeId,
}

impl Attribute {
    /// Whether this attribute is an `xmlns` or `xmlns:prefix` declaration.
    pub fn is_namespace_decl(&self) -> bool {
        self.name.namespace_uri() == Some(ns::XMLNS)
    }

    /// For a namespace declaration, the prefix it binds ("" for the
    /// default namespace).
    pub fn declared_prefix(&self) -> Option<&str> {
        if !self.is_namespace_decl() {
            return None;
        }
        match self.name.prefix() {
            Some(_) => Some(self.name.local_name()),
            None => Some(""),
        }
    }

    /// Whether this attribute lives in the `xml` namespace.
    pub fn is_xml_attr(&self) -> bool {
        self.name.namespace_uri() == Some(ns::XML)
    }
}

/// A processing instruction.
#[derive(Debug, Clone)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: String,
}

/// The kind and payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    DocumentFragment,
    DocumentType(String),
    Element(Element),
    Attribute(Attribute),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
    Entity(String),
    Notation(String),
}

impl NodeKind {
    /// A short, stable name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::DocumentFragment => "document fragment",
            NodeKind::DocumentType(_) => "document type",
            NodeKind::Element(_) => "element",
            NodeKind::Attribute(_) => "attribute",
            NodeKind::Text(_) => "text",
            NodeKind::CData(_) => "CDATA section",
            NodeKind::Comment(_) => "comment",
            NodeKind::ProcessingInstruction(_) => "processing instruction",
            NodeKind::Entity(_) => "entity",
            NodeKind::Notation(_) => "notation",
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// An XML document.  Node 0 is always the document node.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    /// Additional ID attribute names to register (beyond the default `Id`, `ID`, `id`).
    extra_id_attrs: Vec<String>,
}

impl Document {
    /// Create a document containing only the document node.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            extra_id_attrs: Vec::new(),
        };
        doc.push_node(NodeKind::Document);
        doc
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The number of nodes in the arena, attributes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        });
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let last = self.nodes[parent.0].last_child;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev_sibling = last;
        }
        match last {
            Some(last) => self.nodes[last.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push_node(kind);
        self.append_child(parent, id);
        id
    }

    // ── Building ─────────────────────────────────────────────────────

    /// Create a detached document fragment.
    pub fn create_fragment(&mut self) -> NodeId {
        self.push_node(NodeKind::DocumentFragment)
    }

    /// Append an element named `qualified` (`prefix:local` or `local`).
    pub fn append_element(
        &mut self,
        parent: NodeId,
        qualified: &str,
        namespace_uri: Option<&str>,
    ) -> NodeId {
        self.append(
            parent,
            NodeKind::Element(Element {
                name: QName::new(qualified, namespace_uri),
                attributes: Vec::new(),
            }),
        )
    }

    /// Set an attribute on `element`, replacing the value of an existing
    /// attribute with the same qualified name.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        qualified: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> NodeId {
        let existing = self
            .attributes(element)
            .iter()
            .copied()
            .find(|&a| {
                self.attribute(a)
                    .is_some_and(|attr| attr.name.qualified_name() == qualified)
            });
        if let Some(id) = existing {
            if let NodeKind::Attribute(attr) = &mut self.nodes[id.0].kind {
                attr.value = value.to_owned();
            }
            return id;
        }

        let id = self.push_node(NodeKind::Attribute(Attribute {
            name: QName::new(qualified, namespace_uri),
            value: value.to_owned(),
            owner: element,
        }));
        if let NodeKind::Element(el) = &mut self.nodes[element.0].kind {
            el.attributes.push(id);
        }
        id
    }

    /// Declare a namespace on `element`.  `None` declares the default
    /// namespace; an empty `uri` with `None` undeclares it.
    pub fn declare_namespace(
        &mut self,
        element: NodeId,
        prefix: Option<&str>,
        uri: &str,
    ) -> NodeId {
        let qualified = match prefix {
            Some(p) => format!("{}:{p}", ns::XMLNS_PREFIX),
            None => ns::XMLNS_PREFIX.to_owned(),
        };
        self.set_attribute(element, &qualified, Some(ns::XMLNS), uri)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::Text(text.to_owned()))
    }

    pub fn append_cdata(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::CData(text.to_owned()))
    }

    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::Comment(text.to_owned()))
    }

    pub fn append_pi(&mut self, parent: NodeId, target: &str, data: &str) -> NodeId {
        self.append(
            parent,
            NodeKind::ProcessingInstruction(ProcessingInstruction {
                target: target.to_owned(),
                data: data.to_owned(),
            }),
        )
    }

    pub fn append_doctype(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.append(parent, NodeKind::DocumentType(name.to_owned()))
    }

    pub fn append_entity(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.append(parent, NodeKind::Entity(name.to_owned()))
    }

    pub fn append_notation(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.append(parent, NodeKind::Notation(name.to_owned()))
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// The kind of a node.
    ///
    /// Panics if `id` was not produced by this document.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId) -> Option<&Attribute> {
        match self.kind(id) {
            NodeKind::Attribute(attr) => Some(attr),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// The parent of `id` if that parent is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).next_sibling
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).prev_sibling
    }

    /// The attribute nodes of an element (empty for other nodes).
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Element(el) => &el.attributes,
            _ => &[],
        }
    }

    /// Find an attribute of `element` by namespace URI and local name.
    pub fn attribute_ns(
        &self,
        element: NodeId,
        namespace_uri: Option<&str>,
        local_name: &str,
    ) -> Option<NodeId> {
        self.attributes(element).iter().copied().find(|&a| {
            self.attribute(a).is_some_and(|attr| {
                attr.name.namespace_uri() == namespace_uri && attr.name.local_name() == local_name
            })
        })
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Iterate over a node and its descendants in document order.
    /// Attribute nodes are not part of the child axis and are skipped.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: Some(id),
        }
    }

    /// Iterate over the ancestors of a node, nearest first.  For an
    /// attribute node the owner element is the first ancestor.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        let first = match self.kind(id) {
            NodeKind::Attribute(attr) => Some(attr.owner),
            _ => self.parent(id),
        };
        Ancestors {
            doc: self,
            next: first,
        }
    }

    /// Check if `ancestor` is an ancestor-or-self of `node`.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// The document element, if there is one.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root()).find(|&c| self.is_element(c))
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// Register an additional ID attribute name (e.g., `"wsu:Id"`).
    pub fn add_id_attr(&mut self, name: &str) {
        self.extra_id_attrs.push(name.to_owned());
    }

    /// Find an element carrying the given ID value.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let default_attrs = ["Id", "ID", "id"];
        self.descendants(self.root()).find(|&node| {
            self.attributes(node).iter().any(|&a| {
                self.attribute(a).is_some_and(|attr| {
                    let name = attr.name.qualified_name();
                    attr.value == id
                        && (default_attrs.contains(&name)
                            || self.extra_id_attrs.iter().any(|extra| extra == name))
                })
            })
        })
    }

    /// Find the first descendant element with the given local name and namespace.
    pub fn find_element(&self, namespace_uri: Option<&str>, local_name: &str) -> Option<NodeId> {
        self.descendants(self.root()).find(|&n| {
            self.element(n).is_some_and(|el| {
                el.name.local_name() == local_name && el.name.namespace_uri() == namespace_uri
            })
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = match self.doc.first_child(current) {
            Some(child) => Some(child),
            None => {
                let mut node = current;
                loop {
                    if node == self.root {
                        break None;
                    }
                    if let Some(sibling) = self.doc.next_sibling(node) {
                        break Some(sibling);
                    }
                    match self.doc.parent(node) {
                        Some(parent) => node = parent,
                        None => break None,
                    }
                }
            }
        };
        Some(current)
    }
}

/// Iterator over the ancestors of a node.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}
