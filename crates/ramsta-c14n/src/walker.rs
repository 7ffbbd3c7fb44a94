#![forbid(unsafe_code)]

//! Iterative tree walk that writes canonical bytes.
//!
//! The walk follows first-child / next-sibling links and keeps only the
//! stack of open nodes, so memory grows with depth, not with size.

use crate::escape;
use crate::render::AttrSet;
use crate::selector::{AttrSelector, Selection, WalkState};
use crate::utf8::Utf8Writer;
use ramsta_core::C14nError;
use ramsta_xml::{Document, NodeId, NodeKind, Visibility};
use std::io::{self, Write};

/// Where a top-level comment or PI sits relative to the document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPosition {
    BeforeDocumentElement,
    InsideDocumentElement,
    AfterDocumentElement,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    node: NodeId,
    visible: bool,
}

pub struct Walker<'a, 'c, S, W: Write> {
    doc: &'a Document,
    selector: &'c S,
    with_comments: bool,
    state: WalkState<'a>,
    out: Utf8Writer<W>,
    attrs: AttrSet<'a>,
    position: DocumentPosition,
    open: Vec<OpenNode>,
}

fn illegal(doc: &Document, node: NodeId) -> C14nError {
    C14nError::IllegalNodeType(doc.kind(node).type_name())
}

impl<'a, 'c, S: AttrSelector, W: Write> Walker<'a, 'c, S, W> {
    pub fn new(
        doc: &'a Document,
        selector: &'c S,
        with_comments: bool,
        legacy_surrogates: bool,
        sink: W,
    ) -> Self {
        Self {
            doc,
            selector,
            with_comments,
            state: WalkState::new(selector.xml_attr_policy()),
            out: Utf8Writer::new(sink, legacy_surrogates),
            attrs: AttrSet::new(),
            position: DocumentPosition::BeforeDocumentElement,
            open: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Canonicalize the whole subtree at `root`, skipping `excluded` and
    /// everything below it.
    pub fn walk_subtree(&mut self, root: NodeId, excluded: Option<NodeId>) -> Result<(), C14nError> {
        let doc = self.doc;
        if doc.is_element(root) {
            self.seed_ancestors(root);
        }

        let mut next = Some(root);
        while let Some(node) = next {
            let mut entered = None;
            match doc.kind(node) {
                NodeKind::Entity(_) | NodeKind::Notation(_) | NodeKind::Attribute(_) => {
                    return Err(illegal(doc, node));
                }
                NodeKind::Document | NodeKind::DocumentFragment => {
                    self.state.ns.push();
                    entered = Some(true);
                }
                NodeKind::Comment(data) => {
                    if self.with_comments {
                        self.write_comment(data)?;
                    }
                }
                NodeKind::ProcessingInstruction(pi) => self.write_pi(&pi.target, &pi.data)?,
                NodeKind::Text(text) | NodeKind::CData(text) => {
                    escape::write_text(&mut self.out, text)?;
                }
                NodeKind::Element(el) => {
                    self.position = DocumentPosition::InsideDocumentElement;
                    if Some(node) == excluded {
                        self.passed_over(node);
                    } else {
                        self.state.ns.push();
                        self.attrs.clear();
                        self.selector.select_subtree(
                            doc,
                            node,
                            node == root,
                            &mut self.state,
                            &mut self.attrs,
                        )?;
                        self.write_start_tag(el.name.qualified_name())?;
                        entered = Some(true);
                    }
                }
                NodeKind::DocumentType(_) => {}
            }
            next = self.next_node(node, entered, root)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Canonicalize the nodes under `root` that `selection` lets through.
    pub fn walk_node_set(&mut self, root: NodeId, selection: &Selection<'_>) -> Result<(), C14nError> {
        let doc = self.doc;
        if selection.visibility(doc, root) == Visibility::Excluded {
            return Ok(());
        }
        if doc.is_element(root) {
            self.seed_ancestors(root);
        }

        let mut next = Some(root);
        while let Some(mut node) = next {
            let mut entered = None;
            match doc.kind(node) {
                NodeKind::Entity(_) | NodeKind::Notation(_) | NodeKind::Attribute(_) => {
                    return Err(illegal(doc, node));
                }
                NodeKind::Document | NodeKind::DocumentFragment => {
                    self.state.ns.push();
                    entered = Some(true);
                }
                NodeKind::Comment(data) => {
                    let level = self.state.ns.level();
                    if self.with_comments && selection.visibility_at(doc, node, level).is_included()
                    {
                        self.write_comment(data)?;
                    }
                }
                NodeKind::ProcessingInstruction(pi) => {
                    if selection.is_visible(doc, node) {
                        self.write_pi(&pi.target, &pi.data)?;
                    }
                }
                NodeKind::Text(text) | NodeKind::CData(text) => {
                    if selection.is_visible(doc, node) {
                        escape::write_text(&mut self.out, text)?;
                        // Adjacent text siblings form one XPath text node.
                        while node != root {
                            let Some(sibling) = doc.next_sibling(node) else {
                                break;
                            };
                            match doc.kind(sibling) {
                                NodeKind::Text(more) | NodeKind::CData(more) => {
                                    escape::write_text(&mut self.out, more)?;
                                    node = sibling;
                                }
                                _ => break,
                            }
                        }
                    }
                }
                NodeKind::Element(el) => {
                    self.position = DocumentPosition::InsideDocumentElement;
                    let visibility = selection.visibility_at(doc, node, self.state.ns.level());
                    if visibility == Visibility::Excluded {
                        self.passed_over(node);
                    } else {
                        let visible = visibility.is_included();
                        self.state.ns.push();
                        self.attrs.clear();
                        self.selector.select_node_set(
                            doc,
                            node,
                            visible,
                            selection,
                            &mut self.state,
                            &mut self.attrs,
                        )?;
                        if visible {
                            self.write_start_tag(el.name.qualified_name())?;
                        }
                        entered = Some(visible);
                    }
                }
                NodeKind::DocumentType(_) => {}
            }
            next = self.next_node(node, entered, root)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Record the namespace and `xml:*` context of the ancestors of `root`,
    /// outermost first.
    fn seed_ancestors(&mut self, root: NodeId) {
        let doc = self.doc;
        let ancestors: Vec<NodeId> = doc
            .ancestors(root)
            .take_while(|&a| doc.is_element(a))
            .collect();
        for (i, &ancestor) in ancestors.iter().enumerate().rev() {
            self.selector
                .seed_ancestor(doc, ancestor, i as isize + 1, &mut self.state);
        }

        if self
            .state
            .ns
            .get_mapping_without_render("")
            .is_some_and(|decl| decl.uri.is_empty())
        {
            self.state.ns.add_mapping_and_render("", "", None);
        }
    }

    /// Step to the next node in document order without leaving `root`.
    /// `entered` is set when `node` was opened, with its visibility.
    fn next_node(
        &mut self,
        node: NodeId,
        entered: Option<bool>,
        root: NodeId,
    ) -> Result<Option<NodeId>, C14nError> {
        let doc = self.doc;
        if let Some(visible) = entered {
            let open = OpenNode { node, visible };
            if let Some(child) = doc.first_child(node) {
                self.open.push(open);
                return Ok(Some(child));
            }
            self.leave(open)?;
        }

        let mut node = node;
        loop {
            if node == root {
                return Ok(None);
            }
            if let Some(sibling) = doc.next_sibling(node) {
                return Ok(Some(sibling));
            }
            match self.open.pop() {
                Some(parent) => {
                    self.leave(parent)?;
                    node = parent.node;
                }
                None => return Ok(None),
            }
        }
    }

    fn leave(&mut self, open: OpenNode) -> io::Result<()> {
        if let Some(el) = self.doc.element(open.node) {
            if open.visible {
                self.out.write_bytes(b"</")?;
                self.out.write_name(el.name.qualified_name())?;
                self.out.write_bytes(b">")?;
            }
            self.passed_over(open.node);
        }
        self.state.ns.pop();
        Ok(())
    }

    /// Note that the walk is past `element`.
    fn passed_over(&mut self, element: NodeId) {
        if self.doc.parent_element(element).is_none() {
            self.position = DocumentPosition::AfterDocumentElement;
        }
    }

    fn write_start_tag(&mut self, name: &str) -> io::Result<()> {
        self.out.write_bytes(b"<")?;
        self.out.write_name(name)?;
        self.attrs.write_to(&mut self.out)?;
        self.out.write_bytes(b">")
    }

    fn write_comment(&mut self, data: &str) -> io::Result<()> {
        if self.position == DocumentPosition::AfterDocumentElement {
            self.out.write_bytes(b"\n")?;
        }
        escape::write_comment(&mut self.out, data)?;
        if self.position == DocumentPosition::BeforeDocumentElement {
            self.out.write_bytes(b"\n")?;
        }
        Ok(())
    }

    fn write_pi(&mut self, target: &str, data: &str) -> io::Result<()> {
        if self.position == DocumentPosition::AfterDocumentElement {
            self.out.write_bytes(b"\n")?;
        }
        escape::write_pi(&mut self.out, target, data)?;
        if self.position == DocumentPosition::BeforeDocumentElement {
            self.out.write_bytes(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusive::Exclusive;
    use crate::inclusive::{Inclusive, Version};

    fn walk(doc: &Document, root: NodeId, with_comments: bool) -> Result<String, C14nError> {
        let selector = Inclusive::new(Version::V1_0);
        let mut walker = Walker::new(doc, &selector, with_comments, false, Vec::new());
        walker.walk_subtree(root, None)?;
        Ok(String::from_utf8(walker.into_inner()).unwrap())
    }

    #[test]
    fn test_document_level_newlines() {
        let doc = Document::parse("<?a?><!--b--><doc/><!--c--><?d e?>").unwrap();
        assert_eq!(
            walk(&doc, doc.root(), true).unwrap(),
            "<?a?>\n<!--b-->\n<doc></doc>\n<!--c-->\n<?d e?>"
        );
        assert_eq!(
            walk(&doc, doc.root(), false).unwrap(),
            "<?a?>\n<doc></doc>\n<?d e?>"
        );
    }

    #[test]
    fn test_nested_comments_have_no_newlines() {
        let doc = Document::parse("<doc><!--x--><?p?></doc>").unwrap();
        assert_eq!(walk(&doc, doc.root(), true).unwrap(), "<doc><!--x--><?p?></doc>");
    }

    #[test]
    fn test_subtree_stays_inside_root() {
        let doc = Document::parse("<a><b>1</b><c>2</c></a>").unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.first_child(a).unwrap();
        assert_eq!(walk(&doc, b, false).unwrap(), "<b>1</b>");
        let text = doc.first_child(b).unwrap();
        assert_eq!(walk(&doc, text, false).unwrap(), "1");
    }

    #[test]
    fn test_excluded_subtree() {
        let doc = Document::parse("<a><b><x/></b><c/></a>").unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let selector = Exclusive::default();
        let mut walker = Walker::new(&doc, &selector, false, false, Vec::new());
        walker.walk_subtree(doc.root(), Some(b)).unwrap();
        assert_eq!(walker.into_inner(), b"<a><c></c></a>");
    }

    #[test]
    fn test_illegal_node_types() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.append_element(root, "a", None);
        doc.append_entity(el, "ent");
        let attr = doc.set_attribute(el, "x", None, "1");
        assert!(matches!(
            walk(&doc, root, false),
            Err(C14nError::IllegalNodeType("entity"))
        ));
        assert!(matches!(
            walk(&doc, attr, false),
            Err(C14nError::IllegalNodeType("attribute"))
        ));
    }

    #[test]
    fn test_doctype_and_cdata() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_doctype(root, "a");
        let el = doc.append_element(root, "a", None);
        doc.append_cdata(el, "x<y");
        doc.append_text(el, "\r");
        assert_eq!(walk(&doc, root, false).unwrap(), "<a>x&lt;y&#xD;</a>");
    }

    #[test]
    fn test_fragment_root() {
        let mut doc = Document::new();
        let frag = doc.create_fragment();
        doc.append_element(frag, "a", None);
        doc.append_comment(frag, "c");
        assert_eq!(walk(&doc, frag, true).unwrap(), "<a></a>\n<!--c-->");
    }

    #[test]
    fn test_sink_errors_propagate() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let doc = Document::parse("<a/>").unwrap();
        let selector = Inclusive::new(Version::V1_0);
        let mut walker = Walker::new(&doc, &selector, false, false, Broken);
        assert!(matches!(
            walker.walk_subtree(doc.root(), None),
            Err(C14nError::Io(_))
        ));
    }
}
