#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! Every namespace in scope is output on the first element that renders it,
//! and again only where its binding changes.  When the walk starts below the
//! document element, the root of the walk carries every namespace and
//! `xml:*` attribute it inherits from outside.
//!
//! The same selector serves C14N 1.1 (see [`crate::inclusive11`]), which
//! differs only in its treatment of `xml:id` and `xml:base`.

use crate::render::{Attr, AttrSet};
use crate::selector::{
    default_namespace_decl, is_xml_binding, render_namespace, seed_namespaces, AttrSelector,
    Selection, WalkState,
};
use crate::xml_attrs::XmlAttrPolicy;
use ramsta_core::{ns, C14nError};
use ramsta_xml::{Attribute, Document, NodeId};

/// Which edition of inclusive canonicalization is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1_0,
    V1_1,
}

/// Attribute selection for Canonical XML 1.0 and 1.1.
#[derive(Debug, Clone, Copy)]
pub struct Inclusive {
    version: Version,
}

impl Inclusive {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether an `xml:*` attribute passes to descendants.  1.1 never
    /// inherits `xml:id`.
    fn inherits(&self, attr: &Attribute) -> bool {
        self.version == Version::V1_0 || attr.name.local_name() != ns::attr::XML_ID
    }
}

impl AttrSelector for Inclusive {
    fn xml_attr_policy(&self) -> XmlAttrPolicy {
        match self.version {
            Version::V1_0 => XmlAttrPolicy::Inherit,
            Version::V1_1 => XmlAttrPolicy::Float,
        }
    }

    fn seed_ancestor<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        distance: isize,
        state: &mut WalkState<'a>,
    ) {
        seed_namespaces(doc, element, state);
        state.xml_attrs.push(-distance);
        for &id in doc.attributes(element) {
            if let Some(attr) = doc.attribute(id) {
                if attr.is_xml_attr() && self.inherits(attr) {
                    state.xml_attrs.add(attr);
                }
            }
        }
    }

    fn select_subtree<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        apex: bool,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError> {
        if apex {
            state.xml_attrs.push(state.level());
        }
        for &id in doc.attributes(element) {
            let Some(attr) = doc.attribute(id) else {
                continue;
            };
            if let Some(prefix) = attr.declared_prefix() {
                if is_xml_binding(prefix, &attr.value) {
                    continue;
                }
                if let Some(decl) = state.ns.add_mapping_and_render(prefix, &attr.value, Some(id)) {
                    render_namespace(doc, element, decl, out)?;
                }
            } else if apex && attr.is_xml_attr() && self.inherits(attr) {
                state.xml_attrs.add(attr);
            } else {
                out.insert(Attr::from_attribute(attr));
            }
        }

        if apex {
            let mut inherited = Vec::new();
            state.ns.get_unrendered_nodes(&mut inherited);
            for decl in inherited {
                render_namespace(doc, element, decl, out)?;
            }
            state.xml_attrs.collect(out);
        }
        Ok(())
    }

    fn select_node_set<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        visible: bool,
        selection: &Selection<'_>,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError> {
        state.xml_attrs.push(state.level());
        for &id in doc.attributes(element) {
            let Some(attr) = doc.attribute(id) else {
                continue;
            };
            if let Some(prefix) = attr.declared_prefix() {
                if is_xml_binding(prefix, &attr.value) {
                    continue;
                }
                if visible && !prefix.is_empty() && !selection.is_visible(doc, id) {
                    state.ns.remove_mapping(prefix);
                } else {
                    state.ns.add_mapping(prefix, &attr.value, Some(id));
                }
            } else if attr.is_xml_attr() && self.inherits(attr) {
                state.xml_attrs.add(attr);
            } else if visible && selection.is_visible(doc, id) {
                out.insert(Attr::from_attribute(attr));
            }
        }

        if !visible {
            return Ok(());
        }

        // A default namespace declaration left out of the selection
        // leaves the element without a default namespace.
        if let Some(decl_id) = default_namespace_decl(doc, element) {
            if !selection.is_visible(doc, decl_id) {
                if let Some(decl) = state.ns.add_mapping_and_render("", "", None) {
                    render_namespace(doc, element, decl, out)?;
                }
            }
        }
        state.xml_attrs.collect(out);
        let mut pending = Vec::new();
        state.ns.get_unrendered_nodes(&mut pending);
        for decl in pending {
            render_namespace(doc, element, decl, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{C14nMode, Canonicalizer};
    use ramsta_core::{C14nError, Error};
    use ramsta_xml::{Document, NodeId, NodeSet, Visibility};

    fn c14n(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, doc.root())
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    fn c14n_at(xml: &str, local: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        let el = doc.find_element(None, local).unwrap();
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, el)
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        let output = c14n(r#"<root><a b="1" a="2"/></root>"#);
        // Attributes should be sorted by local name (no namespace)
        assert_eq!(output, r#"<root><a a="2" b="1"></a></root>"#);
    }

    #[test]
    fn test_namespace_rendering() {
        let output = c14n(
            r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child xmlns:a="http://a"/></root>"#,
        );
        assert_eq!(
            output,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn test_text_escaping() {
        let output = c14n(r#"<root a="&quot;&#9;">a &amp; b &lt; c &gt; d</root>"#);
        assert_eq!(output, "<root a=\"&quot;&#x9;\">a &amp; b &lt; c &gt; d</root>");
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        let output = c14n(r#"<a xmlns="urn:d"><b xmlns=""><c xmlns=""/></b></a>"#);
        assert_eq!(output, r#"<a xmlns="urn:d"><b xmlns=""><c></c></b></a>"#);
        let output = c14n(r#"<a><b xmlns=""/></a>"#);
        assert_eq!(output, "<a><b></b></a>");
    }

    #[test]
    fn test_subtree_inherits_context() {
        let xml = r#"<doc xmlns="urn:d" xmlns:p="urn:p" xml:lang="en"><mid xml:space="preserve"><leaf p:a="1"/></mid></doc>"#;
        let doc = Document::parse(xml).unwrap();
        let leaf = doc.find_element(Some("urn:d"), "leaf").unwrap();
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, leaf)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"<leaf xmlns="urn:d" xmlns:p="urn:p" xml:lang="en" xml:space="preserve" p:a="1"></leaf>"#
        );
    }

    #[test]
    fn test_subtree_own_xml_attr_wins() {
        let output = c14n_at(r#"<a xml:lang="en"><b xml:lang="fr"/></a>"#, "b");
        assert_eq!(output, r#"<b xml:lang="fr"></b>"#);
    }

    #[test]
    fn test_xml_namespace_declaration_is_dropped() {
        let output = c14n(r#"<a xmlns:xml="http://www.w3.org/XML/1998/namespace" xml:lang="en"/>"#);
        assert_eq!(output, r#"<a xml:lang="en"></a>"#);
    }

    #[test]
    fn test_relative_namespace_is_rejected() {
        let doc = Document::parse(r#"<a xmlns:p="foo/bar"><p:b/></a>"#).unwrap();
        let err = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, doc.root())
            .unwrap_err();
        match err {
            Error::Canonicalization(C14nError::RelativeNamespace {
                element,
                prefix,
                uri,
            }) => {
                assert_eq!(element, "a");
                assert_eq!(prefix, "xmlns:p");
                assert_eq!(uri, "foo/bar");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_inherited_relative_namespace_is_written() {
        let output = c14n_at(r#"<a xmlns:p="foo/bar"><b/></a>"#, "b");
        assert_eq!(output, r#"<b xmlns:p="foo/bar"></b>"#);
    }

    #[test]
    fn test_node_set_floats_namespaces_and_xml_attrs() {
        let xml = r#"<a xmlns:p="urn:p" xml:lang="en"><b><p:c/></b></a>"#;
        let doc = Document::parse(xml).unwrap();
        let a = doc.document_element().unwrap();
        let mut set = NodeSet::all(&doc);
        set.remove(a);
        let b = doc.first_child(a).unwrap();
        set.remove(b);
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .node_set_to_bytes(&doc, &set)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"<p:c xmlns:p="urn:p" xml:lang="en"></p:c>"#
        );
    }

    #[test]
    fn test_node_set_excluded_default_namespace() {
        let xml = r#"<a xmlns="urn:a"><b xmlns="urn:b"/></a>"#;
        let doc = Document::parse(xml).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let mut set = NodeSet::all(&doc);
        set.remove(doc.attributes(b)[0]);
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .node_set_to_bytes(&doc, &set)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"<a xmlns="urn:a"><b xmlns=""></b></a>"#
        );
    }

    #[test]
    fn test_filtered_attributes() {
        let xml = r#"<a keep="1" drop="2"><b/></a>"#;
        let doc = Document::parse(xml).unwrap();
        let no_drop = |doc: &Document, node: NodeId| {
            let dropped = doc
                .attribute(node)
                .is_some_and(|a| a.name.local_name() == "drop");
            Visibility::from(!dropped)
        };
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .filtered_to_bytes(&doc, doc.root(), &no_drop)
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"<a keep="1"><b></b></a>"#);
    }
}
