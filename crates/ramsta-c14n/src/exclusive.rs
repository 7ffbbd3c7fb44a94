#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! The key difference from inclusive C14N: only "visibly utilized" namespace
//! declarations are output.  A namespace is visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList, OR
//! 4. It's the default namespace and the element is in that namespace.
//!
//! `xml:*` attributes are never inherited.

use crate::render::{Attr, AttrSet};
use crate::selector::{
    default_namespace_decl, element_prefix, is_xml_binding, reject_relative, render_namespace,
    seed_namespaces, AttrSelector, Selection, WalkState,
};
use crate::xml_attrs::XmlAttrPolicy;
use ramsta_core::{ns, C14nError};
use ramsta_xml::{Attribute, Document, NodeId};
use std::collections::BTreeSet;

/// Parse an InclusiveNamespaces PrefixList: whitespace separated prefixes,
/// with `#default` standing for the default namespace.
pub fn parse_prefix_list(list: &str) -> BTreeSet<String> {
    list.split_whitespace()
        .map(|token| {
            if token == ns::DEFAULT_PREFIX_TOKEN {
                String::new()
            } else {
                token.to_owned()
            }
        })
        .collect()
}

/// Attribute selection for Exclusive Canonical XML 1.0.
#[derive(Debug, Clone, Default)]
pub struct Exclusive {
    inclusive_prefixes: BTreeSet<String>,
}

impl Exclusive {
    pub fn new(inclusive_prefixes: BTreeSet<String>) -> Self {
        Self { inclusive_prefixes }
    }

    pub fn inclusive_prefixes(&self) -> &BTreeSet<String> {
        &self.inclusive_prefixes
    }

    fn utilized_seed(&self) -> BTreeSet<&str> {
        self.inclusive_prefixes.iter().map(String::as_str).collect()
    }

    /// The prefix an attribute makes use of, if it counts as a use.
    fn attribute_prefix(attr: &Attribute) -> Option<&str> {
        attr.name
            .prefix()
            .filter(|&p| p != ns::XML_PREFIX && p != ns::XMLNS_PREFIX)
    }

    fn render_utilized<'a: 'p, 'p>(
        doc: &'a Document,
        element: NodeId,
        mut utilized: BTreeSet<&'p str>,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError> {
        utilized.insert(element_prefix(doc, element));
        for prefix in utilized {
            if let Some(decl) = state.ns.get_mapping(prefix) {
                render_namespace(doc, element, decl, out)?;
            }
        }
        Ok(())
    }
}

impl AttrSelector for Exclusive {
    fn xml_attr_policy(&self) -> XmlAttrPolicy {
        XmlAttrPolicy::Inherit
    }

    fn seed_ancestor<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        _distance: isize,
        state: &mut WalkState<'a>,
    ) {
        seed_namespaces(doc, element, state);
    }

    fn select_subtree<'a>(
        &self,
        doc: &'a Document,
        element: NodeId,
        _apex: bool,
        state: &mut WalkState<'a>,
        out: &mut AttrSet<'a>,
    ) -> Result<(), C14nError> {
        let mut utilized = self.utilized_seed();
        for &id in doc.attributes(element) {
            let Some(attr) = doc.attribute(id) else {
                continue;
            };
            if let Some(prefix) = attr.declared_prefix() {
                if !is_xml_binding(prefix, &attr.value)
                    && state.ns.add_mapping(prefix, &attr.value, Some(id))
                {
                    reject_relative(doc, element, prefix, &attr.value)?;
                }
            } else {
                if let Some(prefix) = Self::attribute_prefix(attr) {
                    utilized.insert(prefix);
                }
                out.insert(Attr::from_attribute(attr));
            }
        }
        Self::render_utilized(doc, element, utilized, state, out)
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
        let mut utilized = if visible {
            self.utilized_seed()
        } else {
            BTreeSet::new()
        };
        for &id in doc.attributes(element) {
            let Some(attr) = doc.attribute(id) else {
                continue;
            };
            if let Some(prefix) = attr.declared_prefix() {
                if is_xml_binding(prefix, &attr.value) {
                    continue;
                }
                if visible && !prefix.is_empty() && !selection.is_visible(doc, id) {
                    state.ns.remove_mapping_if_not_rendered(prefix);
                } else if state.ns.add_mapping(prefix, &attr.value, Some(id)) {
                    reject_relative(doc, element, prefix, &attr.value)?;
                }
            } else if visible && selection.is_visible(doc, id) {
                if let Some(prefix) = Self::attribute_prefix(attr) {
                    utilized.insert(prefix);
                }
                out.insert(Attr::from_attribute(attr));
            }
        }

        if !visible {
            return Ok(());
        }
        if let Some(decl_id) = default_namespace_decl(doc, element) {
            if !selection.is_visible(doc, decl_id) {
                state.ns.add_mapping("", "", None);
            }
        }
        Self::render_utilized(doc, element, utilized, state, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{C14nMode, Canonicalizer};
    use ramsta_core::Error;
    use ramsta_xml::NodeSet;

    fn exc(xml: &str, local: &str, prefixes: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        let el = doc.find_element(None, local).unwrap();
        let bytes = Canonicalizer::new(C14nMode::Exclusive)
            .inclusive_namespaces(prefixes)
            .unwrap()
            .subtree_to_bytes(&doc, el)
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_parse_prefix_list() {
        let set = parse_prefix_list("  ds  #default\txenc ");
        let items: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(items, vec!["", "ds", "xenc"]);
        assert!(parse_prefix_list("").is_empty());
    }

    #[test]
    fn test_only_utilized_namespaces() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b" xmlns:c="urn:c"><e a:x="1"><c:f/></e></r>"#;
        assert_eq!(
            exc(xml, "e", ""),
            r#"<e xmlns:a="urn:a" a:x="1"><c:f xmlns:c="urn:c"></c:f></e>"#
        );
    }

    #[test]
    fn test_inclusive_prefix_list() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><e/></r>"#;
        assert_eq!(exc(xml, "e", "b"), r#"<e xmlns:b="urn:b"></e>"#);
        assert_eq!(exc(xml, "e", "b z"), r#"<e xmlns:b="urn:b"></e>"#);
    }

    #[test]
    fn test_default_namespace() {
        let xml = r#"<r xmlns="urn:d"><e><f xmlns=""/></e></r>"#;
        let doc = Document::parse(xml).unwrap();
        let e = doc.find_element(Some("urn:d"), "e").unwrap();
        let bytes = Canonicalizer::new(C14nMode::Exclusive)
            .subtree_to_bytes(&doc, e)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"<e xmlns="urn:d"><f xmlns=""></f></e>"#
        );
    }

    #[test]
    fn test_default_token_renders_unused_default() {
        let xml = r#"<r xmlns="urn:d"><p:e xmlns:p="urn:p"/></r>"#;
        let doc = Document::parse(xml).unwrap();
        let e = doc.find_element(Some("urn:p"), "e").unwrap();
        let canon = Canonicalizer::new(C14nMode::Exclusive);
        let plain = canon.subtree_to_bytes(&doc, e).unwrap();
        assert_eq!(String::from_utf8(plain).unwrap(), r#"<p:e xmlns:p="urn:p"></p:e>"#);

        let with_default = Canonicalizer::new(C14nMode::Exclusive)
            .inclusive_namespaces("#default")
            .unwrap()
            .subtree_to_bytes(&doc, e)
            .unwrap();
        assert_eq!(
            String::from_utf8(with_default).unwrap(),
            r#"<p:e xmlns="urn:d" xmlns:p="urn:p"></p:e>"#
        );
    }

    #[test]
    fn test_xml_attrs_not_inherited() {
        let xml = r#"<r xml:lang="en"><e xml:space="preserve"/></r>"#;
        assert_eq!(exc(xml, "e", ""), r#"<e xml:space="preserve"></e>"#);
    }

    #[test]
    fn test_unused_relative_declaration_is_rejected() {
        let doc = Document::parse(r#"<a xmlns:x="rel"><b/></a>"#).unwrap();
        let err = Canonicalizer::new(C14nMode::Exclusive)
            .subtree_to_bytes(&doc, doc.root())
            .unwrap_err();
        match err {
            Error::Canonicalization(C14nError::RelativeNamespace {
                element,
                prefix,
                uri,
            }) => {
                assert_eq!(element, "a");
                assert_eq!(prefix, "xmlns:x");
                assert_eq!(uri, "rel");
            }
            other => panic!("unexpected {other:?}"),
        }

        let set = NodeSet::all(&doc);
        assert!(Canonicalizer::new(C14nMode::Exclusive)
            .node_set_to_bytes(&doc, &set)
            .is_err());
    }

    #[test]
    fn test_relative_declaration_outside_subtree_is_ignored() {
        let doc = Document::parse(r#"<a xmlns:x="rel"><b/></a>"#).unwrap();
        let b = doc.find_element(None, "b").unwrap();
        let bytes = Canonicalizer::new(C14nMode::Exclusive)
            .subtree_to_bytes(&doc, b)
            .unwrap();
        assert_eq!(bytes, b"<b></b>");
    }

    #[test]
    fn test_node_set_omitted_parent() {
        let xml = r#"<r xmlns:a="urn:a"><a:s><a:t/></a:s></r>"#;
        let doc = Document::parse(xml).unwrap();
        let s = doc.find_element(Some("urn:a"), "s").unwrap();
        let mut set = NodeSet::all(&doc);
        set.remove(s);
        let bytes = Canonicalizer::new(C14nMode::Exclusive)
            .node_set_to_bytes(&doc, &set)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"<r><a:t xmlns:a="urn:a"></a:t></r>"#
        );
    }
}
