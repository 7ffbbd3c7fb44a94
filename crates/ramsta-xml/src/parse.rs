#![forbid(unsafe_code)]

//! Build a [`Document`] from XML text using `roxmltree`.
//!
//! roxmltree resolves names to (namespace, local name) pairs and folds
//! namespace declarations into its scope tables.  Canonical XML needs the
//! original prefixes and the declarations themselves, so the qualified names
//! are recovered from the raw start tag and every `xmlns` / `xmlns:p`
//! attribute becomes an attribute node again.

use crate::document::{Document, NodeId};
use ramsta_core::{ns, Error};

/// Return roxmltree parsing options that allow DTD.
///
/// DTD is allowed because roxmltree does not expand external entities or
/// perform entity substitution beyond the five predefined XML entities and
/// internal general entities, so it is safe.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

impl Document {
    /// Parse XML text into a new document.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let source = roxmltree::Document::parse_with_options(text, parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        let input = source.input_text();

        let mut doc = Document::new();
        let mut pending = vec![(source.root(), doc.root())];
        while let Some((src, dst)) = pending.pop() {
            for child in src.children() {
                match child.node_type() {
                    roxmltree::NodeType::Element => {
                        let el = doc.copy_element(dst, child, input)?;
                        pending.push((child, el));
                    }
                    roxmltree::NodeType::Text => {
                        doc.append_text(dst, child.text().unwrap_or(""));
                    }
                    roxmltree::NodeType::Comment => {
                        doc.append_comment(dst, child.text().unwrap_or(""));
                    }
                    roxmltree::NodeType::PI => {
                        if let Some(pi) = child.pi() {
                            doc.append_pi(dst, pi.target, pi.value.unwrap_or(""));
                        }
                    }
                    roxmltree::NodeType::Root => {}
                }
            }
        }
        Ok(doc)
    }

    /// Parse XML from bytes, which must be UTF-8.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    fn copy_element(
        &mut self,
        parent: NodeId,
        node: roxmltree::Node<'_, '_>,
        input: &str,
    ) -> Result<NodeId, Error> {
        let raw = input
            .get(node.range().start..)
            .and_then(scan_start_tag)
            .ok_or_else(|| {
                Error::XmlParse(format!(
                    "cannot read start tag of <{}>",
                    node.tag_name().name()
                ))
            })?;

        let el = self.append_element(parent, raw.name, node.tag_name().namespace());

        for name in &raw.attributes {
            if *name == ns::XMLNS_PREFIX {
                let uri = node.lookup_namespace_uri(None).unwrap_or("");
                self.declare_namespace(el, None, uri);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                // roxmltree keeps no binding for the reserved prefix.
                let uri = if prefix == ns::XML_PREFIX {
                    ns::XML
                } else {
                    node.lookup_namespace_uri(Some(prefix)).unwrap_or("")
                };
                self.declare_namespace(el, Some(prefix), uri);
            }
        }

        for attr in node.attributes() {
            let qualified = raw
                .attributes
                .iter()
                .copied()
                .filter(|name| !is_namespace_decl_name(name))
                .find(|name| raw_name_matches(name, &node, attr.namespace(), attr.name()))
                .unwrap_or(attr.name());
            self.set_attribute(el, qualified, attr.namespace(), attr.value());
        }

        Ok(el)
    }
}

fn is_namespace_decl_name(name: &str) -> bool {
    name == ns::XMLNS_PREFIX || name.starts_with("xmlns:")
}

/// Does the raw qualified name `name` denote the resolved attribute name
/// (`namespace`, `local`) in the scope of `node`?
fn raw_name_matches(
    name: &str,
    node: &roxmltree::Node<'_, '_>,
    namespace: Option<&str>,
    local: &str,
) -> bool {
    match name.split_once(':') {
        None => name == local && namespace.is_none(),
        Some((prefix, raw_local)) => {
            if raw_local != local {
                return false;
            }
            if prefix == ns::XML_PREFIX {
                return namespace == Some(ns::XML);
            }
            node.lookup_namespace_uri(Some(prefix)) == namespace
        }
    }
}

/// The qualified names found in a raw start tag.
#[derive(Debug, PartialEq, Eq)]
struct StartTag<'a> {
    name: &'a str,
    attributes: Vec<&'a str>,
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Read the element name and attribute names of the start tag at the
/// beginning of `text`.
fn scan_start_tag(text: &str) -> Option<StartTag<'_>> {
    let rest = text.strip_prefix('<')?;
    let end = rest.find(|c: char| is_xml_space(c) || c == '/' || c == '>')?;
    let name = &rest[..end];
    let mut rest = &rest[end..];
    let mut attributes = Vec::new();

    loop {
        rest = rest.trim_start_matches(is_xml_space);
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('>') {
            break;
        }
        let end = rest.find(|c: char| c == '=' || is_xml_space(c))?;
        attributes.push(&rest[..end]);
        rest = rest[end..].trim_start_matches(is_xml_space);
        rest = rest.strip_prefix('=')?.trim_start_matches(is_xml_space);
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let close = rest[1..].find(quote)?;
        rest = &rest[close + 2..];
    }

    Some(StartTag { name, attributes })
}
