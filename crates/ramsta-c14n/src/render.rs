#![forbid(unsafe_code)]

//! Shared rendering utilities for C14N output.
//!
//! An [`AttrSet`] collects what one start tag emits: namespace declarations
//! first (default namespace, then by prefix), then attributes ordered by
//! namespace URI and local name with un-namespaced attributes first.
//! Inserting a second entry with the same sort key keeps the first.

use crate::escape;
use crate::utf8::Utf8Writer;
use ramsta_core::ns;
use ramsta_xml::{Attribute, NodeId};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, Copy)]
pub struct NsDecl<'a> {
    /// The prefix ("" for default namespace).
    pub prefix: &'a str,
    /// The namespace URI.
    pub uri: &'a str,
    /// The declaring attribute, if the binding came from the document.
    pub source: Option<NodeId>,
}

impl NsDecl<'_> {
    /// The attribute name this declaration is written with.
    pub fn attr_name(&self) -> String {
        if self.prefix.is_empty() {
            ns::XMLNS_PREFIX.to_owned()
        } else {
            format!("{}:{}", ns::XMLNS_PREFIX, self.prefix)
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut Utf8Writer<W>) -> io::Result<()> {
        escape::write_attr(w, &self.attr_name(), self.uri)
    }
}

impl PartialEq for NsDecl<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
    }
}

impl Eq for NsDecl<'_> {}

impl Ord for NsDecl<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Default namespace (empty prefix) sorts first.
        // Then sort by prefix lexicographically.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(other.prefix),
        }
    }
}

impl PartialOrd for NsDecl<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone)]
pub struct Attr<'a> {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: &'a str,
    /// The local name.
    pub local_name: &'a str,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: &'a str,
    /// The attribute value.
    pub value: Cow<'a, str>,
}

impl<'a> Attr<'a> {
    pub fn from_attribute(attr: &'a Attribute) -> Self {
        Self {
            ns_uri: attr.name.namespace_uri().unwrap_or(""),
            local_name: attr.name.local_name(),
            qualified_name: attr.name.qualified_name(),
            value: Cow::Borrowed(&attr.value),
        }
    }

    /// The same attribute carrying a different value.
    pub fn with_value(attr: &'a Attribute, value: String) -> Self {
        Self {
            value: Cow::Owned(value),
            ..Self::from_attribute(attr)
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut Utf8Writer<W>) -> io::Result<()> {
        escape::write_attr(w, self.qualified_name, &self.value)
    }
}

impl PartialEq for Attr<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Attr<'_> {}

impl Ord for Attr<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Attributes with no namespace come before those with a namespace.
        // Among those with namespaces, sort by (ns_uri, local_name).
        // Among those without namespaces, sort by local_name.
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(other.ns_uri)
                .then(self.local_name.cmp(other.local_name)),
        }
    }
}

impl PartialOrd for Attr<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The sorted namespace declarations and attributes of one start tag.
#[derive(Debug, Default)]
pub struct AttrSet<'a> {
    namespaces: BTreeSet<NsDecl<'a>>,
    attributes: BTreeSet<Attr<'a>>,
}

impl<'a> AttrSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace declaration; false if its prefix is already present.
    pub fn insert_namespace(&mut self, decl: NsDecl<'a>) -> bool {
        self.namespaces.insert(decl)
    }

    /// Add an attribute; false if one with the same name is already present.
    pub fn insert(&mut self, attr: Attr<'a>) -> bool {
        self.attributes.insert(attr)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.attributes.is_empty()
    }

    pub fn clear(&mut self) {
        self.namespaces.clear();
        self.attributes.clear();
    }

    /// Write every entry in canonical order, each with a leading space.
    pub fn write_to<W: Write>(&self, w: &mut Utf8Writer<W>) -> io::Result<()> {
        for decl in &self.namespaces {
            decl.write_to(w)?;
        }
        for attr in &self.attributes {
            attr.write_to(w)?;
        }
        Ok(())
    }
}
