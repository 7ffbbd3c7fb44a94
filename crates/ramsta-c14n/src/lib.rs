#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for Ramsta.
//!
//! Implements all six W3C canonicalization variants:
//! - Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.1 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)
//!
//! Output is written incrementally to any [`std::io::Write`] sink.

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod inclusive11;
pub mod render;
pub mod selector;
pub mod symbol_table;
pub mod uri;
pub mod utf8;
pub mod walker;
pub mod xml_attrs;

use exclusive::Exclusive;
use inclusive::{Inclusive, Version};
use ramsta_core::{algorithm, C14nError, Error};
use ramsta_xml::{Document, NodeFilter, NodeId, NodeSet};
use selector::{AttrSelector, Selection};
use std::io::{self, Write};
use tracing::debug;
use walker::Walker;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

/// The attribute selection algorithm behind a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Inclusive,
    Exclusive,
    Inclusive11,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Inclusive11 => algorithm::C14N11,
            Self::Inclusive11WithComments => algorithm::C14N11_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::C14N11 => Some(Self::Inclusive11),
            algorithm::C14N11_WITH_COMMENTS => Some(Self::Inclusive11WithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments
                | Self::Inclusive11WithComments
                | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        self.variant() == Variant::Exclusive
    }

    pub fn variant(&self) -> Variant {
        match self {
            Self::Inclusive | Self::InclusiveWithComments => Variant::Inclusive,
            Self::Inclusive11 | Self::Inclusive11WithComments => Variant::Inclusive11,
            Self::Exclusive | Self::ExclusiveWithComments => Variant::Exclusive,
        }
    }
}

/// What part of the document a call outputs.
#[derive(Clone, Copy)]
enum Scope<'s> {
    Subtree {
        root: NodeId,
        excluded: Option<NodeId>,
    },
    Selection {
        root: NodeId,
        selection: Selection<'s>,
    },
}

/// Counts the bytes passed through to the sink.
struct Counted<W> {
    inner: W,
    bytes: usize,
}

impl<W: Write> Write for Counted<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A configured canonicalizer.  Holds no per-call state, so one value can
/// serve any number of calls, from any thread.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    mode: C14nMode,
    exclusive: Exclusive,
    legacy_surrogates: bool,
}

impl Canonicalizer {
    pub fn new(mode: C14nMode) -> Self {
        Self {
            mode,
            exclusive: Exclusive::default(),
            legacy_surrogates: false,
        }
    }

    pub fn mode(&self) -> C14nMode {
        self.mode
    }

    /// Set the InclusiveNamespaces PrefixList (whitespace separated,
    /// `#default` for the default namespace).  Only exclusive modes take one.
    pub fn inclusive_namespaces(mut self, prefix_list: &str) -> Result<Self, Error> {
        if !self.mode.is_exclusive() {
            return Err(C14nError::UnsupportedOperation(format!(
                "{} does not take an InclusiveNamespaces PrefixList",
                self.mode.uri()
            ))
            .into());
        }
        self.exclusive = Exclusive::new(exclusive::parse_prefix_list(prefix_list));
        Ok(self)
    }

    /// Write every character above U+FFFF as `??`, one `?` per UTF-16 code
    /// unit, instead of its four-byte UTF-8 form.
    pub fn legacy_surrogates(mut self, legacy: bool) -> Self {
        self.legacy_surrogates = legacy;
        self
    }

    /// Canonicalize the subtree rooted at `root`.
    pub fn canonicalize_subtree<W: Write>(
        &self,
        doc: &Document,
        root: NodeId,
        sink: W,
    ) -> Result<(), Error> {
        self.run(doc, Scope::Subtree { root, excluded: None }, sink)
    }

    /// Canonicalize the subtree rooted at `root`, leaving out `excluded`
    /// and everything below it.
    pub fn canonicalize_subtree_excluding<W: Write>(
        &self,
        doc: &Document,
        root: NodeId,
        excluded: NodeId,
        sink: W,
    ) -> Result<(), Error> {
        let excluded = Some(excluded);
        self.run(doc, Scope::Subtree { root, excluded }, sink)
    }

    /// Canonicalize the nodes of `node_set`, in document order.
    pub fn canonicalize_node_set<W: Write>(
        &self,
        doc: &Document,
        node_set: &NodeSet,
        sink: W,
    ) -> Result<(), Error> {
        self.canonicalize_selection(doc, doc.root(), Some(node_set), None, sink)
    }

    /// Canonicalize the nodes under `root` that `filter` includes.
    pub fn canonicalize_filtered<W: Write>(
        &self,
        doc: &Document,
        root: NodeId,
        filter: &dyn NodeFilter,
        sink: W,
    ) -> Result<(), Error> {
        self.canonicalize_selection(doc, root, None, Some(filter), sink)
    }

    /// Canonicalize the nodes under `root` that pass `filter` and belong to
    /// `node_set`.  A missing set or filter lets every node through.
    pub fn canonicalize_selection<W: Write>(
        &self,
        doc: &Document,
        root: NodeId,
        node_set: Option<&NodeSet>,
        filter: Option<&dyn NodeFilter>,
        sink: W,
    ) -> Result<(), Error> {
        let selection = Selection { node_set, filter };
        self.run(doc, Scope::Selection { root, selection }, sink)
    }

    pub fn subtree_to_bytes(&self, doc: &Document, root: NodeId) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.canonicalize_subtree(doc, root, &mut out)?;
        Ok(out)
    }

    pub fn subtree_excluding_to_bytes(
        &self,
        doc: &Document,
        root: NodeId,
        excluded: NodeId,
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.canonicalize_subtree_excluding(doc, root, excluded, &mut out)?;
        Ok(out)
    }

    pub fn node_set_to_bytes(&self, doc: &Document, node_set: &NodeSet) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.canonicalize_node_set(doc, node_set, &mut out)?;
        Ok(out)
    }

    pub fn filtered_to_bytes(
        &self,
        doc: &Document,
        root: NodeId,
        filter: &dyn NodeFilter,
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.canonicalize_filtered(doc, root, filter, &mut out)?;
        Ok(out)
    }

    pub fn selection_to_bytes(
        &self,
        doc: &Document,
        root: NodeId,
        node_set: Option<&NodeSet>,
        filter: Option<&dyn NodeFilter>,
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.canonicalize_selection(doc, root, node_set, filter, &mut out)?;
        Ok(out)
    }

    fn run<W: Write>(&self, doc: &Document, scope: Scope<'_>, sink: W) -> Result<(), Error> {
        debug!(mode = ?self.mode, "canonicalization started");
        let sink = Counted {
            inner: sink,
            bytes: 0,
        };
        let sink = match self.mode.variant() {
            Variant::Inclusive => self.walk(doc, &Inclusive::new(Version::V1_0), scope, sink)?,
            Variant::Inclusive11 => self.walk(doc, &inclusive11::selector(), scope, sink)?,
            Variant::Exclusive => self.walk(doc, &self.exclusive, scope, sink)?,
        };
        debug!(mode = ?self.mode, bytes = sink.bytes, "canonicalization finished");
        Ok(())
    }

    fn walk<S: AttrSelector, W: Write>(
        &self,
        doc: &Document,
        selector: &S,
        scope: Scope<'_>,
        sink: W,
    ) -> Result<W, C14nError> {
        let mut walker = Walker::new(
            doc,
            selector,
            self.mode.with_comments(),
            self.legacy_surrogates,
            sink,
        );
        match scope {
            Scope::Subtree { root, excluded } => walker.walk_subtree(root, excluded)?,
            Scope::Selection { root, selection } => walker.walk_node_set(root, &selection)?,
        }
        Ok(walker.into_inner())
    }
}

/// Canonicalize an XML document.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = Document::parse(xml)?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Convenience: canonicalize with a pre-parsed document.
pub fn canonicalize_doc(
    doc: &Document,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let mut canon = Canonicalizer::new(mode);
    if !inclusive_prefixes.is_empty() {
        canon = canon.inclusive_namespaces(&inclusive_prefixes.join(" "))?;
    }
    match node_set {
        Some(set) => canon.node_set_to_bytes(doc, set),
        None => canon.subtree_to_bytes(doc, doc.root()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramsta_xml::{ExcludeSubtree, Visibility};

    fn c14n(xml: &str, mode: C14nMode) -> String {
        String::from_utf8(canonicalize(xml, mode, None, &[]).unwrap()).unwrap()
    }

    const ALL_MODES: [C14nMode; 6] = [
        C14nMode::Inclusive,
        C14nMode::InclusiveWithComments,
        C14nMode::Inclusive11,
        C14nMode::Inclusive11WithComments,
        C14nMode::Exclusive,
        C14nMode::ExclusiveWithComments,
    ];

    #[test]
    fn test_mode_uris() {
        for mode in ALL_MODES {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(C14nMode::from_uri("urn:nope"), None);
        assert!(C14nMode::ExclusiveWithComments.is_exclusive());
        assert!(!C14nMode::Inclusive11.is_exclusive());
        assert_eq!(C14nMode::Inclusive11WithComments.variant(), Variant::Inclusive11);
    }

    #[test]
    fn test_scenario_inclusive_keeps_declaration_on_apex() {
        let xml = r#"<a xmlns:x="urn:u"><b x:attr="v"/></a>"#;
        assert_eq!(
            c14n(xml, C14nMode::Inclusive),
            r#"<a xmlns:x="urn:u"><b x:attr="v"></b></a>"#
        );
    }

    #[test]
    fn test_scenario_single_letter_namespace_is_relative() {
        let err = canonicalize(r#"<a xmlns:x="u"><b x:attr="v"/></a>"#, C14nMode::Inclusive, None, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Canonicalization(C14nError::RelativeNamespace { .. })
        ));
    }

    #[test]
    fn test_scenario_exclusive_moves_declaration_to_user() {
        let doc = Document::parse(r#"<a xmlns:x="urn:u"><b x:attr="v"/><c/></a>"#).unwrap();
        let canon = Canonicalizer::new(C14nMode::Exclusive);
        let b = doc.find_element(None, "b").unwrap();
        let c = doc.find_element(None, "c").unwrap();
        assert_eq!(
            canon.subtree_to_bytes(&doc, b).unwrap(),
            br#"<b xmlns:x="urn:u" x:attr="v"></b>"#
        );
        assert_eq!(canon.subtree_to_bytes(&doc, c).unwrap(), b"<c></c>");
    }

    #[test]
    fn test_scenario_adjacent_text_coalesces() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(root, "a", None);
        doc.append_text(a, "foo");
        let bar = doc.append_text(a, "bar");
        let mut set = NodeSet::all(&doc);
        set.remove(bar);
        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .node_set_to_bytes(&doc, &set)
            .unwrap();
        assert_eq!(bytes, b"<a>foobar</a>");
    }

    #[test]
    fn test_scenario_comment_before_document_element() {
        let xml = "<!--c--><doc/>";
        assert_eq!(c14n(xml, C14nMode::InclusiveWithComments), "<!--c-->\n<doc></doc>");
        assert_eq!(c14n(xml, C14nMode::Inclusive), "<doc></doc>");
    }

    #[test]
    fn test_idempotence() {
        let xml = r#"<?pi data?>
<!-- head -->
<r xmlns="urn:r" xmlns:p="urn:p" xml:lang="en">
  <p:e b="2" a="1" p:z="&lt;&amp;&quot;"><![CDATA[x > y]]></p:e>
  <f xmlns="" p:attr="&#x9;&#xA;">text&#xD;</f>
  <empty/>
</r>
<!-- tail -->"#;
        for mode in ALL_MODES {
            let once = c14n(xml, mode);
            let twice = c14n(&once, mode);
            assert_eq!(once, twice, "mode {mode:?}");
        }
    }

    #[test]
    fn test_determinism() {
        let xml = r#"<r xmlns:b="urn:b" xmlns:a="urn:a"><a:x b:y="1" a:y="2" y="3"/></r>"#;
        let doc = Document::parse(xml).unwrap();
        let canon = Canonicalizer::new(C14nMode::Inclusive);
        let first = canon.subtree_to_bytes(&doc, doc.root()).unwrap();
        for _ in 0..5 {
            assert_eq!(canon.subtree_to_bytes(&doc, doc.root()).unwrap(), first);
        }
        assert_eq!(
            String::from_utf8(first).unwrap(),
            r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x y="3" a:y="2" b:y="1"></a:x></r>"#
        );
    }

    #[test]
    fn test_equivalent_documents_match() {
        let first = r#"<r xmlns:a="urn:a" b="2" a="1"><a:x xmlns:a="urn:a" a:k='v'/></r>"#;
        let second = "<?xml version=\"1.0\"?>\n<r  a='1'\n   xmlns:a='urn:a' b=\"2\"><a:x a:k=\"v\"></a:x></r>";
        for mode in ALL_MODES {
            assert_eq!(c14n(first, mode), c14n(second, mode), "mode {mode:?}");
        }
        assert_eq!(
            c14n(first, C14nMode::Inclusive),
            r#"<r xmlns:a="urn:a" a="1" b="2"><a:x a:k="v"></a:x></r>"#
        );
    }

    #[test]
    fn test_attribute_escaping_survives_reparse() {
        let value = "<&\"\t\r\nx>";
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(root, "a", None);
        doc.set_attribute(a, "v", None, value);
        doc.append_text(a, "<&>\r");

        let bytes = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, root)
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "<a v=\"&lt;&amp;&quot;&#x9;&#xD;&#xA;x>\">&lt;&amp;&gt;&#xD;</a>");

        let reparsed = Document::parse(&text).unwrap();
        let el = reparsed.document_element().unwrap();
        let attr = reparsed.attribute(reparsed.attributes(el)[0]).unwrap();
        assert_eq!(attr.value, value);
        match reparsed.kind(reparsed.first_child(el).unwrap()) {
            ramsta_xml::NodeKind::Text(t) => assert_eq!(t, "<&>\r"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_illegal_node_type_aborts() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(root, "a", None);
        doc.append_notation(a, "n");
        let err = Canonicalizer::new(C14nMode::Exclusive)
            .subtree_to_bytes(&doc, root)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Canonicalization(C14nError::IllegalNodeType("notation"))
        ));
    }

    #[test]
    fn test_prefix_list_needs_exclusive_mode() {
        let err = Canonicalizer::new(C14nMode::Inclusive11)
            .inclusive_namespaces("a b")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Canonicalization(C14nError::UnsupportedOperation(_))
        ));
        assert!(canonicalize("<a/>", C14nMode::Inclusive, None, &["p".into()]).is_err());
    }

    #[test]
    fn test_canonicalize_with_prefix_list() {
        let xml = r#"<a xmlns:p="urn:p" xmlns:q="urn:q"/>"#;
        let out = canonicalize(xml, C14nMode::Exclusive, None, &["q".into(), "#default".into()])
            .unwrap();
        assert_eq!(out, br#"<a xmlns:q="urn:q"></a>"#);
    }

    #[test]
    fn test_subtree_excluding() {
        let xml = r#"<doc><data>1</data><sig><v>x</v></sig></doc>"#;
        let doc = Document::parse(xml).unwrap();
        let sig = doc.find_element(None, "sig").unwrap();
        let canon = Canonicalizer::new(C14nMode::Inclusive);
        assert_eq!(
            canon.subtree_excluding_to_bytes(&doc, doc.root(), sig).unwrap(),
            b"<doc><data>1</data></doc>"
        );

        let filter = ExcludeSubtree::new(sig);
        assert_eq!(
            canon.filtered_to_bytes(&doc, doc.root(), &filter).unwrap(),
            b"<doc><data>1</data></doc>"
        );
    }

    #[test]
    fn test_selection_combines_set_and_filter() {
        let xml = r#"<doc><a>1</a><b>2</b><!--c--></doc>"#;
        let doc = Document::parse(xml).unwrap();
        let set = NodeSet::all_without_comments(&doc);
        let b = doc.find_element(None, "b").unwrap();
        let drop_b = move |_: &Document, n: NodeId| {
            if n == b {
                Visibility::Excluded
            } else {
                Visibility::Included
            }
        };
        let bytes = Canonicalizer::new(C14nMode::InclusiveWithComments)
            .selection_to_bytes(&doc, doc.root(), Some(&set), Some(&drop_b))
            .unwrap();
        assert_eq!(bytes, b"<doc><a>1</a></doc>");
    }

    #[test]
    fn test_writes_into_any_sink() {
        let doc = Document::parse("<a>\u{e9}</a>").unwrap();
        let mut out = io::Cursor::new(Vec::new());
        Canonicalizer::new(C14nMode::Inclusive)
            .canonicalize_subtree(&doc, doc.root(), &mut out)
            .unwrap();
        assert_eq!(out.into_inner(), "<a>\u{e9}</a>".as_bytes());
    }

    #[test]
    fn test_legacy_surrogates() {
        let doc = Document::parse("<a b=\"\u{1F600}\">\u{1F600}</a>").unwrap();
        let modern = Canonicalizer::new(C14nMode::Inclusive)
            .subtree_to_bytes(&doc, doc.root())
            .unwrap();
        assert_eq!(modern, "<a b=\"\u{1F600}\">\u{1F600}</a>".as_bytes());
        let legacy = Canonicalizer::new(C14nMode::Inclusive)
            .legacy_surrogates(true)
            .subtree_to_bytes(&doc, doc.root())
            .unwrap();
        assert_eq!(legacy, b"<a b=\"??\">??</a>");
    }

    #[test]
    fn test_canonicalizer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Canonicalizer>();
    }
}
