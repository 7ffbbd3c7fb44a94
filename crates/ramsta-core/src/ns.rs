#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML namespace, bound to the `xml` prefix.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace, the namespace of every namespace declaration attribute.
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

/// The reserved `xml` prefix.
pub const XML_PREFIX: &str = "xml";

/// The reserved `xmlns` prefix and attribute name.
pub const XMLNS_PREFIX: &str = "xmlns";

/// Token for the default namespace in an InclusiveNamespaces PrefixList.
pub const DEFAULT_PREFIX_TOKEN: &str = "#default";

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    // xml:* attributes
    pub const XML_ID: &str = "id";
    pub const XML_BASE: &str = "base";
}
