#![forbid(unsafe_code)]

//! Algorithm URI constants for Canonical XML.
//!
//! Each constant is the URI string that appears in the `Algorithm`
//! attribute of a `CanonicalizationMethod` or `Transform` element.

// ── Canonicalization ─────────────────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const C14N11: &str = "http://www.w3.org/2006/12/xml-c14n11";
pub const C14N11_WITH_COMMENTS: &str = "http://www.w3.org/2006/12/xml-c14n11#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// All canonicalization algorithm URIs, in the order they are listed by
/// `ramsta info`.
pub const C14N_ALGORITHMS: &[&str] = &[
    C14N,
    C14N_WITH_COMMENTS,
    C14N11,
    C14N11_WITH_COMMENTS,
    EXC_C14N,
    EXC_C14N_WITH_COMMENTS,
];
