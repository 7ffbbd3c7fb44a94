#![forbid(unsafe_code)]

/// Errors produced by the Ramsta Canonical XML library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] C14nError),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// The underlying cause of a failed canonicalization.
///
/// Every fatal condition met during a walk is reported as one of these,
/// wrapped in [`Error::Canonicalization`].
#[derive(Debug, thiserror::Error)]
pub enum C14nError {
    /// The walk met a node kind that has no canonical form.
    #[error("illegal node type during traversal: {0}")]
    IllegalNodeType(&'static str),

    /// A rendered namespace declaration carries a relative URI.
    #[error("element {element} has a relative namespace: {prefix}=\"{uri}\"")]
    RelativeNamespace {
        element: String,
        prefix: String,
        uri: String,
    },

    /// The operation is not part of this canonicalization variant.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Writing to the output sink failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_namespace_message() {
        let err: Error = C14nError::RelativeNamespace {
            element: "a:doc".into(),
            prefix: "a".into(),
            uri: "foo/bar".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "canonicalization failed: element a:doc has a relative namespace: a=\"foo/bar\""
        );
    }

    #[test]
    fn test_io_is_wrapped_once() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: Error = C14nError::from(io).into();
        assert!(matches!(err, Error::Canonicalization(C14nError::Io(_))));
        assert!(std::error::Error::source(&err).is_some());
    }
}
