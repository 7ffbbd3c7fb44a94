#![forbid(unsafe_code)]

//! XML tree model for the Ramsta canonicalization library.
//!
//! Provides an arena-backed document that keeps prefixes and namespace
//! declarations, a `roxmltree`-backed parser, plus the `NodeSet` and
//! `NodeFilter` types needed for document-subset canonicalization.

pub mod document;
pub mod filter;
pub mod nodeset;
pub mod parse;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, QName};
pub use filter::{ExcludeSubtree, NodeFilter, Visibility};
pub use nodeset::NodeSet;
pub use parse::parsing_options;
