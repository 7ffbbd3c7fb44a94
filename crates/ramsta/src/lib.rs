#![forbid(unsafe_code)]

//! Ramsta: pure Rust Canonical XML.
//!
//! Re-exports the member crates under one roof.

pub use ramsta_c14n as c14n;
pub use ramsta_core as core;
pub use ramsta_xml as xml;

pub use ramsta_c14n::{canonicalize, C14nMode, Canonicalizer};
