#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.1 (C14N 1.1).
//!
//! Algorithm URI: `http://www.w3.org/2006/12/xml-c14n11`
//! With comments: `http://www.w3.org/2006/12/xml-c14n11#WithComments`
//!
//! C14N 1.1 changes two things relative to C14N 1.0:
//! - `xml:id` is output where it appears but never inherited.
//! - `xml:lang`, `xml:space` and other `xml:*` attributes float only from
//!   consecutively omitted ancestors, and their `xml:base` values are
//!   resolved against each other into one absolute value.

use crate::inclusive::{Inclusive, Version};

/// The attribute selector for Canonical XML 1.1.
pub fn selector() -> Inclusive {
    Inclusive::new(Version::V1_1)
}
