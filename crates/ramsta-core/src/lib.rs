#![forbid(unsafe_code)]

//! Core types shared by the Ramsta crates: the error taxonomy, namespace
//! constants and algorithm URIs.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{C14nError, Error, Result};
