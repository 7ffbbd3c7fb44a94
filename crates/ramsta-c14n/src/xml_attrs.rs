#![forbid(unsafe_code)]

//! Tracking of `xml:*` attributes across omitted ancestors.
//!
//! When an element is output but its parent is not, the `xml:*` attributes
//! of the omitted ancestors still apply to it and must be written on it.
//! Frames are kept only for levels that declared such attributes or were
//! output.  Ancestors of the walk root are seeded at negative levels, the
//! nearest at -1, so walk levels never discard them.

use crate::render::{Attr, AttrSet};
use crate::uri;
use ramsta_core::ns;
use ramsta_xml::Attribute;
use tracing::debug;

/// How `xml:*` attributes reach an output element from omitted ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlAttrPolicy {
    /// Canonical XML 1.0: every ancestor's attributes are inherited, the
    /// nearest declaration of a name wins.
    Inherit,
    /// Canonical XML 1.1: only attributes of consecutively omitted
    /// ancestors float down, and their `xml:base` values are joined.
    Float,
}

#[derive(Debug)]
struct Frame<'a> {
    level: isize,
    rendered: bool,
    attrs: Vec<&'a Attribute>,
}

/// Per-level `xml:*` attributes of the open elements.
#[derive(Debug)]
pub struct XmlAttrStack<'a> {
    policy: XmlAttrPolicy,
    current_level: isize,
    last_level: isize,
    has_current: bool,
    levels: Vec<Frame<'a>>,
}

impl<'a> XmlAttrStack<'a> {
    pub fn new(policy: XmlAttrPolicy) -> Self {
        Self {
            policy,
            current_level: 0,
            last_level: isize::MIN,
            has_current: false,
            levels: Vec::new(),
        }
    }

    /// Enter an element at `level`, dropping frames of closed elements.
    pub fn push(&mut self, level: isize) {
        self.current_level = level;
        self.has_current = false;
        while self.last_level >= level {
            self.levels.pop();
            self.last_level = self.levels.last().map_or(isize::MIN, |f| f.level);
        }
    }

    fn open_frame(&mut self) {
        if !self.has_current {
            self.levels.push(Frame {
                level: self.current_level,
                rendered: false,
                attrs: Vec::new(),
            });
            self.last_level = self.current_level;
            self.has_current = true;
        }
    }

    /// Record an `xml:*` attribute of the current element.
    pub fn add(&mut self, attr: &'a Attribute) {
        self.open_frame();
        if let Some(frame) = self.levels.last_mut() {
            frame.attrs.push(attr);
        }
    }

    /// The current element is output: add the `xml:*` attributes it must
    /// carry to `out` and mark its level rendered.
    pub fn collect(&mut self, out: &mut AttrSet<'a>) {
        self.open_frame();
        let current = self.levels.len() - 1;
        let parent_rendered = match current.checked_sub(1).map(|i| &self.levels[i]) {
            None => true,
            Some(parent) => parent.rendered && parent.level + 1 == self.current_level,
        };

        if parent_rendered {
            for &attr in &self.levels[current].attrs {
                out.insert(Attr::from_attribute(attr));
            }
        } else {
            match self.policy {
                XmlAttrPolicy::Inherit => self.inherit(current, out),
                XmlAttrPolicy::Float => self.float(current, out),
            }
        }
        self.levels[current].rendered = true;
    }

    fn inherit(&self, current: usize, out: &mut AttrSet<'a>) {
        for frame in self.levels[..=current].iter().rev() {
            for &attr in &frame.attrs {
                out.insert(Attr::from_attribute(attr));
            }
        }
    }

    fn float(&self, current: usize, out: &mut AttrSet<'a>) {
        let mut bases: Vec<&'a Attribute> = Vec::new();
        for frame in self.levels[..=current].iter().rev() {
            if frame.rendered {
                break;
            }
            for &attr in &frame.attrs {
                if attr.name.local_name() == ns::attr::XML_BASE {
                    bases.push(attr);
                } else {
                    out.insert(Attr::from_attribute(attr));
                }
            }
        }

        let Some((&nearest, outer)) = bases.split_first() else {
            return;
        };
        let mut base = nearest.value.clone();
        for ancestor in outer {
            match uri::join(&ancestor.value, &base) {
                Ok(joined) => base = joined,
                Err(e) => debug!(base = %ancestor.value, relative = %base, error = %e, "keeping xml:base unresolved"),
            }
        }
        if !base.is_empty() {
            out.insert(Attr::with_value(nearest, base));
        }
    }
}
