#![forbid(unsafe_code)]

//! Namespace bindings in scope during a canonicalization walk.
//!
//! Each prefix maps to at most one active binding.  A binding remembers
//! whether it has been rendered on the current output path and which URI
//! the prefix was last rendered with, so a redeclaration that changes
//! nothing is never emitted twice.
//!
//! Levels are scoped with an undo log: a mutation made after a
//! [`NsSymbolTable::push`] records the previous binding of its prefix, and
//! [`NsSymbolTable::pop`] replays those records in reverse.

use crate::render::NsDecl;
use ramsta_xml::NodeId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Binding<'a> {
    uri: &'a str,
    source: Option<NodeId>,
    rendered: bool,
    last_rendered: Option<&'a str>,
}

/// Stack-scoped prefix to URI bindings with render state.
///
/// The default namespace uses the empty prefix.
#[derive(Debug)]
pub struct NsSymbolTable<'a> {
    bindings: HashMap<&'a str, Binding<'a>>,
    undo: Vec<(&'a str, Option<Binding<'a>>)>,
    marks: Vec<usize>,
}

impl Default for NsSymbolTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> NsSymbolTable<'a> {
    /// A table where the default namespace is bound to "" and rendered.
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(
            "",
            Binding {
                uri: "",
                source: None,
                rendered: true,
                last_rendered: Some(""),
            },
        );
        Self {
            bindings,
            undo: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Enter a tree level.
    pub fn push(&mut self) {
        self.marks.push(self.undo.len());
    }

    /// Leave a tree level, restoring the bindings seen before its push.
    pub fn pop(&mut self) {
        let Some(mark) = self.marks.pop() else {
            return;
        };
        while self.undo.len() > mark {
            let Some((prefix, previous)) = self.undo.pop() else {
                break;
            };
            match previous {
                Some(binding) => self.bindings.insert(prefix, binding),
                None => self.bindings.remove(prefix),
            };
        }
    }

    /// The number of open levels.
    pub fn level(&self) -> usize {
        self.marks.len()
    }

    fn set(&mut self, prefix: &'a str, binding: Option<Binding<'a>>) {
        if !self.marks.is_empty() {
            self.undo.push((prefix, self.bindings.get(prefix).copied()));
        }
        match binding {
            Some(binding) => self.bindings.insert(prefix, binding),
            None => self.bindings.remove(prefix),
        };
    }

    fn mark_rendered(&mut self, prefix: &'a str, mut binding: Binding<'a>) -> NsDecl<'a> {
        binding.rendered = true;
        binding.last_rendered = Some(binding.uri);
        self.set(prefix, Some(binding));
        NsDecl {
            prefix,
            uri: binding.uri,
            source: binding.source,
        }
    }

    /// Render the binding of `prefix` if it has not been rendered yet.
    pub fn get_mapping(&mut self, prefix: &str) -> Option<NsDecl<'a>> {
        let (&key, &binding) = self.bindings.get_key_value(prefix)?;
        if binding.rendered {
            return None;
        }
        Some(self.mark_rendered(key, binding))
    }

    /// The binding of `prefix` if it has not been rendered, without
    /// rendering it.
    pub fn get_mapping_without_render(&self, prefix: &str) -> Option<NsDecl<'a>> {
        let (&key, binding) = self.bindings.get_key_value(prefix)?;
        if binding.rendered {
            return None;
        }
        Some(NsDecl {
            prefix: key,
            uri: binding.uri,
            source: binding.source,
        })
    }

    /// Render every binding not yet rendered on this path.
    pub fn get_unrendered_nodes(&mut self, out: &mut Vec<NsDecl<'a>>) {
        let mut pending: Vec<(&'a str, Binding<'a>)> = self
            .bindings
            .iter()
            .filter(|(_, b)| !b.rendered)
            .map(|(&prefix, &b)| (prefix, b))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(b.0));
        for (prefix, binding) in pending {
            out.push(self.mark_rendered(prefix, binding));
        }
    }

    /// Bind `prefix` to `uri` without rendering it.
    ///
    /// Returns false if the same binding is already active.  The new
    /// binding counts as rendered when the prefix was last rendered with
    /// the same URI.
    pub fn add_mapping(&mut self, prefix: &'a str, uri: &'a str, source: Option<NodeId>) -> bool {
        let previous = self.bindings.get(prefix).copied();
        if previous.is_some_and(|p| p.uri == uri) {
            return false;
        }
        let last_rendered = previous.and_then(|p| p.last_rendered);
        self.set(
            prefix,
            Some(Binding {
                uri,
                source,
                rendered: last_rendered == Some(uri),
                last_rendered,
            }),
        );
        true
    }

    /// Bind `prefix` to `uri` and render it.
    ///
    /// Returns the declaration to emit, or `None` when the output already
    /// carries this binding from an ancestor.
    pub fn add_mapping_and_render(
        &mut self,
        prefix: &'a str,
        uri: &'a str,
        source: Option<NodeId>,
    ) -> Option<NsDecl<'a>> {
        let previous = self.bindings.get(prefix).copied();
        if let Some(previous) = previous {
            if previous.uri == uri {
                if previous.rendered {
                    return None;
                }
                return Some(self.mark_rendered(prefix, previous));
            }
        }
        let already = previous.and_then(|p| p.last_rendered) == Some(uri);
        let decl = self.mark_rendered(
            prefix,
            Binding {
                uri,
                source,
                rendered: true,
                last_rendered: Some(uri),
            },
        );
        (!already).then_some(decl)
    }

    pub fn remove_mapping(&mut self, prefix: &'a str) {
        if self.bindings.contains_key(prefix) {
            self.set(prefix, None);
        }
    }

    pub fn remove_mapping_if_not_rendered(&mut self, prefix: &'a str) {
        if self.bindings.get(prefix).is_some_and(|b| !b.rendered) {
            self.set(prefix, None);
        }
    }
}
