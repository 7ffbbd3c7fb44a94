#![forbid(unsafe_code)]

//! Entity escaping for C14N output.
//!
//! Canonical XML escapes:
//! - Text nodes: `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `\r` → `&#xD;`
//! - Attribute values: `&`, `<`, `"` plus `\t` → `&#x9;`, `\n` → `&#xA;`, `\r` → `&#xD;`
//! - Comments and PI data: `\r` → `&#xD;`

use crate::utf8::Utf8Writer;
use std::io::{self, Write};

fn text_entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

fn attr_entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '"' => Some("&quot;"),
        '\t' => Some("&#x9;"),
        '\n' => Some("&#xA;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

fn cr_entity(c: char) -> Option<&'static str> {
    (c == '\r').then_some("&#xD;")
}

fn write_escaped<W: Write>(
    w: &mut Utf8Writer<W>,
    s: &str,
    entity: fn(char) -> Option<&'static str>,
) -> io::Result<()> {
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(replacement) = entity(c) {
            w.write_str(&s[start..i])?;
            w.write_bytes(replacement.as_bytes())?;
            start = i + c.len_utf8();
        }
    }
    w.write_str(&s[start..])
}

/// Write text node content.
pub fn write_text<W: Write>(w: &mut Utf8Writer<W>, s: &str) -> io::Result<()> {
    write_escaped(w, s, text_entity)
}

/// Write ` name="value"`.
pub fn write_attr<W: Write>(w: &mut Utf8Writer<W>, name: &str, value: &str) -> io::Result<()> {
    w.write_bytes(b" ")?;
    w.write_name(name)?;
    w.write_bytes(b"=\"")?;
    write_escaped(w, value, attr_entity)?;
    w.write_bytes(b"\"")
}

/// Write `<!--data-->`.
pub fn write_comment<W: Write>(w: &mut Utf8Writer<W>, data: &str) -> io::Result<()> {
    w.write_bytes(b"<!--")?;
    write_escaped(w, data, cr_entity)?;
    w.write_bytes(b"-->")
}

/// Write `<?target data?>`, with the separating space only for non-empty data.
pub fn write_pi<W: Write>(w: &mut Utf8Writer<W>, target: &str, data: &str) -> io::Result<()> {
    w.write_bytes(b"<?")?;
    w.write_name(target)?;
    if !data.is_empty() {
        w.write_bytes(b" ")?;
        write_escaped(w, data, cr_entity)?;
    }
    w.write_bytes(b"?>")
}
