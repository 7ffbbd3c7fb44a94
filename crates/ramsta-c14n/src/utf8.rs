#![forbid(unsafe_code)]

//! UTF-8 output for canonical XML.
//!
//! Characters are encoded by hand straight into the sink.  Element and
//! attribute names repeat constantly in a document, so their encoded bytes
//! are cached for the duration of one canonicalization.

use std::collections::HashMap;
use std::io::{self, Write};

/// Replacement byte for a code unit that cannot be encoded on its own.
const REPLACEMENT: u8 = b'?';

/// Encode one character into `buf`, returning the used prefix.
///
/// With `legacy_surrogates`, a supplementary-plane character is encoded as
/// its two UTF-16 code units would be, one `?` per unit.
fn encode_char(c: char, legacy_surrogates: bool, buf: &mut [u8; 4]) -> &[u8] {
    let code = c as u32;
    if code < 0x80 {
        buf[0] = code as u8;
        &buf[..1]
    } else if code < 0x800 {
        buf[0] = 0xC0 | (code >> 6) as u8;
        buf[1] = 0x80 | (code & 0x3F) as u8;
        &buf[..2]
    } else if code < 0x1_0000 {
        buf[0] = 0xE0 | (code >> 12) as u8;
        buf[1] = 0x80 | ((code >> 6) & 0x3F) as u8;
        buf[2] = 0x80 | (code & 0x3F) as u8;
        &buf[..3]
    } else if legacy_surrogates {
        buf[0] = REPLACEMENT;
        buf[1] = REPLACEMENT;
        &buf[..2]
    } else {
        buf[0] = 0xF0 | (code >> 18) as u8;
        buf[1] = 0x80 | ((code >> 12) & 0x3F) as u8;
        buf[2] = 0x80 | ((code >> 6) & 0x3F) as u8;
        buf[3] = 0x80 | (code & 0x3F) as u8;
        &buf[..4]
    }
}

fn encode_str_into(s: &str, legacy_surrogates: bool, out: &mut Vec<u8>) {
    let mut buf = [0u8; 4];
    for c in s.chars() {
        out.extend_from_slice(encode_char(c, legacy_surrogates, &mut buf));
    }
}

/// Encode UTF-16 code units one at a time.
///
/// Units are never paired: every surrogate unit becomes `?`.
pub fn encode_utf16(units: &[u16], out: &mut Vec<u8>) {
    for &unit in units {
        let code = u32::from(unit);
        if (0xD800..=0xDFFF).contains(&code) {
            out.push(REPLACEMENT);
            continue;
        }
        let mut buf = [0u8; 4];
        match char::from_u32(code) {
            Some(c) => out.extend_from_slice(encode_char(c, false, &mut buf)),
            None => out.push(REPLACEMENT),
        }
    }
}

/// A byte sink that encodes text as UTF-8.
pub struct Utf8Writer<W: Write> {
    sink: W,
    names: HashMap<String, Vec<u8>>,
    legacy_surrogates: bool,
}

impl<W: Write> Utf8Writer<W> {
    pub fn new(sink: W, legacy_surrogates: bool) -> Self {
        Self {
            sink,
            names: HashMap::new(),
            legacy_surrogates,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes)
    }

    pub fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        let bytes = encode_char(c, self.legacy_surrogates, &mut buf);
        self.sink.write_all(bytes)
    }

    /// Encode `s`, writing runs of ASCII directly.
    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in s.char_indices() {
            if c.is_ascii() {
                continue;
            }
            self.sink.write_all(&s.as_bytes()[start..i])?;
            self.write_char(c)?;
            start = i + c.len_utf8();
        }
        self.sink.write_all(&s.as_bytes()[start..])
    }

    /// Write an element or attribute name through the name cache.
    pub fn write_name(&mut self, name: &str) -> io::Result<()> {
        if !self.names.contains_key(name) {
            let mut encoded = Vec::with_capacity(name.len());
            encode_str_into(name, self.legacy_surrogates, &mut encoded);
            self.names.insert(name.to_owned(), encoded);
        }
        match self.names.get(name) {
            Some(encoded) => self.sink.write_all(encoded),
            None => Ok(()),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
