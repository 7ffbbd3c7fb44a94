#![forbid(unsafe_code)]

//! Relative URI resolution for `xml:base` (RFC 3986, section 5.2).

use ramsta_core::Error;

/// The components of a URI reference that survive resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UriRef<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
}

fn invalid(uri: &str, reason: &str) -> Error {
    Error::InvalidUri(format!("{uri}: {reason}"))
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn check_chars(uri: &str) -> Result<(), Error> {
    let bytes = uri.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'%' => {
                let valid = bytes
                    .get(i + 1..i + 3)
                    .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
                if !valid {
                    return Err(invalid(uri, "malformed escape sequence"));
                }
            }
            b'<' | b'>' | b'"' | b'{' | b'}' | b'|' | b'\\' | b'^' | b'`' => {
                return Err(invalid(uri, "illegal character"));
            }
            _ if b.is_ascii_whitespace() || b.is_ascii_control() => {
                return Err(invalid(uri, "illegal character"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Split a URI reference into scheme, authority, path and query.  The
/// fragment is discarded.
fn parse(uri: &str) -> Result<UriRef<'_>, Error> {
    check_chars(uri)?;
    let rest = match uri.find('#') {
        Some(i) => &uri[..i],
        None => uri,
    };

    let mut scheme = None;
    let mut rest = rest;
    if let Some(colon) = rest.find(':') {
        let before = &rest[..colon];
        if !before.contains(['/', '?']) {
            if !is_scheme(before) {
                return Err(invalid(uri, "illegal scheme name"));
            }
            scheme = Some(before);
            rest = &rest[colon + 1..];
        }
    }

    let mut authority = None;
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?']).unwrap_or(after.len());
        authority = Some(&after[..end]);
        rest = &after[end..];
    }

    let (path, query) = match rest.find('?') {
        Some(q) => (&rest[..q], Some(&rest[q + 1..])),
        None => (rest, None),
    };

    if scheme.is_some() && authority.is_none() && path.is_empty() && query.is_none() {
        return Err(invalid(uri, "expected scheme-specific part"));
    }

    Ok(UriRef {
        scheme,
        authority,
        path,
        query,
    })
}

fn compose(scheme: Option<&str>, authority: Option<&str>, path: &str, query: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push(':');
    }
    if let Some(authority) = authority {
        out.push_str("//");
        out.push_str(authority);
    }
    out.push_str(path);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Resolve `relative` against `base`.
///
/// A relative reference with its own scheme is taken as is, after dot
/// segment removal.  Fragments are not carried into the result.
pub fn join(base: &str, relative: &str) -> Result<String, Error> {
    let base = if base.ends_with("..") {
        format!("{base}/")
    } else {
        base.to_owned()
    };
    let b = parse(&base)?;
    let r = parse(relative)?;

    if r.scheme.is_some() {
        let path = remove_dot_segments(r.path);
        return Ok(compose(r.scheme, r.authority, &path, r.query));
    }

    if r.authority.is_some() {
        let path = remove_dot_segments(r.path);
        return Ok(compose(b.scheme, r.authority, &path, r.query));
    }

    let (path, query) = if r.path.is_empty() {
        (b.path.to_owned(), r.query.or(b.query))
    } else if r.path.starts_with('/') {
        (remove_dot_segments(r.path), r.query)
    } else {
        let merged = if b.authority.is_some() && b.path.is_empty() {
            format!("/{}", r.path)
        } else {
            match b.path.rfind('/') {
                Some(last) => format!("{}{}", &b.path[..=last], r.path),
                None => r.path.to_owned(),
            }
        };
        (remove_dot_segments(&merged), r.query)
    };
    Ok(compose(b.scheme, b.authority, &path, query))
}

/// Remove the last segment and its preceding "/" from `output` when a
/// "/../" or "/.." prefix is consumed.
fn pop_segment(output: &mut String, input: &mut String) {
    if output.is_empty() {
        output.push('/');
    } else if output.ends_with("../") {
        output.push_str("..");
    } else if output.ends_with("..") {
        output.push_str("/..");
    } else {
        match output.rfind('/') {
            Some(index) => output.truncate(index),
            None => {
                output.clear();
                if input.starts_with('/') {
                    input.remove(0);
                }
            }
        }
    }
}

/// Remove `.` and `..` segments from a path.
///
/// Runs of `/` are first collapsed to one.  A leading `..` that cannot
/// climb any further is kept, and a result ending in `..` gets a trailing
/// `/`.
pub fn remove_dot_segments(path: &str) -> String {
    let mut input = path.to_owned();
    while input.contains("//") {
        input = input.replace("//", "/");
    }

    let mut output = String::new();
    if input.starts_with('/') {
        output.push('/');
        input.remove(0);
    }

    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("./") {
            input = rest.to_owned();
        } else if let Some(rest) = input.strip_prefix("../") {
            input = rest.to_owned();
            if output != "/" {
                output.push_str("../");
            }
        } else if input.starts_with("/./") {
            input.replace_range(..2, "");
        } else if input == "/." {
            input = "/".to_owned();
        } else if input.starts_with("/../") {
            input.replace_range(..3, "");
            pop_segment(&mut output, &mut input);
        } else if input == "/.." {
            input = "/".to_owned();
            pop_segment(&mut output, &mut input);
        } else if input == "." {
            input.clear();
        } else if input == ".." {
            if output != "/" {
                output.push_str("..");
            }
            input.clear();
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..]
                .find('/')
                .map_or(input.len(), |i| i + start);
            output.push_str(&input[..end]);
            input.replace_range(..end, "");
        }
    }

    if output.ends_with("..") {
        output.push('/');
    }
    output
}
