//! Starlark literal formatting for generated build files.

use std::fmt::Write as _;

/// Quote `s` as a Starlark string literal.
pub fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a list of strings, one item per line at `indent` spaces.
///
/// The closing bracket sits at `indent - 4`, matching the attribute the
/// list is assigned to. Empty lists render as `[]`.
pub fn string_list<S: AsRef<str>>(items: &[S], indent: usize) -> String {
    if items.is_empty() {
        return "[]".into();
    }
    let pad = " ".repeat(indent);
    let close = " ".repeat(indent.saturating_sub(4));
    let mut out = String::from("[\n");
    for item in items {
        let _ = writeln!(out, "{pad}{},", string(item.as_ref()));
    }
    out.push_str(&close);
    out.push(']');
    out
}

/// Format ordered key/value string pairs as a dict literal.
pub fn string_dict<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)], indent: usize) -> String {
    if pairs.is_empty() {
        return "{}".into();
    }
    let pad = " ".repeat(indent);
    let close = " ".repeat(indent.saturating_sub(4));
    let mut out = String::from("{\n");
    for (k, v) in pairs {
        let _ = writeln!(out, "{pad}{}: {},", string(k.as_ref()), string(v.as_ref()));
    }
    out.push_str(&close);
    out.push('}');
    out
}
