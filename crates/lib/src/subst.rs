//! `{keyword}` substitution in document strings.
//!
//! Before a document is installed, every string leaf inside its layering and
//! include fields is scanned for `{NAME}` placeholders and each known name is
//! replaced by its keyword value. Substitution is a single left-to-right
//! pass: replacement text is never rescanned, and unknown placeholders are
//! kept verbatim so documents can carry literal braces without escaping.

use std::collections::HashMap;

use crate::keys;
use crate::value::Value;

/// Replaces `{keyword}` placeholders throughout a value tree, in place.
///
/// Recurses through maps and lists; only string leaves are rewritten.
pub fn replace_keywords(value: &mut Value, keywords: &HashMap<String, String>) {
    match value {
        Value::String(s) => {
            if let Some(replaced) = substitute(s, keywords) {
                *s = replaced;
            }
        }
        Value::List(items) => {
            for item in items {
                replace_keywords(item, keywords);
            }
        }
        Value::Map(entries) => {
            for value in entries.values_mut() {
                replace_keywords(value, keywords);
            }
        }
        _ => {}
    }
}

/// Applies [`replace_keywords`] to the fields of a document that admit
/// substitution: `_merge_`, `_append_`, `_remove_`, and `_include_`. The
/// identity fields (`_id_`, `_parent_`, `_group_`) are left alone.
pub(crate) fn replace_document_keywords(doc: &mut Value, keywords: &HashMap<String, String>) {
    if keywords.is_empty() {
        return;
    }
    let Some(map) = doc.as_map_mut() else {
        return;
    };
    for key in [keys::MERGE, keys::APPEND, keys::REMOVE, keys::INCLUDE] {
        if let Some(value) = map.get_mut(key) {
            replace_keywords(value, keywords);
        }
    }
}

/// Substitutes placeholders in one string; `None` when nothing matched.
fn substitute(s: &str, keywords: &HashMap<String, String>) -> Option<String> {
    if !s.contains('{') {
        return None;
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut replaced = false;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            // Unclosed brace: the remainder is literal.
            out.push_str(tail);
            rest = "";
            break;
        };
        let name = &tail[1..end];
        match keywords.get(name) {
            Some(value) => {
                out.push_str(value);
                replaced = true;
            }
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    replaced.then_some(out)
}
