use std::borrow::Cow;

use serde_json::Value;

/// Splits a dotted path into segments. `\.` keeps a literal dot inside a
/// segment and `\\` a literal backslash.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
}

/// Walks `value` along `segments`.
///
/// Objects are indexed by key, arrays by numeric segment. `#` on an array is
/// its length when it is the last segment, otherwise the remaining path is
/// mapped over every element (elements where it does not resolve are skipped).
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, segments: &[S]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(Cow::Borrowed(value));
    };
    let head = head.as_ref();

    match value {
        Value::Object(map) => map.get(head).and_then(|child| lookup(child, rest)),
        Value::Array(items) if head == "#" => {
            if rest.is_empty() {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            let mapped = items
                .iter()
                .filter_map(|item| lookup(item, rest).map(Cow::into_owned))
                .collect();
            Some(Cow::Owned(Value::Array(mapped)))
        }
        Value::Array(items) => head
            .parse::<usize>()
            .ok()
            .and_then(|idx| items.get(idx))
            .and_then(|child| lookup(child, rest)),
        _ => None,
    }
}

/// Text form of a resolved value as it appears in a sub-key.
///
/// Numbers keep the digits they were written with and objects keep their key
/// order, so distinct source values never share a sub-key.
pub fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // compact JSON for objects and arrays
        other => out.push_str(&other.to_string()),
    }
}
