use std::fmt;

use serde_json::Value;

use crate::helpers::json_path::{lookup, split_path, write_value};

/// Turns the text of one cell into a grouping sub-key.
///
/// Implementations must not fail: a cell they cannot interpret still yields a
/// sub-key (typically the empty-value bucket).
pub trait SubKeyExtractor: Send + Sync + fmt::Debug {
    /// Path or name identifying what is extracted, used as the sub-key prefix.
    fn path(&self) -> &str;

    /// Appends the sub-key for `cell` to `out`.
    fn write_sub_key(&self, cell: &str, out: &mut String);
}

/// Extracts a field from a JSON document stored in a cell.
///
/// Sub-key is `<path>=<value>`. Unparseable cells and paths that do not
/// resolve give `<path>=`.
///
/// # Example
/// ```rust
/// # use group_counter::processor::extractor::{JsonPathExtractor, SubKeyExtractor};
/// let extractor = JsonPathExtractor::new("a.b");
/// let mut key = String::new();
/// extractor.write_sub_key(r#"{"a":{"b":5}}"#, &mut key);
/// assert_eq!(key, "a.b=5");
/// ```
#[derive(Debug, Clone)]
pub struct JsonPathExtractor {
    path: String,
    segments: Vec<String>,
}

impl JsonPathExtractor {
    pub fn new(path: &str) -> Self {
        JsonPathExtractor {
            path: path.to_string(),
            segments: split_path(path),
        }
    }
}

impl SubKeyExtractor for JsonPathExtractor {
    fn path(&self) -> &str {
        &self.path
    }

    fn write_sub_key(&self, cell: &str, out: &mut String) {
        out.push_str(&self.path);
        out.push('=');

        let Ok(doc) = serde_json::from_str::<Value>(cell) else {
            return;
        };
        if let Some(value) = lookup(&doc, &self.segments) {
            write_value(&value, out);
        }
    }
}
