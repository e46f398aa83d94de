use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::helpers::quote_guard::quote_error;
use crate::processor::extractor::{JsonPathExtractor, SubKeyExtractor};

pub mod aggregator;
pub mod cancel;
pub mod extractor;
pub mod group_counter;
pub mod producer;
pub mod selector;
pub mod worker;

/// Separator placed between the sub-keys of a composite key.
///
/// Not escaped inside sub-key values, so `("a,b", "c")` and `("a", "b,c")`
/// land in the same bucket.
pub const KEY_DELIMITER: char = ',';

/// One input row.
pub type Record = csv::StringRecord;

/// Worker-local composite key -> count table.
pub type PartialCount = HashMap<String, u64>;

/// Merged composite key -> count table. Iteration order is unspecified.
pub type FinalCount = HashMap<String, u64>;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Resolution(#[from] ColumnResolutionError),

    #[error(transparent)]
    RowValidation(#[from] RowValidationError),

    #[error(transparent)]
    StreamRead(#[from] StreamReadError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Processing cancelled")]
    Cancelled,
}

impl ProcessorError {
    /// `true` for the echo a participant reports after observing someone
    /// else's failure (or an external cancel).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProcessorError::Cancelled)
    }
}

/// Raised while turning column descriptors into [`GroupingSpec`]s, before any
/// row is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnResolutionError {
    #[error("Column `{0}` not found in header")]
    UnresolvedColumn(String),

    #[error("Invalid column index: `{0}`")]
    InvalidColumnIndex(String),

    #[error("No grouping columns specified")]
    NoColumnsSpecified,
}

/// Raised by a worker for a record that cannot be keyed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowValidationError {
    #[error("Column index {index} out of range for record{} with {len} fields", line_suffix(.line))]
    IndexOutOfRange {
        index: usize,
        len: usize,
        line: Option<u64>,
    },
}

fn line_suffix(line: &Option<u64>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}

/// Raised while reading rows from the input stream.
#[derive(Debug, Error)]
pub enum StreamReadError {
    #[error("Stream corrupt{}: {reason}", line_suffix(.line))]
    StreamCorrupt { line: Option<u64>, reason: String },

    #[error("Header row expected but input is empty")]
    MissingHeader,
}

impl From<csv::Error> for StreamReadError {
    fn from(err: csv::Error) -> Self {
        let quoting = match err.kind() {
            csv::ErrorKind::Io(io_err) => quote_error(io_err),
            _ => None,
        };
        if let Some(quoting) = quoting {
            return StreamReadError::StreamCorrupt {
                line: Some(quoting.line()),
                reason: quoting.to_string(),
            };
        }

        let line = err.position().map(|pos| pos.line());
        StreamReadError::StreamCorrupt {
            line,
            reason: err.to_string(),
        }
    }
}

/// One grouping dimension: a column, optionally drilled into by an extractor.
#[derive(Clone)]
pub struct GroupingSpec {
    column_index: usize,
    extractor: Option<Arc<dyn SubKeyExtractor>>,
}

impl GroupingSpec {
    /// Group on the raw cell text of `column_index`.
    pub fn column(column_index: usize) -> Self {
        GroupingSpec {
            column_index,
            extractor: None,
        }
    }

    /// Group on a JSON sub-field of the cell. An empty path falls back to the
    /// raw cell.
    pub fn json_path(column_index: usize, path: &str) -> Self {
        if path.is_empty() {
            return Self::column(column_index);
        }
        Self::with_extractor(column_index, Arc::new(JsonPathExtractor::new(path)))
    }

    pub fn with_extractor(column_index: usize, extractor: Arc<dyn SubKeyExtractor>) -> Self {
        GroupingSpec {
            column_index,
            extractor: Some(extractor),
        }
    }

    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn sub_field_path(&self) -> Option<&str> {
        self.extractor.as_deref().map(|e| e.path())
    }

    /// Appends this dimension's sub-key for `cell` to `out`.
    pub fn write_sub_key(&self, cell: &str, out: &mut String) {
        match &self.extractor {
            Some(extractor) => extractor.write_sub_key(cell, out),
            None => out.push_str(cell),
        }
    }
}

impl fmt::Debug for GroupingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupingSpec")
            .field("column_index", &self.column_index)
            .field("sub_field_path", &self.sub_field_path())
            .finish()
    }
}

impl PartialEq for GroupingSpec {
    fn eq(&self, other: &Self) -> bool {
        self.column_index == other.column_index && self.sub_field_path() == other.sub_field_path()
    }
}

impl Eq for GroupingSpec {}
