use std::num::NonZeroUsize;

use log::warn;

use crate::processor::ProcessorError;

/// Size of the record queue between the reader and the workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Immutable run configuration handed to [`GroupCounter`](crate::GroupCounter).
///
/// # Example
/// ```rust
/// # use group_counter::CountConfig;
/// let config = CountConfig::new("category,other#hobby")
///     .with_header(true)
///     .with_workers(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountConfig {
    /// Comma-separated `<name-or-index>[#<subFieldPath>]` descriptors.
    pub columns: String,
    /// First row is a header; required when columns are selected by name.
    pub has_header: bool,
    pub delimiter: u8,
    /// Requested pool size, clamped to available parallelism.
    pub workers: usize,
    pub queue_capacity: usize,
    /// Read buffer in KB; 0 keeps the reader default.
    pub read_buffer_kb: usize,
}

impl Default for CountConfig {
    fn default() -> Self {
        CountConfig {
            columns: String::new(),
            has_header: false,
            delimiter: b',',
            workers: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_buffer_kb: 0,
        }
    }
}

impl CountConfig {
    pub fn new(columns: &str) -> Self {
        CountConfig {
            columns: columns.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_read_buffer_kb(mut self, kb: usize) -> Self {
        self.read_buffer_kb = kb;
        self
    }

    /// Parses a delimiter given as text; it must be exactly one byte.
    pub fn parse_delimiter(text: &str) -> Result<u8, ProcessorError> {
        match text.as_bytes() {
            [b] => Ok(*b),
            _ => Err(ProcessorError::Config(format!(
                "delimiter must be a single byte, got `{text}`"
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.workers == 0 {
            return Err(ProcessorError::Config(
                "worker pool size must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ProcessorError::Config(
                "queue capacity must be positive".into(),
            ));
        }
        if matches!(self.delimiter, b'"' | b'\r' | b'\n') {
            return Err(ProcessorError::Config(format!(
                "delimiter {:?} is not allowed",
                self.delimiter as char
            )));
        }
        Ok(())
    }

    /// Requested pool size clamped to the host's parallelism.
    pub fn effective_workers(&self) -> usize {
        let max = max_workers();
        if self.workers > max {
            warn!("Worker pool size is limited to {max}");
            return max;
        }
        self.workers.max(1)
    }

    /// Reader buffer in bytes, if one was requested.
    pub fn read_buffer_bytes(&self) -> Option<usize> {
        (self.read_buffer_kb > 0).then(|| self.read_buffer_kb * 1024)
    }
}

/// Upper bound for the worker pool.
pub fn max_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
