use crossbeam_channel::bounded;
use log::info;
use std::{fs::File, io::Read, path::Path, time::Instant};

use crate::{
    config::CountConfig,
    helpers::quote_guard::QuoteGuard,
    processor::{
        ColumnResolutionError, FinalCount, GroupingSpec, ProcessorError, Record,
        StreamReadError,
        aggregator::Aggregator,
        cancel::CancelToken,
        producer::{csv_records, decode_lossy, produce},
        selector::ColumnSelector,
        worker::{Worker, WorkerReport},
    },
};

/// Counts records of a delimited stream grouped by one or more columns.
///
/// One producer (the calling thread) feeds a bounded queue, a dedicated pool
/// of workers each fills its own partial table, and the tables are merged
/// once every worker is done.
///
/// # Examples
///
/// ```rust
/// # use group_counter::{CountConfig, GroupCounter};
/// let csv = "name,data\nx,\"{\"\"k\"\":1}\"\ny,\"{\"\"k\"\":2}\"\nx,\"{\"\"k\"\":1}\"\n";
/// let counter = GroupCounter::new(CountConfig::new("data#k").with_header(true));
/// let counts = counter.count_reader(csv.as_bytes()).unwrap();
/// assert_eq!(counts["k=1"], 2);
/// assert_eq!(counts["k=2"], 1);
/// ```
#[derive(Debug, Clone)]
pub struct GroupCounter {
    config: CountConfig,
    cancel: CancelToken,
}

impl GroupCounter {
    pub fn new(config: CountConfig) -> Self {
        GroupCounter {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `token` to cancel runs from outside. Each run derives its own
    /// child token, so a failed run does not poison the next one.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &CountConfig {
        &self.config
    }

    /// Opens `path` and counts its rows.
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - the file cannot be opened
    /// - the header is missing or a column cannot be resolved
    /// - a row is malformed or shorter than a grouping column requires
    pub fn count_path(&self, path: &Path) -> Result<FinalCount, ProcessorError> {
        let file = File::open(path)?;
        self.count_reader(file)
    }

    /// Counts rows of a raw delimited byte stream.
    ///
    /// With `has_header` the first row is consumed as the header and used to
    /// resolve column names. Every row must have as many fields as the first,
    /// and quoting must be well formed.
    pub fn count_reader<R: Read>(&self, reader: R) -> Result<FinalCount, ProcessorError> {
        self.config.validate()?;

        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.config.delimiter)
            .has_headers(false)
            .flexible(false);
        if let Some(bytes) = self.config.read_buffer_bytes() {
            if self.config.read_buffer_kb > 1024 {
                info!("Using buffer size: {} MB", self.config.read_buffer_kb / 1024);
            } else {
                info!("Using buffer size: {} KB", self.config.read_buffer_kb);
            }
            builder.buffer_capacity(bytes);
        }
        let mut csv_reader = builder.from_reader(QuoteGuard::new(reader, self.config.delimiter));

        let header = if self.config.has_header {
            let mut header = csv::ByteRecord::new();
            let found = csv_reader
                .read_byte_record(&mut header)
                .map_err(StreamReadError::from)?;
            if !found {
                return Err(StreamReadError::MissingHeader.into());
            }
            Some(decode_lossy(header))
        } else {
            None
        };

        let selector = ColumnSelector::parse(&self.config.columns);
        let specs = selector.resolve(header.as_ref())?;
        for (descriptor, spec) in selector.descriptors().iter().zip(&specs) {
            info!(
                "Column {} found at index {}",
                descriptor.column,
                spec.column_index()
            );
        }

        self.run(csv_records(csv_reader), &specs)
    }

    /// Runs the worker pool over an already-framed record source.
    ///
    /// `records` is consumed on the calling thread; only the workers run on
    /// the pool. No partial result is returned on failure.
    pub fn run<I>(
        &self,
        records: I,
        specs: &[GroupingSpec],
    ) -> Result<FinalCount, ProcessorError>
    where
        I: IntoIterator<Item = Result<Record, StreamReadError>>,
    {
        self.config.validate()?;
        if specs.is_empty() {
            return Err(ColumnResolutionError::NoColumnsSpecified.into());
        }

        let workers = self.config.effective_workers();
        let cancel = self.cancel.child();
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("group-worker-{i}"))
            .build()?;

        let (queue_tx, queue_rx) = bounded::<Record>(self.config.queue_capacity);
        let (results_tx, results_rx) = bounded::<WorkerReport>(workers);

        let produced = pool.in_place_scope(|scope| {
            for id in 0..workers {
                let worker = Worker::new(id, specs, cancel.clone());
                let queue = queue_rx.clone();
                let results = results_tx.clone();
                scope.spawn(move |_| worker.run(queue, results));
            }
            // only the workers may hold these, so closing is observable
            drop(queue_rx);
            drop(results_tx);

            produce(records, queue_tx, &cancel)
        });
        info!("All workers finished");

        let mut aggregator = Aggregator::new(workers);
        aggregator.collect(&results_rx);
        let rows = *produced.as_ref().unwrap_or(&0);
        let counts = aggregator.finish(produced)?;

        info!(
            "Counted {} rows into {} groups with {} workers in {:?}",
            rows,
            counts.len(),
            workers,
            started.elapsed()
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::RowValidationError;

    fn records(rows: &[&[&str]]) -> Vec<Result<Record, StreamReadError>> {
        rows.iter().map(|r| Ok(Record::from(r.to_vec()))).collect()
    }

    fn repeated(row: &[&str], n: usize) -> Vec<Result<Record, StreamReadError>> {
        (0..n).map(|_| Ok(Record::from(row.to_vec()))).collect()
    }

    #[test]
    fn test_run_counts_single_column() {
        let counter = GroupCounter::new(CountConfig::new("0").with_workers(2));
        let counts = counter
            .run(
                records(&[&["A", "1"], &["B", "2"], &["A", "3"]]),
                &[GroupingSpec::column(0)],
            )
            .unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts["A"], 2);
        assert_eq!(counts["B"], 1);
    }

    #[test]
    fn test_run_empty_input() {
        let counter = GroupCounter::new(CountConfig::new("0"));
        let counts = counter
            .run(Vec::<Result<Record, StreamReadError>>::new(), &[GroupingSpec::column(0)])
            .unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn test_run_without_specs_fails() {
        let counter = GroupCounter::new(CountConfig::new(""));
        let err = counter.run(records(&[&["A"]]), &[]).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Resolution(ColumnResolutionError::NoColumnsSpecified)
        ));
    }

    #[test]
    fn test_short_row_aborts_whole_run() {
        let counter = GroupCounter::new(CountConfig::new("1").with_workers(4));
        let mut rows = repeated(&["A", "1"], 50);
        rows.push(Ok(Record::from(vec!["B"])));
        rows.extend(repeated(&["C", "1"], 50));

        let err = counter.run(rows, &[GroupingSpec::column(1)]).unwrap_err();
        assert!(matches!(err, ProcessorError::RowValidation(_)));
    }

    #[test]
    fn test_bad_first_row_unblocks_producer_on_full_queue() {
        let counter = GroupCounter::new(
            CountConfig::new("1")
                .with_workers(4)
                .with_queue_capacity(1),
        );
        let mut rows = records(&[&["B"]]);
        rows.extend(repeated(&["A", "1"], 5000));

        let err = counter.run(rows, &[GroupingSpec::column(1)]).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::RowValidation(RowValidationError::IndexOutOfRange {
                index: 1,
                len: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_stream_error_aborts_whole_run() {
        let counter = GroupCounter::new(CountConfig::new("0").with_workers(2));
        let mut rows = repeated(&["A"], 10);
        rows.push(Err(StreamReadError::StreamCorrupt {
            line: Some(11),
            reason: "bad framing".into(),
        }));

        let err = counter.run(rows, &[GroupingSpec::column(0)]).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::StreamRead(StreamReadError::StreamCorrupt { .. })
        ));
    }

    #[test]
    fn test_external_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let counter = GroupCounter::new(CountConfig::new("0")).with_cancel_token(token);

        let err = counter
            .run(records(&[&["A"], &["B"]]), &[GroupingSpec::column(0)])
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_failed_run_does_not_poison_next_run() {
        let counter = GroupCounter::new(CountConfig::new("1").with_workers(2));
        let specs = [GroupingSpec::column(1)];

        assert!(counter.run(records(&[&["A"]]), &specs).is_err());

        let counts = counter.run(records(&[&["A", "x"]]), &specs).unwrap();
        assert_eq!(counts["x"], 1);
    }

    #[test]
    fn test_count_reader_missing_header() {
        let counter = GroupCounter::new(CountConfig::new("name").with_header(true));
        let err = counter.count_reader("".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::StreamRead(StreamReadError::MissingHeader)
        ));
    }

    #[test]
    fn test_count_reader_rejects_bad_quoting_in_header() {
        let counter = GroupCounter::new(CountConfig::new("name").with_header(true));
        let err = counter
            .count_reader("na\"me,data\nx,1\n".as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::StreamRead(StreamReadError::StreamCorrupt { line: Some(1), .. })
        ));
    }

    #[test]
    fn test_count_reader_with_delimiter() {
        let counter = GroupCounter::new(
            CountConfig::new("1,0")
                .with_delimiter(b';')
                .with_workers(2),
        );
        let counts = counter.count_reader("a;x\nb;x\na;y\na;x\n".as_bytes()).unwrap();

        assert_eq!(counts["x,a"], 2);
        assert_eq!(counts["x,b"], 1);
        assert_eq!(counts["y,a"], 1);
    }
}
