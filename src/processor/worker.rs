use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::processor::{
    GroupingSpec, KEY_DELIMITER, PartialCount, ProcessorError, Record, RowValidationError,
    cancel::CancelToken,
};

/// What a worker hands to the aggregator: its table or the reason it stopped.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub outcome: Result<PartialCount, ProcessorError>,
}

/// Checks that every grouping column exists in `record`.
pub fn validate_record(
    record: &Record,
    specs: &[GroupingSpec],
) -> Result<(), RowValidationError> {
    let len = record.len();
    match specs.iter().find(|spec| spec.column_index() >= len) {
        Some(spec) => Err(RowValidationError::IndexOutOfRange {
            index: spec.column_index(),
            len,
            line: record.position().map(|pos| pos.line()),
        }),
        None => Ok(()),
    }
}

/// Builds the composite key of `record` into `key`, replacing its contents.
///
/// The record must already have passed [`validate_record`].
pub fn write_composite_key(record: &Record, specs: &[GroupingSpec], key: &mut String) {
    key.clear();
    for (i, spec) in specs.iter().enumerate() {
        if i > 0 {
            key.push(KEY_DELIMITER);
        }
        spec.write_sub_key(&record[spec.column_index()], key);
    }
}

/// Counts `records` into `partial`.
///
/// Shared by pool workers and callers that want a single-threaded tally.
pub fn tally<'r, I>(
    records: I,
    specs: &[GroupingSpec],
    partial: &mut PartialCount,
) -> Result<u64, RowValidationError>
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut key = String::new();
    let mut seen = 0u64;
    for record in records {
        count_record(record, specs, partial, &mut key)?;
        seen += 1;
    }
    Ok(seen)
}

fn count_record(
    record: &Record,
    specs: &[GroupingSpec],
    partial: &mut PartialCount,
    key: &mut String,
) -> Result<(), RowValidationError> {
    validate_record(record, specs)?;
    write_composite_key(record, specs, key);

    // avoid allocating a fresh key for buckets we already have
    match partial.get_mut(key.as_str()) {
        Some(count) => *count += 1,
        None => {
            partial.insert(key.clone(), 1);
        }
    }
    Ok(())
}

/// A pool worker. Owns its partial table for its whole lifetime.
pub struct Worker<'a> {
    id: usize,
    specs: &'a [GroupingSpec],
    cancel: CancelToken,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, specs: &'a [GroupingSpec], cancel: CancelToken) -> Self {
        Worker { id, specs, cancel }
    }

    /// Drains `queue` and reports exactly once on `results`.
    pub fn run(self, queue: Receiver<Record>, results: Sender<WorkerReport>) {
        debug!("Worker {} started", self.id);
        let outcome = self.consume(&queue);
        // unblock the producer if we are leaving early
        drop(queue);

        match &outcome {
            Ok(partial) => debug!("Worker {} finished with {} groups", self.id, partial.len()),
            Err(e) => debug!("Worker {} stopped: {}", self.id, e),
        }

        // capacity is one slot per worker, so this never blocks
        if let Err(e) = results.send(WorkerReport {
            worker_id: self.id,
            outcome,
        }) {
            debug!("Worker {} report dropped: {}", self.id, e);
        }
    }

    fn consume(&self, queue: &Receiver<Record>) -> Result<PartialCount, ProcessorError> {
        let mut partial = PartialCount::new();
        let mut key = String::new();
        let mut seen = 0u64;

        for record in queue.iter() {
            if self.cancel.is_cancelled() {
                return Err(ProcessorError::Cancelled);
            }
            if let Err(e) = count_record(&record, self.specs, &mut partial, &mut key) {
                self.cancel.cancel();
                return Err(e.into());
            }
            seen += 1;
        }

        // closed queue can also mean the producer bailed out
        if self.cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        debug!("Worker {} consumed {} records", self.id, seen);
        Ok(partial)
    }
}
