use crossbeam_channel::Sender;

use crate::processor::{ProcessorError, Record, StreamReadError, cancel::CancelToken};

/// Pushes records into the bounded work queue until the source ends.
///
/// `send` blocks while the queue is full. The sender is consumed, so the
/// queue closes when this returns whichever way it ends. A read error trips
/// `cancel` so workers stop early.
///
/// Returns the number of records pushed.
pub fn produce<I>(
    records: I,
    queue: Sender<Record>,
    cancel: &CancelToken,
) -> Result<u64, ProcessorError>
where
    I: IntoIterator<Item = Result<Record, StreamReadError>>,
{
    let mut produced = 0u64;

    for record in records {
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                cancel.cancel();
                return Err(e.into());
            }
        };

        // every worker is gone; they only leave early on cancellation
        if queue.send(record).is_err() {
            return Err(ProcessorError::Cancelled);
        }
        produced += 1;
    }

    Ok(produced)
}

/// Adapts a `csv` reader into the producer's input.
///
/// Cells that are not valid UTF-8 are decoded lossily instead of failing the
/// stream.
pub fn csv_records<R: std::io::Read>(
    reader: csv::Reader<R>,
) -> impl Iterator<Item = Result<Record, StreamReadError>> {
    reader
        .into_byte_records()
        .map(|record| record.map(decode_lossy).map_err(StreamReadError::from))
}

/// Decodes a raw record, replacing invalid UTF-8 with U+FFFD. The record's
/// position is kept for error reporting.
pub fn decode_lossy(record: csv::ByteRecord) -> Record {
    let position = record.position().cloned();
    let mut decoded = Record::from_byte_record_lossy(record);
    decoded.set_position(position);
    decoded
}
