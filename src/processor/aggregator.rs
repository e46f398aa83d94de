use crossbeam_channel::Receiver;
use log::warn;

use crate::processor::{FinalCount, PartialCount, ProcessorError, worker::WorkerReport};

/// Single-threaded reduce over the workers' partial tables.
#[derive(Debug)]
pub struct Aggregator {
    expected: usize,
    reports: Vec<WorkerReport>,
}

impl Aggregator {
    /// Expects exactly one report from each of `workers` workers.
    pub fn new(workers: usize) -> Self {
        Aggregator {
            expected: workers,
            reports: Vec::with_capacity(workers),
        }
    }

    /// Receives reports until every worker has reported or all senders are
    /// gone. Nothing is merged here.
    pub fn collect(&mut self, results: &Receiver<WorkerReport>) {
        while self.reports.len() < self.expected {
            match results.recv() {
                Ok(report) => self.reports.push(report),
                Err(_) => break,
            }
        }
    }

    /// Merges the collected partial tables.
    ///
    /// Fails without merging anything if any worker failed or a worker never
    /// reported. `upstream` is the producer's outcome; a root-cause error
    /// anywhere wins over cancellation echoes.
    pub fn finish(
        self,
        upstream: Result<u64, ProcessorError>,
    ) -> Result<FinalCount, ProcessorError> {
        let mut root_cause = upstream.err();
        let mut partials = Vec::with_capacity(self.reports.len());

        for report in self.reports {
            match report.outcome {
                Ok(partial) => partials.push(partial),
                Err(e) => {
                    if !e.is_cancellation() {
                        warn!("Worker {} failed: {}", report.worker_id, e);
                    }
                    keep_root_cause(&mut root_cause, e);
                }
            }
        }

        if let Some(e) = root_cause {
            return Err(e);
        }
        if partials.len() != self.expected {
            warn!(
                "Only {} of {} workers reported",
                partials.len(),
                self.expected
            );
            return Err(ProcessorError::Cancelled);
        }

        Ok(merge(partials))
    }
}

fn keep_root_cause(slot: &mut Option<ProcessorError>, e: ProcessorError) {
    let replace = match slot {
        None => true,
        Some(current) => current.is_cancellation() && !e.is_cancellation(),
    };
    if replace {
        *slot = Some(e);
    }
}

/// Sums partial tables key by key. The largest table is reused as the base.
pub fn merge(mut partials: Vec<PartialCount>) -> FinalCount {
    let Some(largest) = partials
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| p.len())
        .map(|(i, _)| i)
    else {
        return FinalCount::new();
    };

    let mut merged = partials.swap_remove(largest);
    for partial in partials {
        for (key, count) in partial {
            *merged.entry(key).or_insert(0) += count;
        }
    }
    merged
}

/// Entries sorted by key, for stable output.
pub fn sorted_entries(counts: &FinalCount) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::RowValidationError;
    use crossbeam_channel::bounded;

    fn partial(entries: &[(&str, u64)]) -> PartialCount {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn ok_report(worker_id: usize, entries: &[(&str, u64)]) -> WorkerReport {
        WorkerReport {
            worker_id,
            outcome: Ok(partial(entries)),
        }
    }

    #[test]
    fn test_merge_sums_identical_keys() {
        let merged = merge(vec![
            partial(&[("A", 1), ("B", 2)]),
            partial(&[("A", 3)]),
            partial(&[]),
            partial(&[("C", 1), ("B", 1), ("A", 1)]),
        ]);
        assert_eq!(merged, partial(&[("A", 5), ("B", 3), ("C", 1)]));
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        assert!(merge(Vec::new()).is_empty());
    }

    #[test]
    fn test_collect_then_finish() {
        let (tx, rx) = bounded(2);
        tx.send(ok_report(0, &[("A", 2)])).unwrap();
        tx.send(ok_report(1, &[("A", 1), ("B", 1)])).unwrap();

        let mut aggregator = Aggregator::new(2);
        aggregator.collect(&rx);
        let counts = aggregator.finish(Ok(4)).unwrap();

        assert_eq!(counts, partial(&[("A", 3), ("B", 1)]));
    }

    #[test]
    fn test_worker_error_beats_cancellation_echo() {
        let (tx, rx) = bounded(3);
        tx.send(WorkerReport {
            worker_id: 0,
            outcome: Err(ProcessorError::Cancelled),
        })
        .unwrap();
        tx.send(WorkerReport {
            worker_id: 1,
            outcome: Err(RowValidationError::IndexOutOfRange {
                index: 4,
                len: 2,
                line: Some(10),
            }
            .into()),
        })
        .unwrap();
        tx.send(ok_report(2, &[("A", 1)])).unwrap();

        let mut aggregator = Aggregator::new(3);
        aggregator.collect(&rx);
        let err = aggregator.finish(Err(ProcessorError::Cancelled)).unwrap_err();

        assert!(matches!(
            err,
            ProcessorError::RowValidation(RowValidationError::IndexOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn test_missing_report_yields_no_result() {
        let (tx, rx) = bounded(2);
        tx.send(ok_report(0, &[("A", 1)])).unwrap();
        drop(tx);

        let mut aggregator = Aggregator::new(2);
        aggregator.collect(&rx);
        assert!(aggregator.finish(Ok(1)).is_err());
    }

    #[test]
    fn test_sorted_entries() {
        let counts = partial(&[("b", 1), ("a", 2), ("c", 3)]);
        assert_eq!(sorted_entries(&counts), vec![("a", 2), ("b", 1), ("c", 3)]);
    }
}
