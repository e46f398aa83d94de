use group_counter::processor::aggregator::merge;
use group_counter::processor::worker::tally;
use group_counter::processor::{PartialCount, Record, StreamReadError};
use group_counter::{CountConfig, GroupCounter, GroupingSpec, sorted_entries};
use proptest::prelude::*;

fn arb_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "{\"k\":1}", "{}"]), 3)
            .prop_map(|row| row.into_iter().map(str::to_string).collect()),
        0..200,
    )
}

fn to_records(rows: &[Vec<String>]) -> Vec<Record> {
    rows.iter().map(|r| Record::from(r.clone())).collect()
}

fn specs() -> Vec<GroupingSpec> {
    vec![GroupingSpec::column(0), GroupingSpec::json_path(2, "k")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merged_partitions_equal_single_pass(rows in arb_rows(), cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8)) {
        let records = to_records(&rows);
        let specs = specs();

        let mut whole = PartialCount::new();
        tally(&records, &specs, &mut whole).unwrap();

        let mut bounds: Vec<usize> = cuts.iter().map(|c| c.index(records.len() + 1)).collect();
        bounds.push(0);
        bounds.push(records.len());
        bounds.sort_unstable();

        let partials: Vec<PartialCount> = bounds
            .windows(2)
            .map(|w| {
                let mut partial = PartialCount::new();
                tally(&records[w[0]..w[1]], &specs, &mut partial).unwrap();
                partial
            })
            .collect();

        for (key, count) in &whole {
            let summed: u64 = partials.iter().filter_map(|p| p.get(key)).sum();
            prop_assert_eq!(summed, *count);
        }
        prop_assert_eq!(merge(partials), whole);
    }

    #[test]
    fn pool_size_does_not_change_counts(rows in arb_rows(), workers in 1usize..=4) {
        let specs = specs();
        let input = |rows: &[Vec<String>]| -> Vec<Result<Record, StreamReadError>> {
            to_records(rows).into_iter().map(Ok).collect()
        };

        let single = GroupCounter::new(CountConfig::new("0,2#k").with_workers(1))
            .run(input(&rows), &specs)
            .unwrap();
        let pooled = GroupCounter::new(
            CountConfig::new("0,2#k")
                .with_workers(workers)
                .with_queue_capacity(4),
        )
        .run(input(&rows), &specs)
        .unwrap();

        prop_assert_eq!(single.values().sum::<u64>(), rows.len() as u64);
        prop_assert_eq!(sorted_entries(&single), sorted_entries(&pooled));
    }
}
