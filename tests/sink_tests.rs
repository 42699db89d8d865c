//! Partitioned sink round trips with jagged event data.


use hepflow::core::dag::SinkFormat;
use hepflow::core::types::Scalar;
use hepflow::io::{read_partitioned, write_partitioned, PartitionStrategy, SinkOptions};
use proptest::prelude::*;
use test_data_gen::{dimuon_events, muon_schema};

fn events_of(batches: &[hepflow::core::types::RecordBatch]) -> Vec<Vec<i64>> {
    batches
        .iter()
        .map(|b| {
            b.column("event")
                .unwrap()
                .values
                .iter()
                .filter_map(Scalar::as_i64)
                .collect()
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_round_trip_keeps_rows_and_partition_order(
        sizes in prop::collection::vec(0u64..30, 1..5),
        partitions in 1usize..6,
        by_event in any::<bool>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut first = 0;
        let batches: Vec<_> = sizes
            .iter()
            .map(|&n| {
                let b = dimuon_events(first, n);
                first += n;
                b
            })
            .collect();
        let opts = SinkOptions {
            format: SinkFormat::Jsonl,
            partitions,
            strategy: if by_event {
                PartitionStrategy::Hash { keys: vec!["event".into()] }
            } else {
                PartitionStrategy::Contiguous
            },
        };
        let dest = dir.path().join("out");
        let written = write_partitioned(&batches, &muon_schema(), &dest, &opts).unwrap();
        prop_assert_eq!(written.partitions(), partitions);
        prop_assert_eq!(written.total_rows(), first);

        let (_, back) = read_partitioned(&dest).unwrap();
        let parts = events_of(&back);
        for part in &parts {
            prop_assert!(part.windows(2).all(|w| w[0] < w[1]));
        }
        let mut all: Vec<i64> = parts.concat();
        all.sort_unstable();
        prop_assert_eq!(all, (0..first as i64).collect::<Vec<_>>());

        // Jagged columns survive intact.
        let original = hepflow::core::types::RecordBatch::concat(&batches).unwrap();
        for b in &back {
            for row in 0..b.num_rows() {
                let event = b.column("event").unwrap().values[row].as_i64().unwrap() as usize;
                prop_assert_eq!(
                    &b.column("Muon_pt").unwrap().values[row],
                    &original.column("Muon_pt").unwrap().values[event]
                );
            }
        }
    }
}

#[test]
fn test_contiguous_partitions_are_near_even() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("even");
    let opts = SinkOptions {
        format: SinkFormat::Jsonl,
        partitions: 3,
        strategy: PartitionStrategy::Contiguous,
    };
    let batches = [dimuon_events(0, 6), dimuon_events(6, 4)];
    let written = write_partitioned(&batches, &muon_schema(), &dest, &opts).unwrap();
    assert_eq!(written.rows_per_partition, vec![3, 3, 4]);

    let (_, back) = read_partitioned(&dest).unwrap();
    assert_eq!(
        events_of(&back),
        vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]]
    );
}
