//! Chunk planner: record counts + target size → contiguous index ranges.

use hepflow_core::error::{Error, Result};
use hepflow_core::id::SourceId;
use hepflow_core::range::ChunkRange;

/// Number of chunks for `total` records at `target` records per chunk:
/// `max(1, round(total / target))` with ties rounded to even.
pub fn chunk_count(total: u64, target: u64) -> Result<u64> {
    if target == 0 {
        return Err(Error::Config("target chunk size must be > 0".into()));
    }
    if total == 0 {
        return Ok(0);
    }
    let q = total / target;
    let r = total % target;
    // Compare 2r against target without overflowing u64.
    let twice_r = r as u128 * 2;
    let rounded = match twice_r.cmp(&(target as u128)) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal if q % 2 == 1 => q + 1,
        std::cmp::Ordering::Equal => q,
    };
    Ok(rounded.max(1))
}

/// Partition `[0, total)` of one source into near-even chunks.
///
/// Chunk lengths differ by at most one; `total == 0` yields no chunks.
pub fn plan_chunks(source: SourceId, total: u64, target: u64) -> Result<Vec<ChunkRange>> {
    let n = chunk_count(total, target)?;
    let mut out = Vec::with_capacity(n as usize);
    let bound = |i: u64| ((i as u128 * total as u128) / n as u128) as u64;
    for i in 0..n {
        out.push(ChunkRange::new(source, bound(i), bound(i + 1))?);
    }
    Ok(out)
}

/// Plan every source in order; source ids are positions in `totals`.
pub fn plan_sources(totals: &[u64], target: u64) -> Result<Vec<ChunkRange>> {
    let mut out = Vec::new();
    for (i, &total) in totals.iter().enumerate() {
        out.extend(plan_chunks(SourceId::new(i as u64), total, target)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spans(ranges: &[ChunkRange]) -> Vec<(u64, u64)> {
        ranges.iter().map(|r| (r.start, r.stop)).collect()
    }

    #[test]
    fn thousand_by_four_hundred() {
        let r = plan_chunks(SourceId::new(0), 1000, 400).unwrap();
        assert_eq!(spans(&r), vec![(0, 500), (500, 1000)]);
    }

    #[test]
    fn ties_round_to_even() {
        // 250 / 100 = 2.5 → 2, 350 / 100 = 3.5 → 4
        assert_eq!(chunk_count(250, 100).unwrap(), 2);
        assert_eq!(chunk_count(350, 100).unwrap(), 4);
        assert_eq!(chunk_count(1400, 400).unwrap(), 4);
    }

    #[test]
    fn small_and_empty_sources() {
        assert!(plan_chunks(SourceId::new(0), 0, 10).unwrap().is_empty());
        let r = plan_chunks(SourceId::new(0), 7, 10).unwrap();
        assert_eq!(spans(&r), vec![(0, 7)]);
        // 4/10 rounds to 0, still one chunk
        assert_eq!(plan_chunks(SourceId::new(0), 4, 10).unwrap().len(), 1);
    }

    #[test]
    fn zero_target_is_config_error() {
        assert!(matches!(
            plan_chunks(SourceId::new(0), 10, 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn sources_get_their_own_ids() {
        let r = plan_sources(&[10, 0, 5], 5).unwrap();
        let ids: Vec<u64> = r.iter().map(|c| c.source.get()).collect();
        assert_eq!(ids, vec![0, 0, 2]);
    }

    proptest! {
        #[test]
        fn ranges_partition_exactly(total in 0u64..50_000, target in 1u64..5_000) {
            let r = plan_chunks(SourceId::new(3), total, target).unwrap();
            if total == 0 {
                prop_assert!(r.is_empty());
            } else {
                prop_assert_eq!(r.first().map(|c| c.start), Some(0));
                prop_assert_eq!(r.last().map(|c| c.stop), Some(total));
                for w in r.windows(2) {
                    prop_assert_eq!(w[0].stop, w[1].start);
                }
                let min = r.iter().map(|c| c.len()).min().unwrap();
                let max = r.iter().map(|c| c.len()).max().unwrap();
                prop_assert!(max - min <= 1);
                prop_assert!(min >= 1);
            }
        }
    }
}
