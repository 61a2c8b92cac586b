//! Splitting a chunk into coincident and lone fragments
//!
//! Coincidence intervals are padded at the chunk boundaries, since pulses
//! near the edges may belong to coincidences that straddle chunks. Every
//! fragment overlapping a padded interval is kept together with the rest
//! of its pulse.

use crate::coincidence::Interval;
use nveto_common::{Error, Fragment, RecordLinks, Result};

/// Add boundary padding intervals to sorted coincidence intervals
///
/// The first padding interval is `[chunk_start, min(chunk_start + rt, first.start)]`
/// and the last is `[max(chunk_end - rt, last.end), chunk_end]`. With no
/// intervals both paddings span a full resolving time. The result is
/// sorted by start.
pub fn pad_intervals(
    intervals: &[Interval],
    chunk_start: i64,
    chunk_end: i64,
    resolving_time: i64,
) -> Vec<Interval> {
    let mut padded = Vec::with_capacity(intervals.len() + 2);

    match (intervals.first(), intervals.last()) {
        (Some(first), Some(last)) => {
            padded.push(Interval::new(
                chunk_start,
                chunk_start.saturating_add(resolving_time).min(first.start),
            ));
            padded.extend_from_slice(intervals);
            padded.push(Interval::new(
                chunk_end.saturating_sub(resolving_time).max(last.end),
                chunk_end,
            ));
        }
        _ => {
            padded.push(Interval::new(chunk_start, chunk_start.saturating_add(resolving_time)));
            padded.push(Interval::new(chunk_end.saturating_sub(resolving_time), chunk_end));
        }
    }

    padded.sort_by_key(|iv| iv.start);
    padded
}

/// Flag every fragment belonging to a pulse that touches an interval
///
/// A fragment touches an interval when its start time or its pulse end time
/// (`time + pulse_length * dt`) lies inside it, inclusive at both ends.
/// Touching fragments propagate the flag along their pulse in both
/// directions.
///
/// # Arguments
/// * `fragments` - Fragments sorted ascending by time
/// * `links` - Pulse links computed on `fragments`
/// * `intervals` - Intervals sorted ascending by start
///
/// # Errors
/// [`Error::RunawayPulseChain`] if a pulse walk exceeds the fragment cap.
pub fn pulse_in_interval<F: Fragment>(
    fragments: &[F],
    links: &RecordLinks,
    intervals: &[Interval],
) -> Result<Vec<bool>> {
    if links.len() != fragments.len() {
        return Err(Error::InvalidInput(format!(
            "links cover {} records, chunk has {}",
            links.len(),
            fragments.len()
        )));
    }

    let mut in_interval = vec![false; fragments.len()];
    // Intervals ending before the current fragment cannot match any later one
    let mut cursor = 0usize;

    for (i, fragment) in fragments.iter().enumerate() {
        let start = fragment.time();
        while cursor < intervals.len() && intervals[cursor].end < start {
            cursor += 1;
        }
        if in_interval[i] {
            continue;
        }

        let end = fragment.pulse_endtime().max(start);
        let touches = intervals[cursor..]
            .iter()
            .take_while(|iv| iv.start <= end)
            .any(|iv| iv.contains(start) || iv.contains(end));

        if touches {
            in_interval[i] = true;
            links.walk_pulse(i, fragment.channel(), |j| in_interval[j] = true)?;
        }
    }

    Ok(in_interval)
}

/// Split items into (flagged, unflagged), preserving order
pub fn partition<T: Clone>(items: &[T], mask: &[bool]) -> Result<(Vec<T>, Vec<T>)> {
    if items.len() != mask.len() {
        return Err(Error::InvalidInput(format!(
            "mask length {} does not match {} records",
            mask.len(),
            items.len()
        )));
    }

    let kept = mask.iter().filter(|&&m| m).count();
    let mut flagged = Vec::with_capacity(kept);
    let mut unflagged = Vec::with_capacity(items.len() - kept);
    for (item, &m) in items.iter().zip(mask) {
        if m {
            flagged.push(item.clone());
        } else {
            unflagged.push(item.clone());
        }
    }
    Ok((flagged, unflagged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nveto_common::records::LinkDirection;
    use nveto_common::RawRecord;

    const CAPACITY: usize = 4;

    fn fragment(time: i64, channel: i16, record_i: i16, pulse_length: i32) -> RawRecord {
        RawRecord {
            time,
            length: CAPACITY as i32,
            dt: 2,
            channel,
            pulse_length,
            record_i,
            data: vec![0; CAPACITY],
        }
    }

    fn flag(records: &[RawRecord], intervals: &[Interval]) -> Vec<bool> {
        let links = RecordLinks::compute(records).unwrap();
        pulse_in_interval(records, &links, intervals).unwrap()
    }

    #[test]
    fn test_padding_without_intervals() {
        let padded = pad_intervals(&[], 0, 10_000, 600);
        assert_eq!(padded, vec![Interval::new(0, 600), Interval::new(9_400, 10_000)]);
    }

    #[test]
    fn test_padding_clipped_by_first_and_last_interval() {
        let intervals = [Interval::new(200, 800), Interval::new(9_800, 10_400)];
        let padded = pad_intervals(&intervals, 0, 10_000, 600);
        assert_eq!(
            padded,
            vec![
                Interval::new(0, 200),
                Interval::new(200, 800),
                Interval::new(9_800, 10_400),
                Interval::new(10_400, 10_000),
            ]
        );
    }

    #[test]
    fn test_padding_full_width_when_intervals_are_far() {
        let intervals = [Interval::new(5_000, 5_600)];
        let padded = pad_intervals(&intervals, 0, 10_000, 600);
        assert_eq!(padded.first(), Some(&Interval::new(0, 600)));
        assert_eq!(padded.last(), Some(&Interval::new(9_400, 10_000)));
    }

    #[test]
    fn test_padding_saturates() {
        let padded = pad_intervals(&[], 1_000, 2_000, i64::MAX);
        assert_eq!(
            padded,
            vec![Interval::new(2_000 - i64::MAX, 2_000), Interval::new(1_000, i64::MAX)]
        );

        let padded = pad_intervals(&[], -20, -10, i64::MAX);
        assert_eq!(
            padded,
            vec![Interval::new(i64::MIN, -10), Interval::new(-20, i64::MAX - 20)]
        );
    }

    #[test]
    fn test_membership_is_inclusive_at_both_ends() {
        let interval = [Interval::new(100, 200)];
        let records = vec![
            fragment(90, 1, 0, 5),   // ends at 100
            fragment(200, 2, 0, 4),  // starts at 200
            fragment(300, 3, 0, 4),  // outside
        ];
        assert_eq!(flag(&records, &interval), vec![true, true, false]);
    }

    #[test]
    fn test_pulse_spanning_interval_without_endpoint_inside_is_not_flagged() {
        // Starts before and ends after the interval: neither endpoint is inside
        let records = vec![fragment(0, 1, 0, 4)];
        assert_eq!(flag(&records, &[Interval::new(2, 4)]), vec![false]);
    }

    #[test]
    fn test_whole_pulse_follows_one_fragment() {
        let records = vec![
            fragment(0, 1, 0, 12),
            fragment(8, 1, 1, 12),
            fragment(16, 1, 2, 12),
            fragment(1_000, 2, 0, 4),
        ];
        // Pulse ends are measured from each fragment: 24, 32, 40
        let mask = flag(&records, &[Interval::new(30, 31)]);
        assert_eq!(mask, vec![false, false, false, false]);

        let mask = flag(&records, &[Interval::new(8, 8)]);
        assert_eq!(mask, vec![true, true, true, false]);

        let mask = flag(&records, &[Interval::new(40, 40)]);
        assert_eq!(mask, vec![true, true, true, false]);
    }

    #[test]
    fn test_pulse_consistency() {
        let records = vec![
            fragment(0, 1, 0, 8),
            fragment(3, 2, 0, 4),
            fragment(8, 1, 1, 8),
            fragment(500, 1, 0, 8),
            fragment(508, 1, 1, 8),
        ];
        let links = RecordLinks::compute(&records).unwrap();
        let mask = pulse_in_interval(&records, &links, &[Interval::new(508, 510)]).unwrap();

        for i in 0..records.len() {
            for dir in [LinkDirection::Previous, LinkDirection::Next] {
                links
                    .walk(i, records[i].channel, dir, |j| {
                        assert_eq!(mask[i], mask[j], "fragments {} and {} disagree", i, j)
                    })
                    .unwrap();
            }
        }
        assert_eq!(mask, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_runaway_chain_is_fatal() {
        let records = vec![fragment(0, 1, 0, 4), fragment(8, 1, 1, 4)];
        let links = RecordLinks::from_parts(vec![Some(1), Some(0)], vec![Some(1), Some(0)]).unwrap();
        let err = pulse_in_interval(&records, &links, &[Interval::new(0, 0)]).unwrap_err();
        assert!(matches!(err, Error::RunawayPulseChain { index: 0, channel: 1, .. }));
    }

    #[test]
    fn test_inverted_trailing_padding_matches_nothing_extra() {
        // Inverted trailing padding interval matches nothing
        let records = vec![fragment(9_000, 1, 0, 4), fragment(10_000, 1, 0, 4)];
        let intervals = pad_intervals(&[Interval::new(8_000, 10_400)], 0, 10_000, 600);
        assert_eq!(flag(&records, &intervals), vec![true, true]);
    }

    #[test]
    fn test_partition_preserves_order_and_completeness() {
        let items = vec![1, 2, 3, 4, 5];
        let (kept, lone) = partition(&items, &[true, false, true, false, false]).unwrap();
        assert_eq!(kept, vec![1, 3]);
        assert_eq!(lone, vec![2, 4, 5]);
        assert_eq!(kept.len() + lone.len(), items.len());
    }

    #[test]
    fn test_partition_rejects_length_mismatch() {
        assert!(partition(&[1, 2], &[true]).is_err());
    }
}
