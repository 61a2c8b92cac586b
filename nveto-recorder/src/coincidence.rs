//! Coincidence detection and interval merging
//!
//! A fragment start time qualifies when the `nfold` fragments starting
//! there arrive within the resolving time. Qualifying start times are then
//! merged into disjoint intervals.
//!
//! **Algorithm:**
//! 1. Inter-arrival deltas `d[i] = time[i] - time[i-1]`, `d[0] = 0`
//! 2. Moving sum of the `nfold - 1` deltas following each index
//! 3. Index `i` qualifies if its sum is `<= resolving_time`
//! 4. Each qualifying time opens `[t, t + resolving_time]`; a following time
//!    more than `resolving_time` after the previous one starts a new interval
//!
//! The last `nfold - 1` fragments of a chunk never get a full window and
//! are not evaluated.

use nveto_common::Fragment;
use serde::{Deserialize, Serialize};

/// Time interval (ns)
///
/// Produced half-open `[start, end)` by the merger. Membership tests treat
/// both bounds as inclusive, see [`Interval::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Duration in ns (negative for an inverted interval)
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Inclusive containment: `start <= t <= end`
    #[inline]
    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Start times of fragments that open an `nfold` coincidence
///
/// # Arguments
/// * `fragments` - Fragments sorted ascending by time
/// * `nfold` - Fragments required within the resolving time (>= 1)
/// * `resolving_time` - Maximum elapsed time across the window (ns)
///
/// # Returns
/// Qualifying start times in input order; empty when fewer than `nfold`
/// fragments are present.
pub fn detect_coincidence_starts<F: Fragment>(
    fragments: &[F],
    nfold: usize,
    resolving_time: i64,
) -> Vec<i64> {
    let n = fragments.len();
    if nfold == 0 || n < nfold {
        return Vec::new();
    }

    let window = nfold - 1;
    let deltas: Vec<i64> = std::iter::once(0)
        .chain(fragments.windows(2).map(|w| w[1].time() - w[0].time()))
        .collect();

    // sum for index i covers d[i+1..=i+window]
    let mut sum: i64 = deltas[1..=window].iter().sum();
    let mut starts = Vec::new();

    for i in 0..(n - window) {
        if i > 0 {
            sum += deltas[i + window] - deltas[i];
        }
        if sum <= resolving_time {
            starts.push(fragments[i].time());
        }
    }

    starts
}

/// Merge qualifying start times into maximal disjoint intervals
///
/// Gaps of exactly `resolving_time` between consecutive times are merged;
/// only a strictly larger gap closes the current interval.
pub fn merge_intervals(qualifying_times: &[i64], resolving_time: i64) -> Vec<Interval> {
    let Some((&first, rest)) = qualifying_times.split_first() else {
        return Vec::new();
    };

    let mut intervals = Vec::new();
    let mut current_start = first;
    let mut previous = first;

    for &t in rest {
        if t - previous > resolving_time {
            intervals.push(Interval::new(current_start, previous.saturating_add(resolving_time)));
            current_start = t;
        }
        previous = t;
    }
    intervals.push(Interval::new(current_start, previous.saturating_add(resolving_time)));

    intervals
}

/// Coincidence intervals of a chunk (detection followed by merging)
pub fn coincidence<F: Fragment>(fragments: &[F], nfold: usize, resolving_time: i64) -> Vec<Interval> {
    let starts = detect_coincidence_starts(fragments, nfold, resolving_time);
    merge_intervals(&starts, resolving_time)
}

/// Merge overlapping or touching intervals sorted by start
///
/// Merger output is already coalesced, so this is the identity on it.
pub fn coalesce(intervals: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => last.end = last.end.max(iv.end),
            _ => merged.push(*iv),
        }
    }
    merged
}
