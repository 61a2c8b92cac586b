//! Pulse fragment data model
//!
//! A digitized PMT pulse longer than one record is split into consecutive
//! fragments ("records") of a fixed sample capacity. Fragments of one pulse
//! share `pulse_length` and carry an increasing `record_i`.
//!
//! Two layouts exist:
//!
//! 1. [`RawRecord`]: the digitizer output, as read and as written back out
//! 2. [`Record`]: a raw record after baseline subtraction and integration
//!
//! Algorithms that only look at fragment headers are generic over the
//! [`Fragment`] trait so they run on either layout.
//!
//! All times are integer nanoseconds.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on fragments visited when following one pulse's links
///
/// A longer walk means malformed or cyclic links and is treated as fatal.
pub const MAX_PULSE_FRAGMENTS: usize = 1000;

/// Header accessors shared by every fragment layout
pub trait Fragment {
    /// Start time (ns)
    fn time(&self) -> i64;
    /// Channel number
    fn channel(&self) -> i16;
    /// Sample period (ns)
    fn dt(&self) -> i16;
    /// Number of valid samples in this fragment
    fn length(&self) -> i32;
    /// Number of samples in the whole pulse
    fn pulse_length(&self) -> i32;
    /// Index of this fragment within its pulse (0 = first fragment)
    fn record_i(&self) -> i16;
    /// Sample buffer capacity of this fragment
    fn capacity(&self) -> usize;

    /// End time of this fragment's valid samples
    #[inline]
    fn endtime(&self) -> i64 {
        self.time() + self.length() as i64 * self.dt() as i64
    }

    /// End time used by the interval membership test
    ///
    /// Measured from this fragment's start over the full pulse length.
    #[inline]
    fn pulse_endtime(&self) -> i64 {
        self.time() + self.pulse_length() as i64 * self.dt() as i64
    }

    /// Start time a continuation fragment of this one would have
    #[inline]
    fn continuation_time(&self) -> i64 {
        self.time() + self.capacity() as i64 * self.dt() as i64
    }

    /// True for the first fragment of a pulse
    #[inline]
    fn is_first_fragment(&self) -> bool {
        self.record_i() == 0
    }
}

/// Raw digitizer fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub time: i64,
    pub length: i32,
    pub dt: i16,
    pub channel: i16,
    pub pulse_length: i32,
    pub record_i: i16,
    pub data: Vec<i16>,
}

impl RawRecord {
    /// Create a first fragment holding a whole pulse
    ///
    /// # Arguments
    /// * `time` - Start time (ns)
    /// * `channel` - Channel number
    /// * `dt` - Sample period (ns)
    /// * `data` - Samples; the valid length and pulse length are taken from it
    pub fn single(time: i64, channel: i16, dt: i16, data: Vec<i16>) -> Self {
        let length = data.len() as i32;
        Self {
            time,
            length,
            dt,
            channel,
            pulse_length: length,
            record_i: 0,
            data,
        }
    }
}

impl Fragment for RawRecord {
    fn time(&self) -> i64 {
        self.time
    }
    fn channel(&self) -> i16 {
        self.channel
    }
    fn dt(&self) -> i16 {
        self.dt
    }
    fn length(&self) -> i32 {
        self.length
    }
    fn pulse_length(&self) -> i32 {
        self.pulse_length
    }
    fn record_i(&self) -> i16 {
        self.record_i
    }
    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Baseline-processed fragment
///
/// `data` holds the baseline-subtracted waveform; samples past `length`
/// are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub time: i64,
    pub length: i32,
    pub dt: i16,
    pub channel: i16,
    pub pulse_length: i32,
    pub record_i: i16,
    pub baseline: f32,
    pub baseline_rms: f32,
    pub area: i32,
    pub data: Vec<i16>,
}

impl Record {
    /// Copy the header of a raw record, leaving derived fields zeroed
    pub fn header_from(raw: &RawRecord) -> Self {
        Self {
            time: raw.time,
            length: raw.length,
            dt: raw.dt,
            channel: raw.channel,
            pulse_length: raw.pulse_length,
            record_i: raw.record_i,
            baseline: 0.0,
            baseline_rms: 0.0,
            area: 0,
            data: vec![0; raw.data.len()],
        }
    }
}

impl Fragment for Record {
    fn time(&self) -> i64 {
        self.time
    }
    fn channel(&self) -> i16 {
        self.channel
    }
    fn dt(&self) -> i16 {
        self.dt
    }
    fn length(&self) -> i32 {
        self.length
    }
    fn pulse_length(&self) -> i32 {
        self.pulse_length
    }
    fn record_i(&self) -> i16 {
        self.record_i
    }
    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Verify that all fragments share one sample capacity and return it
///
/// Returns `Ok(None)` for an empty slice.
pub fn fragment_capacity<F: Fragment>(records: &[F]) -> Result<Option<usize>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let expected = first.capacity();
    for (index, record) in records.iter().enumerate() {
        if record.capacity() != expected {
            return Err(Error::InconsistentCapacity {
                index,
                expected,
                found: record.capacity(),
            });
        }
    }
    Ok(Some(expected))
}

/// Verify that fragments are sorted ascending by time
pub fn check_sorted<F: Fragment>(records: &[F]) -> Result<()> {
    for (index, pair) in records.windows(2).enumerate() {
        if pair[1].time() < pair[0].time() {
            return Err(Error::UnsortedRecords {
                index: index + 1,
                time: pair[1].time(),
                previous_time: pair[0].time(),
            });
        }
    }
    Ok(())
}

/// Walk direction along a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Previous,
    Next,
}

/// Previous/next fragment of the same pulse for every fragment in a slice
///
/// Links are plain indices into the slice the links were computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLinks {
    previous: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
}

impl RecordLinks {
    /// Compute links for time-sorted fragments
    ///
    /// A fragment continues the last fragment seen on its channel when it
    /// starts exactly where that fragment's sample buffer ends.
    pub fn compute<F: Fragment>(records: &[F]) -> Result<Self> {
        let n = records.len();
        let mut previous = vec![None; n];
        let mut next = vec![None; n];

        let Some(capacity) = fragment_capacity(records)? else {
            return Ok(Self { previous, next });
        };

        let mut max_channel: i16 = 0;
        for (index, record) in records.iter().enumerate() {
            if record.channel() < 0 {
                return Err(Error::NegativeChannel {
                    index,
                    channel: record.channel(),
                });
            }
            max_channel = max_channel.max(record.channel());
        }

        // (index of last fragment seen, start time of its continuation) per channel
        let mut last_seen: Vec<Option<(usize, i64)>> = vec![None; max_channel as usize + 1];

        for (index, record) in records.iter().enumerate() {
            let ch = record.channel() as usize;
            if let Some((last_index, expected_start)) = last_seen[ch] {
                if record.time() == expected_start {
                    previous[index] = Some(last_index);
                    next[last_index] = Some(index);
                }
            }
            let continuation = record.time() + capacity as i64 * record.dt() as i64;
            last_seen[ch] = Some((index, continuation));
        }

        Ok(Self { previous, next })
    }

    /// Number of fragments covered
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Previous fragment of the same pulse
    pub fn previous(&self, index: usize) -> Option<usize> {
        self.previous[index]
    }

    /// Next fragment of the same pulse
    pub fn next(&self, index: usize) -> Option<usize> {
        self.next[index]
    }

    /// Visit every fragment linked from `index` in one direction
    ///
    /// `index` itself is not visited. Fails with
    /// [`Error::RunawayPulseChain`] once more than
    /// [`MAX_PULSE_FRAGMENTS`] fragments have been visited.
    pub fn walk<G>(
        &self,
        index: usize,
        channel: i16,
        direction: LinkDirection,
        mut visit: G,
    ) -> Result<()>
    where
        G: FnMut(usize),
    {
        let step = |i: usize| match direction {
            LinkDirection::Previous => self.previous[i],
            LinkDirection::Next => self.next[i],
        };

        let mut visited = 0usize;
        let mut cursor = step(index);
        while let Some(i) = cursor {
            visited += 1;
            if visited > MAX_PULSE_FRAGMENTS {
                return Err(Error::RunawayPulseChain {
                    index,
                    channel,
                    limit: MAX_PULSE_FRAGMENTS,
                });
            }
            visit(i);
            cursor = step(i);
        }
        Ok(())
    }

    /// Visit every other fragment of the pulse containing `index`
    pub fn walk_pulse<G>(&self, index: usize, channel: i16, mut visit: G) -> Result<()>
    where
        G: FnMut(usize),
    {
        self.walk(index, channel, LinkDirection::Previous, &mut visit)?;
        self.walk(index, channel, LinkDirection::Next, &mut visit)
    }

    /// Build links from explicit previous/next arrays
    ///
    /// Both arrays must have equal length and every index must be in range.
    pub fn from_parts(previous: Vec<Option<usize>>, next: Vec<Option<usize>>) -> Result<Self> {
        let n = previous.len();
        if next.len() != n {
            return Err(Error::InvalidInput(format!(
                "link arrays differ in length: {} previous, {} next",
                n,
                next.len()
            )));
        }
        if let Some(bad) = previous.iter().chain(next.iter()).flatten().find(|&&i| i >= n) {
            return Err(Error::InvalidInput(format!(
                "link index {} out of range for {} records",
                bad, n
            )));
        }
        Ok(Self { previous, next })
    }
}
