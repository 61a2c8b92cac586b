//! Lone record summarization
//!
//! Fragments outside every coincidence are not written out individually.
//! Instead each chunk produces one statistics row with per-channel counts,
//! mean areas and mean baselines. A few lone pulses per channel are kept
//! verbatim so the raw waveforms can still be inspected.

use nveto_common::options::ChannelMap;
use nveto_common::records::LinkDirection;
use nveto_common::{Error, Fragment, Record, RecordLinks, Result};
use serde::{Deserialize, Serialize};

/// Value reported for a mean with no contributing fragments
pub const NO_DATA: f64 = 0.0;

/// Per-channel lone record statistics of one chunk
///
/// Every array has one entry per channel of the channel map, indexed by
/// the channel's offset within the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoneRecordStatistics {
    /// Chunk start (ns)
    pub time: i64,
    /// Chunk end (ns)
    pub endtime: i64,
    pub channel: Vec<i16>,
    /// Summarized fragments (first and higher)
    pub nfragments: Vec<u32>,
    /// Summarized fragments with `record_i > 0`
    pub nhigherfragments: Vec<u32>,
    /// Mean area of summarized first fragments
    pub lone_record_area: Vec<f64>,
    /// Mean area of summarized higher fragments
    pub higher_lone_record_area: Vec<f64>,
    /// Mean baseline of summarized first fragments
    pub baseline_mean: Vec<f64>,
    /// Mean baseline RMS of summarized first fragments
    pub baseline_rms: Vec<f64>,
}

impl LoneRecordStatistics {
    /// Row with zero counts for every channel of the map
    pub fn empty(channel_map: ChannelMap, time: i64, endtime: i64) -> Self {
        let n = channel_map.len();
        Self {
            time,
            endtime,
            channel: (0..n).map(|offset| channel_map.start + offset as i16).collect(),
            nfragments: vec![0; n],
            nhigherfragments: vec![0; n],
            lone_record_area: vec![0.0; n],
            higher_lone_record_area: vec![0.0; n],
            baseline_mean: vec![0.0; n],
            baseline_rms: vec![0.0; n],
        }
    }

    pub fn n_channels(&self) -> usize {
        self.channel.len()
    }

    fn accumulate(&mut self, offset: usize, record: &Record) {
        self.nfragments[offset] += 1;
        if record.record_i > 0 {
            self.nhigherfragments[offset] += 1;
            self.higher_lone_record_area[offset] += record.area as f64;
        } else {
            self.lone_record_area[offset] += record.area as f64;
            self.baseline_mean[offset] += record.baseline as f64;
            self.baseline_rms[offset] += record.baseline_rms as f64;
        }
    }

    /// Turn accumulated sums into means
    fn finalize(&mut self) {
        for ch in 0..self.n_channels() {
            let higher = self.nhigherfragments[ch];
            let first = self.nfragments[ch] - higher;

            if first > 0 {
                let n = first as f64;
                self.lone_record_area[ch] /= n;
                self.baseline_mean[ch] /= n;
                self.baseline_rms[ch] /= n;
            } else {
                self.lone_record_area[ch] = NO_DATA;
                self.baseline_mean[ch] = NO_DATA;
                self.baseline_rms[ch] = NO_DATA;
            }

            if higher > 0 {
                self.higher_lone_record_area[ch] /= higher as f64;
            } else {
                self.higher_lone_record_area[ch] = NO_DATA;
            }
        }
    }
}

/// Statistics row plus the lone fragments kept verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct LoneRecordSummary {
    pub statistics: LoneRecordStatistics,
    /// Indices into the summarized slice, ascending
    pub retained: Vec<usize>,
}

/// Summarize lone fragments of one chunk
///
/// Per channel the first `keep_n_per_channel` pulses are retained, each
/// with all of its following fragments. Everything else is folded into the
/// statistics row.
///
/// # Errors
/// - [`Error::ChannelOutOfRange`] for a fragment outside `channel_map`
/// - [`Error::RunawayPulseChain`] if a retained pulse's links do not end
pub fn summarize(
    lone: &[Record],
    channel_map: ChannelMap,
    keep_n_per_channel: usize,
    chunk_start: i64,
    chunk_end: i64,
) -> Result<LoneRecordSummary> {
    let links = RecordLinks::compute(lone)?;
    let mut statistics = LoneRecordStatistics::empty(channel_map, chunk_start, chunk_end);
    let mut pulses_kept = vec![0usize; channel_map.len()];
    let mut retained_mask = vec![false; lone.len()];

    for (i, record) in lone.iter().enumerate() {
        let offset = channel_map
            .offset(record.channel())
            .ok_or(Error::ChannelOutOfRange {
                channel: record.channel(),
                start: channel_map.start,
                end: channel_map.end,
            })?;

        if retained_mask[i] {
            continue;
        }

        if pulses_kept[offset] < keep_n_per_channel {
            pulses_kept[offset] += 1;
            retained_mask[i] = true;
            links.walk(i, record.channel(), LinkDirection::Next, |j| {
                retained_mask[j] = true
            })?;
            continue;
        }

        statistics.accumulate(offset, record);
    }

    statistics.finalize();

    let retained = retained_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &kept)| kept.then_some(i))
        .collect();

    Ok(LoneRecordSummary {
        statistics,
        retained,
    })
}
