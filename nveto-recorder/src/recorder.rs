//! Chunk-level recorder pipeline
//!
//! **Per chunk:**
//! 1. Validate ordering, chunk bounds, channels, capacity and
//!    (optionally) same-channel overlaps
//! 2. Find coincidence intervals and pad them at the chunk boundaries
//! 3. Keep every pulse touching a padded interval
//! 4. Baseline the remaining lone fragments and summarize them
//!
//! Chunks are independent; nothing is carried from one chunk to the next.

use crate::baseline::{Baseliner, FirstSamplesBaseline};
use crate::coincidence::{coincidence, Interval};
use crate::lone::{summarize, LoneRecordStatistics};
use crate::overlap::{check_bounds, check_channels, check_overlaps};
use crate::split::{pad_intervals, partition, pulse_in_interval};
use nveto_common::options::RecorderConfig;
use nveto_common::records::{check_sorted, fragment_capacity};
use nveto_common::{Error, RawRecord, RecordLinks, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One time slice of raw records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk start (ns)
    pub start: i64,
    /// Chunk end (ns)
    pub end: i64,
    /// Raw records sorted by time
    #[serde(default)]
    pub raw_records: Vec<RawRecord>,
}

impl Chunk {
    pub fn new(start: i64, end: i64, raw_records: Vec<RawRecord>) -> Self {
        Self {
            start,
            end,
            raw_records,
        }
    }
}

/// Recorder result for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderOutput {
    /// Records belonging to a pulse inside a coincidence (or boundary padding)
    pub raw_records_coin: Vec<RawRecord>,
    /// Lone records kept verbatim for diagnostics
    pub lone_raw_records: Vec<RawRecord>,
    /// Summary of all other lone records
    pub lone_raw_record_statistics: LoneRecordStatistics,
}

/// Coincidence recorder for neutron-veto raw records
#[derive(Debug)]
pub struct NvetoRecorder<B: Baseliner = FirstSamplesBaseline> {
    config: RecorderConfig,
    baseliner: B,
}

impl NvetoRecorder<FirstSamplesBaseline> {
    /// Create a recorder using the first-samples baseline
    ///
    /// # Errors
    /// [`Error::Config`] if any option is invalid
    pub fn new(config: RecorderConfig) -> Result<Self> {
        let baseliner = FirstSamplesBaseline::new(config.nbaseline_samples, config.flip_baseline)?;
        Self::with_baseliner(config, baseliner)
    }
}

impl<B: Baseliner> NvetoRecorder<B> {
    /// Create a recorder with a custom baseline step
    pub fn with_baseliner(config: RecorderConfig, baseliner: B) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, baseliner })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Padded coincidence intervals of a chunk
    pub fn intervals(&self, chunk: &Chunk) -> Vec<Interval> {
        let rt = self.config.resolving_time;
        let intervals = coincidence(
            &chunk.raw_records,
            self.config.coincidence_level as usize,
            rt,
        );
        pad_intervals(&intervals, chunk.start, chunk.end, rt)
    }

    /// Process one chunk
    pub fn process_chunk(&self, chunk: &Chunk) -> Result<RecorderOutput> {
        if chunk.end < chunk.start {
            return Err(Error::InvalidInput(format!(
                "chunk end {} before start {}",
                chunk.end, chunk.start
            )));
        }

        let records = &chunk.raw_records;
        if records.is_empty() {
            debug!(start = chunk.start, end = chunk.end, "Empty chunk");
        }

        check_sorted(records)?;
        check_bounds(records, chunk.start, chunk.end)?;
        check_channels(records, self.config.channel_map)?;
        fragment_capacity(records)?;
        if self.config.check_overlaps {
            check_overlaps(records)?;
        }

        let in_coincidence = if self.config.coincidence_level <= 1 {
            vec![true; records.len()]
        } else {
            let intervals = self.intervals(chunk);
            let links = RecordLinks::compute(records)?;
            debug!(
                records = records.len(),
                intervals = intervals.len(),
                "Coincidence intervals found"
            );
            pulse_in_interval(records, &links, &intervals)?
        };

        let (raw_records_coin, lone) = partition(records, &in_coincidence)?;

        let processed = self.baseliner.process(&lone)?;
        if processed.len() != lone.len() {
            return Err(Error::InvalidInput(format!(
                "baseline step returned {} records for {} inputs",
                processed.len(),
                lone.len()
            )));
        }

        let summary = summarize(
            &processed,
            self.config.channel_map,
            self.config.n_lone_records,
            chunk.start,
            chunk.end,
        )?;
        let lone_raw_records: Vec<RawRecord> =
            summary.retained.iter().map(|&i| lone[i].clone()).collect();

        debug!(
            start = chunk.start,
            end = chunk.end,
            kept = raw_records_coin.len(),
            lone = lone.len(),
            retained = lone_raw_records.len(),
            "Chunk processed"
        );

        Ok(RecorderOutput {
            raw_records_coin,
            lone_raw_records,
            lone_raw_record_statistics: summary.statistics,
        })
    }

    /// Process chunks in parallel, keeping input order
    ///
    /// Fails with the error of the first failing chunk in input order.
    pub fn process_chunks(&self, chunks: &[Chunk]) -> Result<Vec<RecorderOutput>> {
        let results: Vec<Result<RecorderOutput>> =
            chunks.par_iter().map(|c| self.process_chunk(c)).collect();

        let mut outputs = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    warn!(chunk = index, error = %e, "Chunk failed");
                    return Err(e);
                }
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nveto_common::options::ChannelMap;

    fn config(level: u32) -> RecorderConfig {
        RecorderConfig {
            coincidence_level: level,
            resolving_time: 10,
            nbaseline_samples: 2,
            n_lone_records: 0,
            channel_map: ChannelMap::new(0, 3),
            ..RecorderConfig::default()
        }
    }

    fn rec(time: i64, channel: i16) -> RawRecord {
        RawRecord::single(time, channel, 2, vec![100, 100, 90, 100])
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config(2);
        cfg.coincidence_level = 0;
        assert!(NvetoRecorder::new(cfg).is_err());
    }

    #[test]
    fn test_inverted_chunk_rejected() {
        let recorder = NvetoRecorder::new(config(2)).unwrap();
        let err = recorder.process_chunk(&Chunk::new(10, 0, vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_chunk_gives_degenerate_row() {
        let recorder = NvetoRecorder::new(config(2)).unwrap();
        let out = recorder.process_chunk(&Chunk::new(0, 100, vec![])).unwrap();
        assert!(out.raw_records_coin.is_empty());
        assert!(out.lone_raw_records.is_empty());
        assert_eq!(out.lone_raw_record_statistics.channel, vec![0, 1, 2, 3]);
        assert_eq!(out.lone_raw_record_statistics.nfragments, vec![0; 4]);
    }

    #[test]
    fn test_onefold_keeps_everything() {
        let recorder = NvetoRecorder::new(config(1)).unwrap();
        let chunk = Chunk::new(0, 100_000, vec![rec(5_000, 0), rec(50_000, 1)]);
        let out = recorder.process_chunk(&chunk).unwrap();
        assert_eq!(out.raw_records_coin, chunk.raw_records);
        assert_eq!(out.lone_raw_record_statistics.nfragments, vec![0; 4]);
    }

    #[test]
    fn test_twofold_split() {
        let recorder = NvetoRecorder::new(config(2)).unwrap();
        let chunk = Chunk::new(
            0,
            100_000,
            vec![rec(5_000, 0), rec(5_005, 1), rec(20_000, 2), rec(40_000, 3)],
        );
        let out = recorder.process_chunk(&chunk).unwrap();

        assert_eq!(out.raw_records_coin, chunk.raw_records[..2].to_vec());
        let stats = &out.lone_raw_record_statistics;
        assert_eq!(stats.nfragments, vec![0, 0, 1, 1]);
        // baseline 100 (flipped): one sample of 10
        assert_eq!(stats.lone_record_area, vec![0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_unsorted_records_rejected() {
        let recorder = NvetoRecorder::new(config(2)).unwrap();
        let chunk = Chunk::new(0, 100_000, vec![rec(500, 0), rec(100, 1)]);
        let err = recorder.process_chunk(&chunk).unwrap_err();
        assert!(matches!(err, Error::UnsortedRecords { index: 1, .. }));
    }

    #[test]
    fn test_overlap_check_can_be_disabled() {
        let chunk = Chunk::new(0, 100_000, vec![rec(5_000, 0), rec(5_002, 0)]);

        let recorder = NvetoRecorder::new(config(2)).unwrap();
        assert!(matches!(
            recorder.process_chunk(&chunk).unwrap_err(),
            Error::OverlappingRecords { channel: 0, .. }
        ));

        let mut cfg = config(2);
        cfg.check_overlaps = false;
        let recorder = NvetoRecorder::new(cfg).unwrap();
        assert_eq!(recorder.process_chunk(&chunk).unwrap().raw_records_coin.len(), 2);
    }

    #[test]
    fn test_kept_record_outside_channel_map_rejected() {
        // Channel 7 would be kept by the 2-fold coincidence
        let recorder = NvetoRecorder::new(config(2)).unwrap();
        let chunk = Chunk::new(0, 100_000, vec![rec(5_000, 0), rec(5_005, 7)]);
        assert!(matches!(
            recorder.process_chunk(&chunk).unwrap_err(),
            Error::ChannelOutOfRange { channel: 7, start: 0, end: 3 }
        ));
    }

    #[test]
    fn test_onefold_checks_channels() {
        let recorder = NvetoRecorder::new(config(1)).unwrap();

        let chunk = Chunk::new(0, 100_000, vec![rec(5_000, 0), rec(6_000, -1)]);
        assert!(matches!(
            recorder.process_chunk(&chunk).unwrap_err(),
            Error::NegativeChannel { index: 1, channel: -1 }
        ));

        let chunk = Chunk::new(0, 100_000, vec![rec(5_000, 4)]);
        assert!(matches!(
            recorder.process_chunk(&chunk).unwrap_err(),
            Error::ChannelOutOfRange { channel: 4, .. }
        ));
    }

    #[test]
    fn test_record_outside_chunk_rejected() {
        let recorder = NvetoRecorder::new(config(2)).unwrap();

        let before = Chunk::new(1_000, 100_000, vec![rec(500, 0), rec(505, 1)]);
        assert!(matches!(recorder.process_chunk(&before).unwrap_err(), Error::InvalidInput(_)));

        let after = Chunk::new(0, 1_000, vec![rec(500, 0), rec(1_001, 1)]);
        assert!(matches!(recorder.process_chunk(&after).unwrap_err(), Error::InvalidInput(_)));

        // A record exactly at either boundary is accepted
        let edges = Chunk::new(500, 1_000, vec![rec(500, 0), rec(1_000, 1)]);
        assert!(recorder.process_chunk(&edges).is_ok());
    }

    #[test]
    fn test_huge_resolving_time_rejected() {
        let mut cfg = config(2);
        cfg.resolving_time = i64::MAX;
        assert!(matches!(NvetoRecorder::new(cfg).unwrap_err(), Error::Config(_)));
    }
}
