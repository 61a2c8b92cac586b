//! Test Helper Utilities
//!
//! Synthetic chunk generation for nveto-recorder tests

#![allow(dead_code)]

use nveto_common::RawRecord;
use nveto_recorder::Chunk;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Samples per fragment
pub const CAPACITY: usize = 16;
/// Sample period (ns)
pub const DT: i16 = 2;
pub const BASELINE: i16 = 16000;

/// Configuration for generated chunks
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub seed: u64,
    pub start: i64,
    pub end: i64,
    /// Attempted pulses; pulses that would overlap on their channel are dropped
    pub pulses: usize,
    pub first_channel: i16,
    pub n_channels: i16,
    pub max_fragments_per_pulse: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start: 0,
            end: 200_000,
            pulses: 400,
            first_channel: 2000,
            n_channels: 120,
            max_fragments_per_pulse: 3,
        }
    }
}

/// Build one pulse, split into fragments of `CAPACITY` samples
pub fn pulse(time: i64, channel: i16, samples: usize, amplitude: i16) -> Vec<RawRecord> {
    let n_fragments = samples.div_ceil(CAPACITY).max(1);
    (0..n_fragments)
        .map(|k| {
            let length = (samples - k * CAPACITY).min(CAPACITY);
            let mut data = vec![0i16; CAPACITY];
            for (j, s) in data.iter_mut().take(length).enumerate() {
                // negative-going pulse after a flat stretch in the first fragment
                let dip = if k == 0 && j < 4 { 0 } else { amplitude };
                *s = BASELINE - dip;
            }
            RawRecord {
                time: time + (k * CAPACITY) as i64 * DT as i64,
                length: length as i32,
                dt: DT,
                channel,
                pulse_length: samples as i32,
                record_i: k as i16,
                data,
            }
        })
        .collect()
}

/// Sort fragments by time, keeping insertion order for equal times
pub fn sorted(mut records: Vec<RawRecord>) -> Vec<RawRecord> {
    records.sort_by_key(|r| r.time);
    records
}

/// Random chunk with multi-fragment pulses and no same-channel overlap
pub fn generate_chunk(config: &ChunkConfig) -> Chunk {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut channel_free = vec![i64::MIN; config.n_channels as usize];
    let mut records = Vec::new();

    let span = config.end - config.start;
    let mut times: Vec<i64> = (0..config.pulses)
        .map(|_| config.start + rng.gen_range(0..span))
        .collect();
    times.sort_unstable();

    for time in times {
        let offset = rng.gen_range(0..config.n_channels);
        let n_fragments = rng.gen_range(1..=config.max_fragments_per_pulse);
        let samples = (n_fragments - 1) * CAPACITY + rng.gen_range(4..=CAPACITY);
        let end = time + samples as i64 * DT as i64;

        let slot = &mut channel_free[offset as usize];
        if time < *slot || end > config.end {
            continue;
        }
        // Reserve whole fragment buffers so a later pulse never looks like a continuation
        *slot = time + (n_fragments * CAPACITY) as i64 * DT as i64 + 1;

        let amplitude = rng.gen_range(5..500);
        records.extend(pulse(time, config.first_channel + offset, samples, amplitude));
    }

    Chunk::new(config.start, config.end, sorted(records))
}

/// Records clustered so that coincidences certainly occur
pub fn burst(time: i64, channels: &[i16], spacing: i64) -> Vec<RawRecord> {
    channels
        .iter()
        .enumerate()
        .flat_map(|(k, &ch)| pulse(time + k as i64 * spacing, ch, CAPACITY, 100))
        .collect()
}
