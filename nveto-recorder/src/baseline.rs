//! Baseline subtraction and integration of lone fragments
//!
//! Lone fragments are baselined before summarization so their area and
//! baseline statistics can be reported. The step sits behind the
//! [`Baseliner`] trait; [`FirstSamplesBaseline`] is the default.

use nveto_common::records::fragment_capacity;
use nveto_common::{Error, RawRecord, Record, RecordLinks, Result};

/// Converts raw fragments into baseline-subtracted, integrated records
///
/// Output must have one record per input fragment, in input order.
pub trait Baseliner: Send + Sync {
    fn process(&self, raw: &[RawRecord]) -> Result<Vec<Record>>;
}

/// Baseline from the mean of the first samples of each pulse
///
/// **Per fragment:**
/// - First fragment of a pulse: mean and RMS of its first `baseline_samples`
///   valid samples
/// - Continuation fragment: reuses the baseline of the fragment it continues
/// - Samples past `length` are zeroed
/// - Remaining samples become `baseline - sample` (flipped) or
///   `sample - baseline`, and `area` is their rounded sum
#[derive(Debug, Clone, PartialEq)]
pub struct FirstSamplesBaseline {
    baseline_samples: usize,
    flip: bool,
}

impl FirstSamplesBaseline {
    /// Create a baseliner
    ///
    /// # Errors
    /// [`Error::Config`] if `baseline_samples` is 0
    pub fn new(baseline_samples: usize, flip: bool) -> Result<Self> {
        if baseline_samples == 0 {
            return Err(Error::Config(
                "nbaseline_samples: value 0 must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            baseline_samples,
            flip,
        })
    }

    pub fn baseline_samples(&self) -> usize {
        self.baseline_samples
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    /// Mean and RMS deviation of the leading samples
    fn estimate(&self, samples: &[i16]) -> (f64, f64) {
        let n = self.baseline_samples.min(samples.len());
        if n == 0 {
            return (0.0, 0.0);
        }
        let window = &samples[..n];
        let mean = window.iter().map(|&s| s as f64).sum::<f64>() / n as f64;
        let variance = window
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64;
        (mean, variance.sqrt())
    }
}

impl Default for FirstSamplesBaseline {
    fn default() -> Self {
        Self {
            baseline_samples: 10,
            flip: true,
        }
    }
}

impl Baseliner for FirstSamplesBaseline {
    fn process(&self, raw: &[RawRecord]) -> Result<Vec<Record>> {
        if let Some(capacity) = fragment_capacity(raw)? {
            if self.baseline_samples > capacity {
                return Err(Error::Config(format!(
                    "nbaseline_samples: value {} exceeds record capacity {}",
                    self.baseline_samples, capacity
                )));
            }
        }
        let links = RecordLinks::compute(raw)?;

        let mut out: Vec<Record> = Vec::with_capacity(raw.len());
        for (i, r) in raw.iter().enumerate() {
            let valid = (r.length.max(0) as usize).min(r.data.len());

            let (baseline, rms) = match links.previous(i) {
                Some(p) => (out[p].baseline as f64, out[p].baseline_rms as f64),
                None => self.estimate(&r.data[..valid]),
            };

            let mut record = Record::header_from(r);
            let mut area = 0.0f64;
            for (dst, &s) in record.data.iter_mut().zip(&r.data[..valid]) {
                let v = if self.flip {
                    baseline - s as f64
                } else {
                    s as f64 - baseline
                };
                area += v;
                *dst = v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            }

            record.baseline = baseline as f32;
            record.baseline_rms = rms as f32;
            record.area = area.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            out.push(record);
        }

        Ok(out)
    }
}
