//! Recorder options
//!
//! All tunable recorder options live in one `RecorderConfig` struct that is
//! passed explicitly into the recorder's constructor. Option metadata
//! (key, type, default, description, valid range, validator) is kept in a
//! single table so that TOML loading, setters and string overrides from the
//! command line share one set of validators.
//!
//! # Usage
//!
//! ```rust
//! use nveto_common::options::RecorderConfig;
//!
//! let mut config = RecorderConfig::default();
//! config.set_resolving_time(300).unwrap();
//! config.apply("n_lone_records", "5").unwrap();
//! assert!(config.validate().is_ok());
//! assert!(config.set_coincidence_level(0).is_err());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted resolving_time (ns), one second
pub const MAX_RESOLVING_TIME: i64 = 1_000_000_000;

/// Inclusive channel range of the detector subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    pub start: i16,
    pub end: i16,
}

impl ChannelMap {
    pub fn new(start: i16, end: i16) -> Self {
        Self { start, end }
    }

    /// Number of channels covered (0 for an inverted range)
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end as i32 - self.start as i32 + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, channel: i16) -> bool {
        (self.start..=self.end).contains(&channel)
    }

    /// Offset of `channel` within the map
    pub fn offset(&self, channel: i16) -> Option<usize> {
        if self.contains(channel) {
            Some((channel as i32 - self.start as i32) as usize)
        } else {
            None
        }
    }
}

impl Default for ChannelMap {
    /// Neutron-veto PMT channels
    fn default() -> Self {
        Self {
            start: 2000,
            end: 2119,
        }
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for ChannelMap {
    type Err = String;

    /// Parse "START-END"
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("channel_map: expected START-END, got '{}'", s))?;
        let start: i16 = start
            .trim()
            .parse()
            .map_err(|_| "channel_map: invalid start channel".to_string())?;
        let end: i16 = end
            .trim()
            .parse()
            .map_err(|_| "channel_map: invalid end channel".to_string())?;
        Ok(Self { start, end })
    }
}

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Number of fragments that must fall within the resolving time
    ///
    /// Valid range: >= 1
    /// Default: 4
    pub coincidence_level: u32,

    /// Maximum elapsed time (ns) across `coincidence_level` fragments
    ///
    /// Valid range: 0..=[`MAX_RESOLVING_TIME`]
    /// Default: 600 ns
    pub resolving_time: i64,

    /// Samples at the start of a pulse used to estimate its baseline
    ///
    /// Valid range: >= 1 (and at most the fragment capacity)
    /// Default: 10
    pub nbaseline_samples: usize,

    /// Lone pulses per channel kept verbatim for diagnostics
    ///
    /// Default: 2
    pub n_lone_records: usize,

    /// Number of channels; derived from `channel_map` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_channels: Option<usize>,

    /// Reject chunks with overlapping records in one channel
    ///
    /// Default: true
    pub check_overlaps: bool,

    /// Flip the waveform when subtracting the baseline (negative pulses)
    ///
    /// Default: true
    pub flip_baseline: bool,

    /// Channel range of the subsystem
    ///
    /// Kept last so it serializes as a trailing `[recorder.channel_map]` table.
    /// Default: 2000-2119
    pub channel_map: ChannelMap,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            coincidence_level: 4,
            resolving_time: 600,
            nbaseline_samples: 10,
            n_lone_records: 2,
            n_channels: None,
            check_overlaps: true,
            flip_baseline: true,
            channel_map: ChannelMap::default(),
        }
    }
}

/// Metadata for a single recorder option
///
/// Validators take the option's string form and return
/// `Err("{key}: {reason}")` when the value is rejected.
pub struct OptionMetadata {
    pub key: &'static str,
    pub data_type: &'static str,
    pub default_value: &'static str,
    pub description: &'static str,
    pub validation_range: &'static str,
    pub validator: fn(&str) -> std::result::Result<(), String>,
}

fn parse_bool(key: &str, s: &str) -> std::result::Result<bool, String> {
    match s.trim() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("{}: invalid boolean '{}'", key, other)),
    }
}

impl RecorderConfig {
    /// Metadata for every recorder option
    pub fn metadata() -> &'static [OptionMetadata] {
        &[
            OptionMetadata {
                key: "coincidence_level",
                data_type: "u32",
                default_value: "4",
                description: "Fragments required within the resolving time to form a coincidence",
                validation_range: ">= 1",
                validator: |s| {
                    let v: i64 = s.trim().parse()
                        .map_err(|_| "coincidence_level: invalid number format".to_string())?;
                    if v < 1 || v > u32::MAX as i64 {
                        return Err(format!("coincidence_level: value {} must be at least 1", v));
                    }
                    Ok(())
                },
            },
            OptionMetadata {
                key: "resolving_time",
                data_type: "i64",
                default_value: "600",
                description: "Maximum elapsed time (ns) across coincidence_level fragments",
                validation_range: "0..=1000000000",
                validator: |s| {
                    let v: i64 = s.trim().parse()
                        .map_err(|_| "resolving_time: invalid number format".to_string())?;
                    if v < 0 {
                        return Err(format!("resolving_time: value {} must not be negative", v));
                    }
                    if v > MAX_RESOLVING_TIME {
                        return Err(format!(
                            "resolving_time: value {} exceeds maximum {}",
                            v, MAX_RESOLVING_TIME
                        ));
                    }
                    Ok(())
                },
            },
            OptionMetadata {
                key: "nbaseline_samples",
                data_type: "usize",
                default_value: "10",
                description: "Samples used to estimate the baseline of lone records",
                validation_range: ">= 1",
                validator: |s| {
                    let v: usize = s.trim().parse()
                        .map_err(|_| "nbaseline_samples: invalid number format".to_string())?;
                    if v == 0 {
                        return Err("nbaseline_samples: value 0 must be at least 1".to_string());
                    }
                    Ok(())
                },
            },
            OptionMetadata {
                key: "n_lone_records",
                data_type: "usize",
                default_value: "2",
                description: "Lone pulses per channel retained verbatim for diagnostics",
                validation_range: ">= 0",
                validator: |s| {
                    s.trim().parse::<usize>()
                        .map(|_| ())
                        .map_err(|_| "n_lone_records: invalid number format".to_string())
                },
            },
            OptionMetadata {
                key: "channel_map",
                data_type: "START-END",
                default_value: "2000-2119",
                description: "Inclusive channel range of the neutron-veto subsystem",
                validation_range: "0 <= START <= END",
                validator: |s| {
                    let map: ChannelMap = s.parse()?;
                    if map.start < 0 {
                        return Err(format!("channel_map: start channel {} is negative", map.start));
                    }
                    if map.end < map.start {
                        return Err(format!("channel_map: end {} before start {}", map.end, map.start));
                    }
                    Ok(())
                },
            },
            OptionMetadata {
                key: "n_channels",
                data_type: "usize",
                default_value: "120",
                description: "Number of channels; must match channel_map when set",
                validation_range: ">= 1",
                validator: |s| {
                    let v: usize = s.trim().parse()
                        .map_err(|_| "n_channels: invalid number format".to_string())?;
                    if v == 0 {
                        return Err("n_channels: value 0 must be at least 1".to_string());
                    }
                    Ok(())
                },
            },
            OptionMetadata {
                key: "check_overlaps",
                data_type: "bool",
                default_value: "true",
                description: "Reject chunks in which records of one channel overlap",
                validation_range: "true/false",
                validator: |s| parse_bool("check_overlaps", s).map(|_| ()),
            },
            OptionMetadata {
                key: "flip_baseline",
                data_type: "bool",
                default_value: "true",
                description: "Flip waveforms when subtracting the baseline",
                validation_range: "true/false",
                validator: |s| parse_bool("flip_baseline", s).map(|_| ()),
            },
        ]
    }

    fn check(key: &str, value: &str) -> Result<()> {
        let meta = Self::metadata()
            .iter()
            .find(|m| m.key == key)
            .ok_or_else(|| Error::Config(format!("unknown option '{}'", key)))?;
        (meta.validator)(value).map_err(Error::Config)
    }

    /// Validate and update coincidence_level
    pub fn set_coincidence_level(&mut self, value: u32) -> Result<()> {
        Self::check("coincidence_level", &value.to_string())?;
        self.coincidence_level = value;
        Ok(())
    }

    /// Validate and update resolving_time
    pub fn set_resolving_time(&mut self, value: i64) -> Result<()> {
        Self::check("resolving_time", &value.to_string())?;
        self.resolving_time = value;
        Ok(())
    }

    /// Validate and update nbaseline_samples
    pub fn set_nbaseline_samples(&mut self, value: usize) -> Result<()> {
        Self::check("nbaseline_samples", &value.to_string())?;
        self.nbaseline_samples = value;
        Ok(())
    }

    /// Update n_lone_records
    pub fn set_n_lone_records(&mut self, value: usize) -> Result<()> {
        Self::check("n_lone_records", &value.to_string())?;
        self.n_lone_records = value;
        Ok(())
    }

    /// Validate and update channel_map
    pub fn set_channel_map(&mut self, value: ChannelMap) -> Result<()> {
        Self::check("channel_map", &value.to_string())?;
        self.channel_map = value;
        Ok(())
    }

    /// Apply an option given as strings, e.g. from a `KEY=VALUE` override
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        Self::check(key, value)?;
        let invalid = |_| Error::Config(format!("{}: invalid value '{}'", key, value));
        match key {
            "coincidence_level" => self.coincidence_level = value.trim().parse().map_err(invalid)?,
            "resolving_time" => self.resolving_time = value.trim().parse().map_err(invalid)?,
            "nbaseline_samples" => self.nbaseline_samples = value.trim().parse().map_err(invalid)?,
            "n_lone_records" => self.n_lone_records = value.trim().parse().map_err(invalid)?,
            "n_channels" => self.n_channels = Some(value.trim().parse().map_err(invalid)?),
            "channel_map" => self.channel_map = value.parse().map_err(Error::Config)?,
            "check_overlaps" => self.check_overlaps = parse_bool(key, value).map_err(Error::Config)?,
            "flip_baseline" => self.flip_baseline = parse_bool(key, value).map_err(Error::Config)?,
            _ => return Err(Error::Config(format!("unknown option '{}'", key))),
        }
        Ok(())
    }

    /// Number of channels in the subsystem
    pub fn n_channels(&self) -> usize {
        self.n_channels.unwrap_or_else(|| self.channel_map.len())
    }

    /// Validate every option and the cross-option constraints
    ///
    /// Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        Self::check("coincidence_level", &self.coincidence_level.to_string())?;
        Self::check("resolving_time", &self.resolving_time.to_string())?;
        Self::check("nbaseline_samples", &self.nbaseline_samples.to_string())?;
        Self::check("n_lone_records", &self.n_lone_records.to_string())?;
        Self::check("channel_map", &self.channel_map.to_string())?;

        if let Some(n) = self.n_channels {
            Self::check("n_channels", &n.to_string())?;
            if n != self.channel_map.len() {
                return Err(Error::Config(format!(
                    "n_channels: value {} does not match channel_map {} ({} channels)",
                    n,
                    self.channel_map,
                    self.channel_map.len()
                )));
            }
        }
        Ok(())
    }
}
