//! Common error types for the nVETO recorder

use thiserror::Error;

/// Common result type for nVETO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the nVETO crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON (de)serialization error for chunk files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input data or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Records are not sorted by time
    #[error("Records not sorted by time: record {index} at {time} follows {previous_time}")]
    UnsortedRecords {
        index: usize,
        time: i64,
        previous_time: i64,
    },

    /// Two records of the same channel overlap in time
    #[error("Overlapping records in channel {channel}: record {index} starts at {time} before previous record ends at {previous_endtime}")]
    OverlappingRecords {
        channel: i16,
        index: usize,
        time: i64,
        previous_endtime: i64,
    },

    /// Records with differing sample buffer sizes in one chunk
    #[error("Inconsistent fragment capacity: record {index} holds {found} samples, expected {expected}")]
    InconsistentCapacity {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Record with a negative channel number
    #[error("Negative channel number {channel} in record {index}")]
    NegativeChannel { index: usize, channel: i16 },

    /// Record channel outside the configured channel map
    #[error("Channel {channel} outside channel map [{start}, {end}]")]
    ChannelOutOfRange { channel: i16, start: i16, end: i16 },

    /// Link traversal across one pulse exceeded the iteration cap
    #[error("Runaway pulse chain: following links from record {index} (channel {channel}) exceeded {limit} fragments")]
    RunawayPulseChain {
        index: usize,
        channel: i16,
        limit: usize,
    },
}
