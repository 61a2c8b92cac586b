//! # nVETO Common Library
//!
//! Shared code for the nVETO recorder crates including:
//! - Pulse fragment data model (raw records and baseline-processed records)
//! - Record links between fragments of one pulse
//! - Error types
//! - Configuration loading and config file resolution
//! - Recorder option metadata and validation

pub mod config;
pub mod error;
pub mod options;
pub mod records;

pub use error::{Error, Result};
pub use records::{Fragment, RawRecord, Record, RecordLinks};
