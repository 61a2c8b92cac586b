//! nveto-recorder library
//!
//! Software coincidence trigger for neutron-veto raw records. Each chunk of
//! time-sorted PMT fragments is split into records that belong to an
//! n-fold coincidence, which are kept, and lone records, which are reduced
//! to per-channel statistics plus a small verbatim sample.

pub mod baseline;
pub mod coincidence;
pub mod io;
pub mod lone;
pub mod overlap;
pub mod recorder;
pub mod split;

pub use baseline::{Baseliner, FirstSamplesBaseline};
pub use coincidence::Interval;
pub use lone::{LoneRecordStatistics, LoneRecordSummary, NO_DATA};
pub use recorder::{Chunk, NvetoRecorder, RecorderOutput};
