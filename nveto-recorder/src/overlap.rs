//! Per-record input checks: chunk bounds, channel range and
//! same-channel overlaps

use nveto_common::options::ChannelMap;
use nveto_common::{Error, Fragment, Result};
use std::collections::HashMap;

/// Reject fragments whose start time lies outside `[start, end]`
pub fn check_bounds<F: Fragment>(fragments: &[F], start: i64, end: i64) -> Result<()> {
    match fragments
        .iter()
        .enumerate()
        .find(|(_, f)| f.time() < start || f.time() > end)
    {
        Some((index, f)) => Err(Error::InvalidInput(format!(
            "record {} at {} outside chunk [{}, {}]",
            index,
            f.time(),
            start,
            end
        ))),
        None => Ok(()),
    }
}

/// Reject negative channels and channels outside `channel_map`
pub fn check_channels<F: Fragment>(fragments: &[F], channel_map: ChannelMap) -> Result<()> {
    for (index, fragment) in fragments.iter().enumerate() {
        let channel = fragment.channel();
        if channel < 0 {
            return Err(Error::NegativeChannel { index, channel });
        }
        if !channel_map.contains(channel) {
            return Err(Error::ChannelOutOfRange {
                channel,
                start: channel_map.start,
                end: channel_map.end,
            });
        }
    }
    Ok(())
}

/// Reject fragments that start before the previous fragment of their
/// channel has ended
///
/// Fragments must be sorted by time. A fragment starting exactly at the
/// previous end time is accepted.
pub fn check_overlaps<F: Fragment>(fragments: &[F]) -> Result<()> {
    let mut last_end: HashMap<i16, i64> = HashMap::new();

    for (index, fragment) in fragments.iter().enumerate() {
        let channel = fragment.channel();
        if let Some(&previous_endtime) = last_end.get(&channel) {
            if fragment.time() < previous_endtime {
                return Err(Error::OverlappingRecords {
                    channel,
                    index,
                    time: fragment.time(),
                    previous_endtime,
                });
            }
        }
        last_end.insert(channel, fragment.endtime());
    }

    Ok(())
}
