//! Enumeration of the usages a device accepts.
//!
//! The device reports its input ("our") and output ("their") usages as
//! run-length lists, 3 runs per reply. Only usages missing from the
//! caller's static catalog are of interest.

use std::collections::{BTreeSet, HashSet};

use crate::config::Usage;
use crate::constants::USAGE_RUNS_IN_PACKET;
use crate::error::Result;
use crate::protocol::{Command, UsagePage, UsageRange};
use crate::transport::Transport;

/// A set of usages already known by name.
pub trait UsageCatalog {
    fn contains_usage(&self, usage: Usage) -> bool;
}

impl UsageCatalog for BTreeSet<Usage> {
    fn contains_usage(&self, usage: Usage) -> bool {
        self.contains(&usage)
    }
}

impl UsageCatalog for HashSet<Usage> {
    fn contains_usage(&self, usage: Usage) -> bool {
        self.contains(&usage)
    }
}

impl UsageCatalog for [Usage] {
    fn contains_usage(&self, usage: Usage) -> bool {
        self.contains(&usage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageDirection {
    /// Usages the device accepts as input
    Ours,
    /// Usages the device can output
    Theirs,
}

impl UsageDirection {
    fn command(self, index: u32) -> Command {
        match self {
            UsageDirection::Ours => Command::GetOurUsages { index },
            UsageDirection::Theirs => Command::GetTheirUsages { index },
        }
    }
}

/// Page through `rle_count` runs (as reported by GET_CONFIG), skipping empty slots.
pub fn fetch_usage_ranges<T: Transport>(
    transport: &mut T,
    version: u8,
    direction: UsageDirection,
    rle_count: u32,
) -> Result<Vec<UsageRange>> {
    let mut ranges = Vec::new();
    let mut index = 0u32;
    while index < rle_count {
        let resp = transport.transfer(version, direction.command(index))?;
        let page = UsagePage::from_raw(&resp)?;
        ranges.extend(page.runs.iter().filter(|r| !r.is_empty_slot()));
        index = index.saturating_add(USAGE_RUNS_IN_PACKET as u32);
    }
    log::debug!("{:?} usages: {} runs", direction, ranges.len());
    Ok(ranges)
}

/// Expand runs into the sorted set of usages neither catalogued nor ignored.
pub fn collect_extra_usages<C, I>(ranges: &[UsageRange], catalog: &C, ignored: &I) -> BTreeSet<Usage>
where
    C: UsageCatalog + ?Sized,
    I: UsageCatalog + ?Sized,
{
    ranges
        .iter()
        .filter(|r| !r.is_empty_slot())
        .flat_map(UsageRange::usages)
        .map(Usage)
        .filter(|&u| !catalog.contains_usage(u) && !ignored.contains_usage(u))
        .collect()
}
