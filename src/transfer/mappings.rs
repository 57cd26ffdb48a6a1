//! Indexed fetch and clear-then-append replace of the mapping list.

use crate::config::{LayerSet, Mapping, Usage};
use crate::constants::STICKY_FLAG;
use crate::error::Result;
use crate::protocol::{Command, MappingRecord};
use crate::transport::Transport;

impl From<&Mapping> for MappingRecord {
    fn from(mapping: &Mapping) -> Self {
        MappingRecord {
            target_usage: mapping.target_usage.0,
            source_usage: mapping.source_usage.0,
            scaling: mapping.scaling,
            layer_mask: mapping.layers.mask(),
            flags: if mapping.sticky { STICKY_FLAG } else { 0 },
        }
    }
}

impl From<MappingRecord> for Mapping {
    fn from(record: MappingRecord) -> Self {
        Mapping {
            target_usage: Usage(record.target_usage),
            source_usage: Usage(record.source_usage),
            scaling: record.scaling,
            layers: LayerSet::from_mask(record.layer_mask),
            sticky: record.flags & STICKY_FLAG != 0,
        }
    }
}

/// Read `count` mappings by index, preserving device order.
pub fn fetch_mappings<T: Transport>(
    transport: &mut T,
    version: u8,
    count: u32,
) -> Result<Vec<Mapping>> {
    // count comes straight from the device; grow as records actually arrive
    let mut mappings = Vec::new();
    for index in 0..count {
        let resp = transport.transfer(version, Command::GetMapping { index })?;
        mappings.push(MappingRecord::from_raw(&resp)?.into());
    }
    log::debug!("Fetched {} mappings", mappings.len());
    Ok(mappings)
}

/// Clear the device's mapping list and append `mappings` in order.
///
/// Not atomic: a failure leaves the device with the mappings sent so far.
pub fn replace_mappings<T: Transport>(
    transport: &mut T,
    version: u8,
    mappings: &[Mapping],
) -> Result<()> {
    transport.send(version, Command::ClearMapping)?;
    for mapping in mappings {
        transport.send(version, Command::AddMapping(mapping.into()))?;
    }
    log::debug!("Sent {} mappings", mappings.len());
    Ok(())
}
