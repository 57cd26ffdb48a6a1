//! In-process stand-in for a HID Remapper, implementing the firmware side
//! of the configuration protocol.

#![allow(dead_code)]

use hid_remapper_config::checksum;
use hid_remapper_config::constants::{CONFIG_VERSION, MACRO_ITEMS_IN_PACKET, NMACROS, USAGE_RUNS_IN_PACKET};
use hid_remapper_config::protocol::{
    CHECKSUM_OFFSET, ConfigHeader, MacroChunk, MappingRecord, UsagePage, UsageRange, encode_response,
};
use hid_remapper_config::{Command, Error, FRAME_SIZE, Frame, Result, Transport};

pub struct SimulatedDevice {
    pub version: u8,
    pub flags: u8,
    pub partial_scroll_timeout: u32,
    pub interval_override: u8,
    pub mappings: Vec<MappingRecord>,
    pub macros: Vec<Vec<Vec<u32>>>,
    pub our_usages: Vec<UsageRange>,
    pub their_usages: Vec<UsageRange>,
    pub suspended: bool,
    pub persisted: usize,
    /// Every accepted command, in order
    pub log: Vec<Command>,
    /// Unplug after this many requests
    pub detach_after: Option<usize>,
    /// Report this for every count in the GET_CONFIG reply
    pub reported_count: Option<u32>,
    /// Flip a bit in every response once this many requests were served
    pub corrupt_after: Option<usize>,
    /// Reply to the next GET_REPORT
    pub pending: Option<Frame>,
    /// Requests served so far
    pub requests: usize,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        SimulatedDevice {
            version: CONFIG_VERSION,
            flags: 0x0f,
            partial_scroll_timeout: 1_000_000,
            interval_override: 0,
            mappings: Vec::new(),
            macros: vec![Vec::new(); NMACROS],
            our_usages: Vec::new(),
            their_usages: Vec::new(),
            suspended: false,
            persisted: 0,
            log: Vec::new(),
            detach_after: None,
            reported_count: None,
            corrupt_after: None,
            pending: None,
            requests: 0,
        }
    }
}

/// What the firmware answers after a request it refused.
pub fn rejected_frame() -> Frame {
    let mut frame = [0xff; FRAME_SIZE];
    let crc = checksum::compute(&frame, CHECKSUM_OFFSET);
    frame[CHECKSUM_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    frame
}

impl SimulatedDevice {
    pub fn with_version(version: u8) -> Self {
        SimulatedDevice {
            version,
            ..Default::default()
        }
    }

    fn detached(&self) -> bool {
        self.detach_after.is_some_and(|n| self.requests >= n)
    }

    fn flat_macro(&self, slot: usize) -> Vec<u32> {
        let mut flat = Vec::new();
        for (i, chord) in self.macros[slot].iter().enumerate() {
            if i > 0 {
                flat.push(0);
            }
            flat.extend(chord);
        }
        flat
    }

    fn usage_page(runs: &[UsageRange], index: u32) -> Frame {
        let mut page = UsagePage::default();
        for (i, run) in runs
            .iter()
            .skip(index as usize)
            .take(USAGE_RUNS_IN_PACKET)
            .enumerate()
        {
            page.runs[i] = *run;
        }
        page.into_raw().unwrap()
    }

    fn handle(&mut self, cmd: &Command) -> Frame {
        let empty = encode_response(&[]).unwrap();
        match cmd {
            Command::GetConfig => ConfigHeader {
                version: self.version,
                flags: self.flags,
                partial_scroll_timeout: self.partial_scroll_timeout,
                mapping_count: self.reported_count.unwrap_or(self.mappings.len() as u32),
                our_usage_count: self.reported_count.unwrap_or(self.our_usages.len() as u32),
                their_usage_count: self
                    .reported_count
                    .unwrap_or(self.their_usages.len() as u32),
                interval_override: self.interval_override,
            }
            .into_raw()
            .unwrap(),
            Command::SetConfig {
                flags,
                partial_scroll_timeout,
                interval_override,
            } => {
                self.flags = *flags & 0x0f;
                self.partial_scroll_timeout = *partial_scroll_timeout;
                self.interval_override = *interval_override;
                empty
            }
            Command::ClearMapping => {
                self.mappings.clear();
                empty
            }
            Command::AddMapping(record) => {
                self.mappings.push(*record);
                empty
            }
            Command::GetMapping { index } => self
                .mappings
                .get(*index as usize)
                .copied()
                .unwrap_or_default()
                .into_raw()
                .unwrap(),
            Command::GetOurUsages { index } => Self::usage_page(&self.our_usages, *index),
            Command::GetTheirUsages { index } => Self::usage_page(&self.their_usages, *index),
            Command::PersistConfig => {
                self.persisted += 1;
                empty
            }
            Command::Suspend => {
                self.suspended = true;
                empty
            }
            Command::Resume => {
                self.suspended = false;
                empty
            }
            Command::ClearMacros => {
                self.macros.iter_mut().for_each(Vec::clear);
                empty
            }
            Command::AppendToMacro { slot, usages } => {
                if let Some(m) = self.macros.get_mut(*slot as usize) {
                    if m.is_empty() {
                        m.push(Vec::new());
                    }
                    for &usage in usages {
                        match (usage, m.last_mut()) {
                            (0, _) => m.push(Vec::new()),
                            (u, Some(chord)) => chord.push(u),
                            (_, None) => unreachable!(),
                        }
                    }
                }
                empty
            }
            Command::GetMacro { slot, offset } => {
                let slot = *slot as usize;
                if slot >= NMACROS {
                    return empty;
                }
                let flat = self.flat_macro(slot);
                let start = (*offset as usize).min(flat.len());
                let end = (start + MACRO_ITEMS_IN_PACKET).min(flat.len());
                MacroChunk::new(&flat[start..end]).into_raw().unwrap()
            }
            Command::ResetIntoBootsel
            | Command::PairNewDevice
            | Command::ClearBonds
            | Command::FlashBSide => empty,
        }
    }
}

impl Transport for SimulatedDevice {
    fn send_raw(&mut self, frame: &Frame) -> Result<()> {
        if self.detached() {
            return Err(Error::DeviceGone);
        }
        self.requests += 1;
        self.pending = Some(match Command::from_raw(frame) {
            Ok((version, cmd)) if version == self.version => {
                let resp = self.handle(&cmd);
                self.log.push(cmd);
                resp
            }
            _ => rejected_frame(),
        });
        Ok(())
    }

    fn recv_raw(&mut self) -> Result<Frame> {
        if self.detached() {
            return Err(Error::DeviceGone);
        }
        let mut frame = self
            .pending
            .take()
            .unwrap_or_else(|| encode_response(&[]).unwrap());
        if self.corrupt_after.is_some_and(|n| self.requests > n) {
            frame[5] ^= 0x20;
        }
        Ok(frame)
    }
}
