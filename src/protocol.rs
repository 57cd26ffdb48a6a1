//! The underlying binary protocol of the configuration interface.
//!
//! Every exchange is a fixed 32-byte frame. Requests start with a version
//! byte and a command byte, followed by packed little-endian fields.
//! Responses have no header, their fields start at byte 0. Bytes 28..32 of
//! both directions hold the CRC-32 of bytes 0..28.

use std::vec;

use scroll::{LE, Pread, Pwrite};

use crate::constants::{MACRO_ITEMS_IN_PACKET, USAGE_RUNS_IN_PACKET, commands};
use crate::error::{Error, Result};
use crate::{FRAME_SIZE, checksum};

/// Offset of the trailing checksum; also the end of the field region.
pub const CHECKSUM_OFFSET: usize = FRAME_SIZE - 4;
const REQUEST_HEADER_SIZE: usize = 2;

pub type Frame = [u8; FRAME_SIZE];

/// Wire type of a frame field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    U32,
    I32,
}

impl FieldType {
    pub const fn width(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U32 | FieldType::I32 => 4,
        }
    }
}

/// A typed value carried in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    U8(u8),
    U32(u32),
    I32(i32),
}

impl Field {
    pub const fn field_type(&self) -> FieldType {
        match self {
            Field::U8(_) => FieldType::U8,
            Field::U32(_) => FieldType::U32,
            Field::I32(_) => FieldType::I32,
        }
    }
}

fn check_capacity(widths: impl Iterator<Item = usize>, start: usize) -> Result<()> {
    let needed: usize = widths.sum();
    let capacity = CHECKSUM_OFFSET - start;
    if needed > capacity {
        return Err(Error::FieldOverflow { needed, capacity });
    }
    Ok(())
}

fn write_fields(frame: &mut Frame, start: usize, fields: &[Field]) -> Result<()> {
    check_capacity(fields.iter().map(|f| f.field_type().width()), start)?;
    let mut offset = start;
    for field in fields {
        match *field {
            Field::U8(v) => frame.gwrite_with(v, &mut offset, LE)?,
            Field::U32(v) => frame.gwrite_with(v, &mut offset, LE)?,
            Field::I32(v) => frame.gwrite_with(v, &mut offset, LE)?,
        };
    }
    let crc = checksum::compute(frame, CHECKSUM_OFFSET);
    frame.pwrite_with(crc, CHECKSUM_OFFSET, LE)?;
    Ok(())
}

fn read_fields(frame: &Frame, start: usize, expected: &[FieldType]) -> Result<Vec<Field>> {
    check_capacity(expected.iter().map(|t| t.width()), start)?;
    let mut offset = start;
    let mut fields = Vec::with_capacity(expected.len());
    for ty in expected {
        fields.push(match ty {
            FieldType::U8 => Field::U8(frame.gread_with(&mut offset, LE)?),
            FieldType::U32 => Field::U32(frame.gread_with(&mut offset, LE)?),
            FieldType::I32 => Field::I32(frame.gread_with(&mut offset, LE)?),
        });
    }
    Ok(fields)
}

fn verify_checksum(frame: &Frame) -> Result<()> {
    let actual: u32 = frame.pread_with(CHECKSUM_OFFSET, LE)?;
    if !checksum::verify(frame, CHECKSUM_OFFSET, actual) {
        let expected = checksum::compute(frame, CHECKSUM_OFFSET);
        return Err(Error::Checksum { expected, actual });
    }
    Ok(())
}

/// Build a request frame: version, command, packed fields, checksum.
pub fn encode_request(version: u8, command: u8, fields: &[Field]) -> Result<Frame> {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = version;
    frame[1] = command;
    write_fields(&mut frame, REQUEST_HEADER_SIZE, fields)?;
    Ok(frame)
}

/// Parse a request frame into `(version, command, fields)`.
pub fn decode_request(frame: &Frame, expected: &[FieldType]) -> Result<(u8, u8, Vec<Field>)> {
    verify_checksum(frame)?;
    let fields = read_fields(frame, REQUEST_HEADER_SIZE, expected)?;
    Ok((frame[0], frame[1], fields))
}

/// Build a response frame, fields starting at byte 0.
pub fn encode_response(fields: &[Field]) -> Result<Frame> {
    let mut frame = [0u8; FRAME_SIZE];
    write_fields(&mut frame, 0, fields)?;
    Ok(frame)
}

/// Verify the checksum of a response, then read `expected` in order.
///
/// Responses are not self-describing; the caller must know the layout of the
/// reply to the request it sent.
pub fn decode_response(frame: &Frame, expected: &[FieldType]) -> Result<Vec<Field>> {
    verify_checksum(frame)?;
    read_fields(frame, 0, expected)
}

/// Sequential typed access to decoded fields.
struct Fields(vec::IntoIter<Field>);

impl Fields {
    fn new(fields: Vec<Field>) -> Self {
        Fields(fields.into_iter())
    }

    fn mismatch(found: Option<Field>, wanted: FieldType) -> Error {
        Error::Codec(scroll::Error::Custom(format!(
            "expected {:?} field, found {:?}",
            wanted, found
        )))
    }

    fn u8(&mut self) -> Result<u8> {
        match self.0.next() {
            Some(Field::U8(v)) => Ok(v),
            other => Err(Self::mismatch(other, FieldType::U8)),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        match self.0.next() {
            Some(Field::U32(v)) => Ok(v),
            other => Err(Self::mismatch(other, FieldType::U32)),
        }
    }

    fn i32(&mut self) -> Result<i32> {
        match self.0.next() {
            Some(Field::I32(v)) => Ok(v),
            other => Err(Self::mismatch(other, FieldType::I32)),
        }
    }
}

/// Configuration command, one per request frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Reboot into the UF2 bootloader.
    ///
    /// Connection will be lost, no response.
    ResetIntoBootsel,
    /// Set the global scalar settings.
    SetConfig {
        /// Bits 0..4: layers with unmapped passthrough
        flags: u8,
        partial_scroll_timeout: u32,
        interval_override: u8,
    },
    /// Answered with a [`ConfigHeader`].
    GetConfig,
    ClearMapping,
    AddMapping(MappingRecord),
    /// Answered with a [`MappingRecord`].
    GetMapping { index: u32 },
    /// Write the active configuration to flash.
    PersistConfig,
    /// Answered with a [`UsagePage`] of input usages.
    GetOurUsages { index: u32 },
    /// Answered with a [`UsagePage`] of output usages.
    GetTheirUsages { index: u32 },
    Suspend,
    Resume,
    PairNewDevice,
    ClearBonds,
    FlashBSide,
    ClearMacros,
    /// Append up to 6 flat macro items to a slot.
    AppendToMacro { slot: u8, usages: Vec<u32> },
    /// Answered with a [`MacroChunk`].
    GetMacro { slot: u32, offset: u32 },
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::ResetIntoBootsel => commands::RESET_INTO_BOOTSEL,
            Command::SetConfig { .. } => commands::SET_CONFIG,
            Command::GetConfig => commands::GET_CONFIG,
            Command::ClearMapping => commands::CLEAR_MAPPING,
            Command::AddMapping(_) => commands::ADD_MAPPING,
            Command::GetMapping { .. } => commands::GET_MAPPING,
            Command::PersistConfig => commands::PERSIST_CONFIG,
            Command::GetOurUsages { .. } => commands::GET_OUR_USAGES,
            Command::GetTheirUsages { .. } => commands::GET_THEIR_USAGES,
            Command::Suspend => commands::SUSPEND,
            Command::Resume => commands::RESUME,
            Command::PairNewDevice => commands::PAIR_NEW_DEVICE,
            Command::ClearBonds => commands::CLEAR_BONDS,
            Command::FlashBSide => commands::FLASH_B_SIDE,
            Command::ClearMacros => commands::CLEAR_MACROS,
            Command::AppendToMacro { .. } => commands::APPEND_TO_MACRO,
            Command::GetMacro { .. } => commands::GET_MACRO,
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        match self {
            Command::SetConfig {
                flags,
                partial_scroll_timeout,
                interval_override,
            } => vec![
                Field::U8(*flags),
                Field::U32(*partial_scroll_timeout),
                Field::U8(*interval_override),
            ],
            Command::AddMapping(record) => record.fields(),
            Command::GetMapping { index }
            | Command::GetOurUsages { index }
            | Command::GetTheirUsages { index } => vec![Field::U32(*index)],
            Command::AppendToMacro { slot, usages } => {
                // CMD, SLOT, COUNT, USAGES
                let mut fields = Vec::with_capacity(2 + usages.len());
                fields.push(Field::U8(*slot));
                fields.push(Field::U8(usages.len().min(u8::MAX as usize) as u8));
                fields.extend(usages.iter().map(|&u| Field::U32(u)));
                fields
            }
            Command::GetMacro { slot, offset } => vec![Field::U32(*slot), Field::U32(*offset)],
            _ => Vec::new(),
        }
    }

    pub fn into_raw(&self, version: u8) -> Result<Frame> {
        if let Command::AppendToMacro { usages, .. } = self {
            if usages.len() > MACRO_ITEMS_IN_PACKET {
                return Err(Error::FieldOverflow {
                    needed: 2 + usages.len() * FieldType::U32.width(),
                    capacity: CHECKSUM_OFFSET - REQUEST_HEADER_SIZE,
                });
            }
        }
        encode_request(version, self.code(), &self.fields())
    }

    /// Parse a request frame, returning the version it was stamped with.
    pub fn from_raw(frame: &Frame) -> Result<(u8, Command)> {
        use FieldType::*;

        let code = frame[1];
        let layout: &[FieldType] = match code {
            commands::SET_CONFIG => &[U8, U32, U8],
            commands::ADD_MAPPING => MappingRecord::FIELDS,
            commands::GET_MAPPING | commands::GET_OUR_USAGES | commands::GET_THEIR_USAGES => &[U32],
            commands::APPEND_TO_MACRO => &[U8, U8, U32, U32, U32, U32, U32, U32],
            commands::GET_MACRO => &[U32, U32],
            _ => &[],
        };
        let (version, _, fields) = decode_request(frame, layout)?;
        let mut f = Fields::new(fields);
        let cmd = match code {
            commands::RESET_INTO_BOOTSEL => Command::ResetIntoBootsel,
            commands::SET_CONFIG => Command::SetConfig {
                flags: f.u8()?,
                partial_scroll_timeout: f.u32()?,
                interval_override: f.u8()?,
            },
            commands::GET_CONFIG => Command::GetConfig,
            commands::CLEAR_MAPPING => Command::ClearMapping,
            commands::ADD_MAPPING => Command::AddMapping(MappingRecord::read(&mut f)?),
            commands::GET_MAPPING => Command::GetMapping { index: f.u32()? },
            commands::PERSIST_CONFIG => Command::PersistConfig,
            commands::GET_OUR_USAGES => Command::GetOurUsages { index: f.u32()? },
            commands::GET_THEIR_USAGES => Command::GetTheirUsages { index: f.u32()? },
            commands::SUSPEND => Command::Suspend,
            commands::RESUME => Command::Resume,
            commands::PAIR_NEW_DEVICE => Command::PairNewDevice,
            commands::CLEAR_BONDS => Command::ClearBonds,
            commands::FLASH_B_SIDE => Command::FlashBSide,
            commands::CLEAR_MACROS => Command::ClearMacros,
            commands::APPEND_TO_MACRO => {
                let slot = f.u8()?;
                let count = (f.u8()? as usize).min(MACRO_ITEMS_IN_PACKET);
                let mut usages = Vec::with_capacity(count);
                for _ in 0..count {
                    usages.push(f.u32()?);
                }
                Command::AppendToMacro { slot, usages }
            }
            commands::GET_MACRO => Command::GetMacro {
                slot: f.u32()?,
                offset: f.u32()?,
            },
            other => return Err(Error::UnknownCommand(other)),
        };
        Ok((version, cmd))
    }
}

/// Reply to [`Command::GetConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConfigHeader {
    /// Version the device actually speaks
    pub version: u8,
    pub flags: u8,
    pub partial_scroll_timeout: u32,
    pub mapping_count: u32,
    pub our_usage_count: u32,
    pub their_usage_count: u32,
    pub interval_override: u8,
}

impl ConfigHeader {
    pub const FIELDS: &'static [FieldType] = &[
        FieldType::U8,
        FieldType::U8,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
        FieldType::U8,
    ];

    pub fn from_raw(frame: &Frame) -> Result<Self> {
        let mut f = Fields::new(decode_response(frame, Self::FIELDS)?);
        Ok(ConfigHeader {
            version: f.u8()?,
            flags: f.u8()?,
            partial_scroll_timeout: f.u32()?,
            mapping_count: f.u32()?,
            our_usage_count: f.u32()?,
            their_usage_count: f.u32()?,
            interval_override: f.u8()?,
        })
    }

    pub fn into_raw(&self) -> Result<Frame> {
        encode_response(&[
            Field::U8(self.version),
            Field::U8(self.flags),
            Field::U32(self.partial_scroll_timeout),
            Field::U32(self.mapping_count),
            Field::U32(self.our_usage_count),
            Field::U32(self.their_usage_count),
            Field::U8(self.interval_override),
        ])
    }
}

/// Read only the leading version byte of a GET_CONFIG reply.
pub fn response_version(frame: &Frame) -> Result<u8> {
    let mut f = Fields::new(decode_response(frame, &[FieldType::U8])?);
    f.u8()
}

/// One mapping as it travels on the wire, in ADD_MAPPING and GET_MAPPING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MappingRecord {
    pub target_usage: u32,
    pub source_usage: u32,
    /// Fixed point, 1000 = 1.0
    pub scaling: i32,
    pub layer_mask: u8,
    pub flags: u8,
}

impl MappingRecord {
    pub const FIELDS: &'static [FieldType] = &[
        FieldType::U32,
        FieldType::U32,
        FieldType::I32,
        FieldType::U8,
        FieldType::U8,
    ];

    fn read(f: &mut Fields) -> Result<Self> {
        Ok(MappingRecord {
            target_usage: f.u32()?,
            source_usage: f.u32()?,
            scaling: f.i32()?,
            layer_mask: f.u8()?,
            flags: f.u8()?,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        vec![
            Field::U32(self.target_usage),
            Field::U32(self.source_usage),
            Field::I32(self.scaling),
            Field::U8(self.layer_mask),
            Field::U8(self.flags),
        ]
    }

    pub fn from_raw(frame: &Frame) -> Result<Self> {
        Self::read(&mut Fields::new(decode_response(frame, Self::FIELDS)?))
    }

    pub fn into_raw(&self) -> Result<Frame> {
        encode_response(&self.fields())
    }
}

/// Reply to [`Command::GetMacro`]: up to 6 flat macro items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacroChunk {
    /// Fewer than 6 marks the last chunk of a slot
    pub item_count: u8,
    pub usages: [u32; MACRO_ITEMS_IN_PACKET],
}

impl MacroChunk {
    const FIELDS: &'static [FieldType] = &[
        FieldType::U8,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
        FieldType::U32,
    ];

    pub fn new(items: &[u32]) -> Self {
        let n = items.len().min(MACRO_ITEMS_IN_PACKET);
        let mut usages = [0u32; MACRO_ITEMS_IN_PACKET];
        usages[..n].copy_from_slice(&items[..n]);
        MacroChunk {
            item_count: n as u8,
            usages,
        }
    }

    /// The valid items of this chunk.
    pub fn items(&self) -> &[u32] {
        &self.usages[..(self.item_count as usize).min(MACRO_ITEMS_IN_PACKET)]
    }

    pub fn is_last(&self) -> bool {
        (self.item_count as usize) < MACRO_ITEMS_IN_PACKET
    }

    pub fn from_raw(frame: &Frame) -> Result<Self> {
        let mut f = Fields::new(decode_response(frame, Self::FIELDS)?);
        let item_count = f.u8()?;
        let mut usages = [0u32; MACRO_ITEMS_IN_PACKET];
        for usage in usages.iter_mut() {
            *usage = f.u32()?;
        }
        Ok(MacroChunk { item_count, usages })
    }

    pub fn into_raw(&self) -> Result<Frame> {
        let mut fields = vec![Field::U8(self.item_count)];
        fields.extend(self.usages.iter().map(|&u| Field::U32(u)));
        encode_response(&fields)
    }
}

/// A contiguous run of usage codes reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UsageRange {
    /// 0 marks an empty slot
    pub start_usage: u32,
    pub count: u32,
}

impl UsageRange {
    pub fn is_empty_slot(&self) -> bool {
        self.start_usage == 0
    }

    /// Every usage in the run. A run never leaves the usage page it starts
    /// in, whatever count the device claims.
    pub fn usages(&self) -> impl Iterator<Item = u32> + use<> {
        let start = self.start_usage;
        let last = start | 0xffff;
        (0..self.count).map_while(move |k| start.checked_add(k).filter(|&u| u <= last))
    }
}

/// Reply to [`Command::GetOurUsages`] / [`Command::GetTheirUsages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UsagePage {
    pub runs: [UsageRange; USAGE_RUNS_IN_PACKET],
}

impl UsagePage {
    const FIELDS: &'static [FieldType] = &[FieldType::U32; 2 * USAGE_RUNS_IN_PACKET];

    pub fn from_raw(frame: &Frame) -> Result<Self> {
        let mut f = Fields::new(decode_response(frame, Self::FIELDS)?);
        let mut runs = [UsageRange::default(); USAGE_RUNS_IN_PACKET];
        for run in runs.iter_mut() {
            run.start_usage = f.u32()?;
            run.count = f.u32()?;
        }
        Ok(UsagePage { runs })
    }

    pub fn into_raw(&self) -> Result<Frame> {
        let fields: Vec<Field> = self
            .runs
            .iter()
            .flat_map(|r| [Field::U32(r.start_usage), Field::U32(r.count)])
            .collect();
        encode_response(&fields)
    }
}
