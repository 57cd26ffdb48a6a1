//! Macro transfer.
//!
//! A macro slot travels as one flat list of usages in which a zero usage
//! separates consecutive chords. The list is moved 6 items per request.
//!
//! A slot holding a single empty chord flattens to nothing and comes back
//! as an empty slot, as does any chord containing usage 0.

use crate::config::{Chord, MacroSlot, Usage};
use crate::constants::{MACRO_ITEMS_IN_PACKET, NMACROS};
use crate::error::Result;
use crate::protocol::{Command, MacroChunk};
use crate::transport::Transport;

/// Flatten chords with a zero between consecutive chords.
///
/// `[[a], [], [b, c]]` becomes `[a, 0, 0, b, c]`.
pub fn flatten(slot: &MacroSlot) -> Vec<u32> {
    let mut flat = Vec::new();
    for (i, chord) in slot.chords().iter().enumerate() {
        if i > 0 {
            flat.push(0);
        }
        flat.extend(chord.iter().map(|u| u.0));
    }
    flat
}

/// Rebuilds chords from the flat items of successive GET_MACRO replies.
#[derive(Debug, Default)]
pub struct ChordAssembler {
    chords: Vec<Chord>,
}

impl ChordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, items: &[u32]) {
        if self.chords.is_empty() && !items.is_empty() {
            self.chords.push(Chord::new());
        }
        for &usage in items {
            if usage == 0 {
                self.chords.push(Chord::new());
            } else if let Some(chord) = self.chords.last_mut() {
                chord.push(Usage(usage));
            }
        }
    }

    pub fn finish(self) -> MacroSlot {
        MacroSlot(self.chords)
    }
}

/// Read one macro slot, chunk by chunk, until a short chunk arrives.
pub fn fetch_macro<T: Transport>(transport: &mut T, version: u8, slot: u32) -> Result<MacroSlot> {
    let mut assembler = ChordAssembler::new();
    let mut offset = 0u32;
    loop {
        let resp = transport.transfer(version, Command::GetMacro { slot, offset })?;
        let chunk = MacroChunk::from_raw(&resp)?;
        assembler.push(chunk.items());
        if chunk.is_last() {
            break;
        }
        match offset.checked_add(MACRO_ITEMS_IN_PACKET as u32) {
            Some(next) => offset = next,
            None => break,
        }
    }
    Ok(assembler.finish())
}

/// Read all macro slots.
pub fn fetch_macros<T: Transport>(transport: &mut T, version: u8) -> Result<Vec<MacroSlot>> {
    let macros = (0..NMACROS as u32)
        .map(|slot| fetch_macro(&mut *transport, version, slot))
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "Fetched {} macros, {} non-empty",
        macros.len(),
        macros.iter().filter(|m| !m.is_empty()).count()
    );
    Ok(macros)
}

/// Clear all device macros, then append each slot in chunks of 6.
///
/// Only the first [`NMACROS`] slots are sent.
pub fn replace_macros<T: Transport>(
    transport: &mut T,
    version: u8,
    macros: &[MacroSlot],
) -> Result<()> {
    transport.send(version, Command::ClearMacros)?;
    if macros.len() > NMACROS {
        log::warn!(
            "Only {} macros fit on the device, dropping {}",
            NMACROS,
            macros.len() - NMACROS
        );
    }
    for (slot, m) in macros.iter().take(NMACROS).enumerate() {
        for chunk in flatten(m).chunks(MACRO_ITEMS_IN_PACKET) {
            transport.send(
                version,
                Command::AppendToMacro {
                    slot: slot as u8,
                    usages: chunk.to_vec(),
                },
            )?;
        }
    }
    Ok(())
}
