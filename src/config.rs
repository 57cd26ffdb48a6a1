//! In-memory remapping configuration and its persisted JSON shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_VERSION, DEFAULT_PARTIAL_SCROLL_TIMEOUT, DEFAULT_SCALING, NLAYERS, NMACROS,
    UNMAPPED_PASSTHROUGH_MASK,
};
use crate::error::{Error, Result};

/// 32-bit HID usage: usage page in the high half, usage id in the low half.
///
/// Persisted as a zero-padded hex string, e.g. `"0x00070004"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Usage(pub u32);

impl Usage {
    pub const NONE: Usage = Usage(0);

    pub const fn page(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn id(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl FromStr for Usage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidUsage(s.to_string()))?;
        // hex digits only, no sign
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidUsage(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Usage)
            .map_err(|_| Error::InvalidUsage(s.to_string()))
    }
}

impl From<u32> for Usage {
    fn from(value: u32) -> Self {
        Usage(value)
    }
}

impl From<Usage> for u32 {
    fn from(value: Usage) -> Self {
        value.0
    }
}

impl Serialize for Usage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Usage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Set of layer indices `0..NLAYERS`, stored as the wire bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerSet(u8);

impl LayerSet {
    pub const fn empty() -> Self {
        LayerSet(0)
    }

    pub const fn all() -> Self {
        LayerSet(UNMAPPED_PASSTHROUGH_MASK)
    }

    /// Bits above the last layer are dropped.
    pub const fn from_mask(mask: u8) -> Self {
        LayerSet(mask & UNMAPPED_PASSTHROUGH_MASK)
    }

    pub fn single(layer: u8) -> Result<Self> {
        let mut set = LayerSet::empty();
        set.insert(layer)?;
        Ok(set)
    }

    pub const fn mask(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, layer: u8) -> Result<()> {
        if layer >= NLAYERS {
            return Err(Error::InvalidLayer(layer));
        }
        self.0 |= 1 << layer;
        Ok(())
    }

    pub fn contains(self, layer: u8) -> bool {
        layer < NLAYERS && self.0 & (1 << layer) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Layers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..NLAYERS).filter(move |&l| self.contains(l))
    }
}

impl TryFrom<&[u8]> for LayerSet {
    type Error = Error;

    fn try_from(layers: &[u8]) -> Result<Self> {
        let mut set = LayerSet::empty();
        for &layer in layers {
            set.insert(layer)?;
        }
        Ok(set)
    }
}

impl Serialize for LayerSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for LayerSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let layers: Vec<u8> = Deserialize::deserialize(deserializer)?;
        LayerSet::try_from(layers.as_slice()).map_err(serde::de::Error::custom)
    }
}

fn default_scaling() -> i32 {
    DEFAULT_SCALING
}

/// Translate one source usage into one target usage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub target_usage: Usage,
    pub source_usage: Usage,
    /// Fixed point, real value x 1000
    #[serde(default = "default_scaling")]
    pub scaling: i32,
    pub layers: LayerSet,
    /// Target stays held across a layer switch
    #[serde(default)]
    pub sticky: bool,
}

impl Default for Mapping {
    fn default() -> Self {
        Mapping {
            target_usage: Usage::NONE,
            source_usage: Usage::NONE,
            scaling: DEFAULT_SCALING,
            layers: LayerSet::from_mask(1),
            sticky: false,
        }
    }
}

/// Usages pressed together in one macro step. May be empty.
pub type Chord = Vec<Usage>;

/// One macro: an ordered list of chords.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroSlot(pub Vec<Chord>);

impl MacroSlot {
    pub fn chords(&self) -> &[Chord] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Chord>> for MacroSlot {
    fn from(chords: Vec<Chord>) -> Self {
        MacroSlot(chords)
    }
}

/// Complete device configuration.
///
/// Replaced wholesale when loaded from a device or a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: u8,
    pub unmapped_passthrough_layers: LayerSet,
    /// Microseconds
    pub partial_scroll_timeout: u32,
    pub interval_override: u8,
    /// Order is the device-side match priority
    pub mappings: Vec<Mapping>,
    /// Slots beyond [`NMACROS`] are never sent to a device
    #[serde(default)]
    pub macros: Vec<MacroSlot>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: CONFIG_VERSION,
            unmapped_passthrough_layers: LayerSet::all(),
            partial_scroll_timeout: DEFAULT_PARTIAL_SCROLL_TIMEOUT,
            interval_override: 0,
            mappings: vec![Mapping::default()],
            macros: vec![MacroSlot::default(); NMACROS],
        }
    }
}

impl Config {
    /// Flags byte of SET_CONFIG / GET_CONFIG.
    pub fn flags(&self) -> u8 {
        self.unmapped_passthrough_layers.mask()
    }

    /// Ensure every addressable macro slot exists.
    pub fn pad_macros(&mut self) {
        if self.macros.len() < NMACROS {
            self.macros.resize(NMACROS, MacroSlot::default());
        }
    }
}
