//! HID Remapper configuration protocol implementation.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod negotiate;
pub mod protocol;
pub mod session;
pub mod transfer;
pub mod transport;

pub use self::config::{Chord, Config, LayerSet, MacroSlot, Mapping, Usage};
pub use self::error::{Error, Result};
pub use self::protocol::{Command, Frame};
pub use self::session::Session;
pub use self::transport::Transport;

/// Size of every configuration feature report, excluding the report id.
pub const FRAME_SIZE: usize = 32;
