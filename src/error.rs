//! Error types

use thiserror::Error;

/// Errors raised while talking to a device or handling configuration documents.
#[derive(Error, Debug)]
pub enum Error {
    /// Response frame failed CRC validation and must not be trusted.
    #[error("Checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    Checksum { expected: u32, actual: u32 },

    #[error("Fields need {needed} bytes, frame payload holds {capacity}")]
    FieldOverflow { needed: usize, capacity: usize },

    #[error("Unknown command code {0}")]
    UnknownCommand(u8),

    #[error("Unsupported config version {version}")]
    UnsupportedVersion { version: u8 },

    /// A document whose `version` is anything but 3 or 4, including values
    /// that are not a small integer at all.
    #[error("Unsupported config document version {0}")]
    UnsupportedDocumentVersion(serde_json::Value),

    /// The device answered in an older protocol version. A legacy tool may still work.
    #[error("Incompatible device version ({version}), please upgrade the firmware")]
    LegacyDevice { version: u8 },

    #[error("Incompatible device version")]
    IncompatibleDevice,

    #[error("Device disconnected")]
    DeviceGone,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Short feature report: {0} bytes")]
    ShortReport(usize),

    #[error("HID error: {0}")]
    Transport(String),

    #[error("Invalid usage: {0:?}")]
    InvalidUsage(String),

    #[error("Invalid layer: {0}")]
    InvalidLayer(u8),

    #[error("Frame codec error: {0}")]
    Codec(#[from] scroll::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can do something useful other than giving up,
    /// e.g. point the user at an older configuration tool.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::LegacyDevice { .. })
    }
}

impl From<hidapi::HidError> for Error {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if is_disconnect_message(&msg) {
            Error::DeviceGone
        } else {
            Error::Transport(msg)
        }
    }
}

/// hidapi reports an unplugged device only through the OS error text.
fn is_disconnect_message(msg: &str) -> bool {
    const MARKERS: &[&str] = &[
        "No such device",
        "ENODEV",
        "device not connected",
        "device is not connected",
        "kIOReturnNotAttached",
    ];
    let lower = msg.to_ascii_lowercase();
    MARKERS
        .iter()
        .any(|m| lower.contains(&m.to_ascii_lowercase()))
}

pub type Result<T> = std::result::Result<T, Error>;
