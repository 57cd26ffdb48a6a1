/// Configuration schema and wire protocol version spoken by this tool.
pub const CONFIG_VERSION: u8 = 4;

/// Last persisted schema version that can still be migrated.
pub const LEGACY_CONFIG_VERSION: u8 = 3;

pub const NLAYERS: u8 = 4;
pub const NMACROS: usize = 8;
pub const MACRO_ITEMS_IN_PACKET: usize = 6;
pub const USAGE_RUNS_IN_PACKET: usize = 3;

pub const STICKY_FLAG: u8 = 0x01;
pub const UNMAPPED_PASSTHROUGH_MASK: u8 = (1 << NLAYERS) - 1;

pub const DEFAULT_PARTIAL_SCROLL_TIMEOUT: u32 = 1_000_000;
pub const DEFAULT_SCALING: i32 = 1000;

/// HID feature report carrying configuration frames.
pub const REPORT_ID_CONFIG: u8 = 100;

pub const VENDOR_ID: u16 = 0xcafe;
pub const PRODUCT_ID: u16 = 0xbaf2;

/// Usage page of the vendor-defined configuration collection.
pub const CONFIG_USAGE_PAGE: u16 = 0xff00;

pub mod commands {
    pub const RESET_INTO_BOOTSEL: u8 = 1;
    pub const SET_CONFIG: u8 = 2;
    pub const GET_CONFIG: u8 = 3;
    pub const CLEAR_MAPPING: u8 = 4;
    pub const ADD_MAPPING: u8 = 5;
    pub const GET_MAPPING: u8 = 6;
    pub const PERSIST_CONFIG: u8 = 7;
    pub const GET_OUR_USAGES: u8 = 8;
    pub const GET_THEIR_USAGES: u8 = 9;
    pub const SUSPEND: u8 = 10;
    pub const RESUME: u8 = 11;
    pub const PAIR_NEW_DEVICE: u8 = 12;
    pub const CLEAR_BONDS: u8 = 13;
    pub const FLASH_B_SIDE: u8 = 14;
    pub const CLEAR_MACROS: u8 = 15;
    pub const APPEND_TO_MACRO: u8 = 16;
    pub const GET_MACRO: u8 = 17;
}
