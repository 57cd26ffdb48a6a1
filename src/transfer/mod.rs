//! Multi-request transfers of configuration records.
//!
//! Each transfer is a strict sequence of request/response pairs on one
//! transport. A failure aborts the sequence where it stands; the device
//! keeps whatever it already received.

pub mod macros;
pub mod mappings;
pub mod usages;

pub use self::macros::{ChordAssembler, fetch_macros, flatten, replace_macros};
pub use self::mappings::{fetch_mappings, replace_mappings};
pub use self::usages::{UsageCatalog, UsageDirection, collect_extra_usages, fetch_usage_ranges};
