//! Protocol version negotiation.
//!
//! This is not a reliable check: a device speaking version X ignores a
//! GET_CONFIG stamped with version Y, and may answer with a stale buffer
//! from an earlier request whose first byte happens to equal Y. Probing
//! newest first keeps the damage of such a false positive small.

use crate::constants::CONFIG_VERSION;
use crate::error::{Error, Result};
use crate::protocol::{Command, response_version};
use crate::transport::Transport;

/// Versions probed, newest first.
pub const PROBE_VERSIONS: [u8; 3] = [CONFIG_VERSION, CONFIG_VERSION - 1, CONFIG_VERSION - 2];

/// Find the version the device speaks.
///
/// Returns [`CONFIG_VERSION`] on success, [`Error::LegacyDevice`] if the
/// device answered an older probe, [`Error::IncompatibleDevice`] if no probe
/// was echoed.
pub fn negotiate<T: Transport>(transport: &mut T) -> Result<u8> {
    for version in PROBE_VERSIONS {
        let resp = transport.transfer(version, Command::GetConfig)?;
        let received = response_version(&resp)?;
        log::debug!("Probed version {}, device answered {}", version, received);
        if received == version {
            if version == CONFIG_VERSION {
                return Ok(version);
            }
            return Err(Error::LegacyDevice { version });
        }
    }
    Err(Error::IncompatibleDevice)
}
