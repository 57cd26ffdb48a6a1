//! Device configuration session.

use std::collections::BTreeSet;

use crate::config::{Config, LayerSet, Usage};
use crate::error::{Error, Result};
use crate::negotiate::negotiate;
use crate::protocol::{Command, ConfigHeader};
use crate::transfer::{
    UsageCatalog, UsageDirection, collect_extra_usages, fetch_macros, fetch_mappings,
    fetch_usage_ranges, replace_macros, replace_mappings,
};
use crate::transport::{HidTransport, Transport};

/// One negotiated conversation with one device.
///
/// Requests are strictly sequential. Once the device is reported gone the
/// session is dead and every further call fails with [`Error::DeviceGone`].
pub struct Session<T: Transport> {
    transport: T,
    /// Negotiated protocol version
    version: u8,
    attached: bool,
}

impl Session<HidTransport> {
    pub fn new_from_hid() -> Result<Self> {
        let transport = HidTransport::open_any()?;
        Self::open(transport)
    }
}

impl<T: Transport> Session<T> {
    /// Negotiate the protocol version and start a session.
    pub fn open(mut transport: T) -> Result<Self> {
        let version = negotiate(&mut transport)?;
        log::debug!("Device speaks config version {}", version);
        Ok(Session {
            transport,
            version,
            attached: true,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn run<R>(&mut self, op: impl FnOnce(&mut T, u8) -> Result<R>) -> Result<R> {
        if !self.attached {
            return Err(Error::DeviceGone);
        }
        let result = op(&mut self.transport, self.version);
        if let Err(Error::DeviceGone) = result {
            log::warn!("Device detached, session closed");
            self.attached = false;
        }
        result
    }

    fn command(&mut self, cmd: Command) -> Result<()> {
        self.run(|t, v| t.send(v, cmd))
    }

    pub fn read_header(&mut self) -> Result<ConfigHeader> {
        self.run(|t, v| {
            let resp = t.transfer(v, Command::GetConfig)?;
            let header = ConfigHeader::from_raw(&resp)?;
            if header.version != v {
                return Err(Error::UnsupportedVersion {
                    version: header.version,
                });
            }
            Ok(header)
        })
    }

    pub fn dump_info(&mut self) -> Result<()> {
        let header = self.read_header()?;
        log::info!("Config version: {}", header.version);
        log::info!(
            "Unmapped passthrough layers: {:?}",
            LayerSet::from_mask(header.flags).iter().collect::<Vec<_>>()
        );
        log::info!("Partial scroll timeout: {}us", header.partial_scroll_timeout);
        log::info!("Interval override: {}", header.interval_override);
        log::info!("Mappings: {}", header.mapping_count);
        log::info!(
            "Usage runs: {} input, {} output",
            header.our_usage_count,
            header.their_usage_count
        );
        Ok(())
    }

    /// Read the whole configuration from the device.
    pub fn load_config(&mut self) -> Result<Config> {
        let header = self.read_header()?;
        let mappings = self.run(|t, v| fetch_mappings(t, v, header.mapping_count))?;
        let macros = self.run(fetch_macros)?;

        let config = Config {
            version: header.version,
            unmapped_passthrough_layers: LayerSet::from_mask(header.flags),
            partial_scroll_timeout: header.partial_scroll_timeout,
            interval_override: header.interval_override,
            mappings,
            macros,
        };
        log::info!("Loaded config: {} mappings", config.mappings.len());
        Ok(config)
    }

    /// Replace the device configuration with `config` and persist it.
    ///
    /// Not transactional: if this fails midway the device holds a partial
    /// configuration and stays suspended until the next successful save.
    pub fn save_config(&mut self, config: &Config) -> Result<()> {
        if config.version != self.version {
            return Err(Error::UnsupportedVersion {
                version: config.version,
            });
        }
        self.run(|t, v| {
            t.send(v, Command::Suspend)?;
            t.send(
                v,
                Command::SetConfig {
                    flags: config.flags(),
                    partial_scroll_timeout: config.partial_scroll_timeout,
                    interval_override: config.interval_override,
                },
            )?;
            replace_mappings(t, v, &config.mappings)?;
            replace_macros(t, v, &config.macros)?;
            t.send(v, Command::PersistConfig)?;
            t.send(v, Command::Resume)
        })?;
        log::info!("Saved config: {} mappings", config.mappings.len());
        Ok(())
    }

    /// Usages the device handles that `catalog` does not name.
    pub fn extra_usages<C, I>(&mut self, catalog: &C, ignored: &I) -> Result<BTreeSet<Usage>>
    where
        C: UsageCatalog + ?Sized,
        I: UsageCatalog + ?Sized,
    {
        let header = self.read_header()?;
        let mut ranges = self.run(|t, v| {
            fetch_usage_ranges(t, v, UsageDirection::Ours, header.our_usage_count)
        })?;
        ranges.extend(self.run(|t, v| {
            fetch_usage_ranges(t, v, UsageDirection::Theirs, header.their_usage_count)
        })?);
        Ok(collect_extra_usages(&ranges, catalog, ignored))
    }

    /// Reboot into the UF2 bootloader. Ends the session.
    pub fn reset_into_bootsel(&mut self) -> Result<()> {
        self.command(Command::ResetIntoBootsel)?;
        self.attached = false;
        log::info!("Device rebooting into bootloader");
        Ok(())
    }

    /// Flash side B with the firmware running on side A.
    pub fn flash_b_side(&mut self) -> Result<()> {
        self.command(Command::FlashBSide)?;
        log::info!("Flashing B side, reconnect the device when done");
        Ok(())
    }

    pub fn pair_new_device(&mut self) -> Result<()> {
        self.command(Command::PairNewDevice)
    }

    pub fn clear_bonds(&mut self) -> Result<()> {
        self.command(Command::ClearBonds)
    }

    pub fn suspend(&mut self) -> Result<()> {
        self.command(Command::Suspend)
    }

    pub fn resume(&mut self) -> Result<()> {
        self.command(Command::Resume)
    }

    pub fn persist_config(&mut self) -> Result<()> {
        self.command(Command::PersistConfig)
    }
}
