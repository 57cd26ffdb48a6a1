//! HID transport: configuration frames as feature report 100 on the vendor
//! usage page interface.
use hidapi::{DeviceInfo, HidApi, HidDevice};

use super::Transport;
use crate::FRAME_SIZE;
use crate::constants::{CONFIG_USAGE_PAGE, PRODUCT_ID, REPORT_ID_CONFIG, VENDOR_ID};
use crate::error::{Error, Result};
use crate::protocol::Frame;

const REPORT_SIZE: usize = FRAME_SIZE + 1;

pub struct HidTransport {
    device: HidDevice,
}

fn is_config_interface(info: &DeviceInfo) -> bool {
    info.vendor_id() == VENDOR_ID
        && info.product_id() == PRODUCT_ID
        && info.usage_page() == CONFIG_USAGE_PAGE
}

/// Prefix a frame with its report id.
fn to_report(frame: &Frame) -> [u8; REPORT_SIZE] {
    let mut buf = [0u8; REPORT_SIZE];
    buf[0] = REPORT_ID_CONFIG;
    buf[1..].copy_from_slice(frame);
    buf
}

/// Strip the report id from `nread` bytes of a GET_REPORT reply.
fn from_report(buf: &[u8; REPORT_SIZE], nread: usize) -> Result<Frame> {
    if nread != REPORT_SIZE {
        return Err(Error::ShortReport(nread));
    }
    let mut frame = [0u8; FRAME_SIZE];
    frame.copy_from_slice(&buf[1..]);
    Ok(frame)
}

impl HidTransport {
    pub fn scan_devices() -> Result<usize> {
        let api = HidApi::new()?;

        let n = api
            .device_list()
            .filter(|d| is_config_interface(d))
            .enumerate()
            .map(|(i, info)| {
                log::debug!(
                    "Found HID Remapper #{}: {}",
                    i,
                    info.path().to_string_lossy()
                );
            })
            .count();
        Ok(n)
    }

    pub fn open_nth(nth: usize) -> Result<HidTransport> {
        let api = HidApi::new()?;

        let info = api
            .device_list()
            .filter(|d| is_config_interface(d))
            .nth(nth)
            .ok_or_else(|| {
                Error::DeviceNotFound(format!(
                    "{:04x}:{:04x} configuration interface not found at index #{}",
                    VENDOR_ID, PRODUCT_ID, nth
                ))
            })?;
        log::debug!(
            "Opening {} (interface #{})",
            info.path().to_string_lossy(),
            info.interface_number()
        );

        let device = info.open_device(&api)?;
        Ok(HidTransport { device })
    }

    pub fn open_any() -> Result<HidTransport> {
        Self::open_nth(0)
    }
}

impl Transport for HidTransport {
    fn send_raw(&mut self, frame: &Frame) -> Result<()> {
        self.device.send_feature_report(&to_report(frame))?;
        Ok(())
    }

    fn recv_raw(&mut self) -> Result<Frame> {
        let mut buf = [0u8; REPORT_SIZE];
        buf[0] = REPORT_ID_CONFIG;
        let nread = self.device.get_feature_report(&mut buf)?;
        from_report(&buf, nread)
    }
}
